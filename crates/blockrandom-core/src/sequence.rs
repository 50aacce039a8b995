//! Sequence operations: shuffle, sample, choice.

use crate::bits::{Mode, check_count};
use crate::error::{BlockRandomError, Result};
use crate::numeric::NumericDeriver;

fn index(i: usize) -> Result<i64> {
    i64::try_from(i).map_err(|_| BlockRandomError::invalid(format!("index {i} out of range")))
}

/// Permutations and selections driven by [`NumericDeriver::random_int`].
///
/// Every operation draws all of its randomness before touching its output,
/// so an exhausted pool leaves the input untouched.
pub trait SequenceOps: NumericDeriver {
    /// Fisher-Yates shuffle in place.
    fn shuffle<T>(&self, items: &mut [T], mode: Mode) -> Result<()> {
        let len = index(items.len())?;
        let mut swaps = Vec::with_capacity(items.len());
        for i in 0..len {
            swaps.push(self.random_int(i, len, mode)? as usize);
        }
        for (i, j) in swaps.into_iter().enumerate() {
            items.swap(i, j);
        }
        Ok(())
    }

    /// Shuffled copy; `items` is left as is.
    fn shuffled<T: Clone>(&self, items: &[T], mode: Mode) -> Result<Vec<T>> {
        let mut copy = items.to_vec();
        self.shuffle(&mut copy, mode)?;
        Ok(copy)
    }

    /// Reservoir sample of up to `n` items, in reservoir order.
    ///
    /// A source with fewer than `n` items is returned whole.
    fn sample<I: IntoIterator>(&self, items: I, n: usize, mode: Mode) -> Result<Vec<I::Item>> {
        check_count(n, "sample size")?;
        let items = items.into_iter();
        let mut reservoir = Vec::with_capacity(n.min(items.size_hint().0));
        for (i, item) in items.enumerate() {
            let seen = i + 1;
            if seen <= n {
                reservoir.push(item);
                continue;
            }
            let slot = self.random_int(0, index(seen)?, mode)? as usize;
            if let Some(kept) = reservoir.get_mut(slot) {
                *kept = item;
            }
        }
        Ok(reservoir)
    }

    /// One element, chosen uniformly.
    fn choice<'a, T>(&self, items: &'a [T], mode: Mode) -> Result<&'a T> {
        if items.is_empty() {
            return Err(BlockRandomError::invalid("cannot choose from an empty sequence"));
        }
        let i = self.random_int(0, index(items.len())?, mode)? as usize;
        items
            .get(i)
            .ok_or_else(|| BlockRandomError::invalid(format!("index {i} out of range")))
    }
}

impl<T: NumericDeriver + ?Sized> SequenceOps for T {}
