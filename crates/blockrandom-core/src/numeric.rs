//! Numeric derivation: integers, floats and uniform reals from raw draws.
//!
//! Everything here goes through [`EntropyDraw::extract_bits`]; nothing reads
//! the pool channels directly.

use crate::bits::{EntropyDraw, Mode};
use crate::error::{BlockRandomError, Result};

/// Widest integer range `random_int` can serve (31-bit draws).
pub const MAX_INT_RANGE: u64 = 1 << 31;

const FLOAT_BITS: u32 = 24;

/// `max - min` as an unsigned range, validated.
fn int_range(min: i64, max: i64) -> Result<u64> {
    if min >= max {
        return Err(BlockRandomError::invalid(format!(
            "min must be less than max (got min={min}, max={max})"
        )));
    }
    let range = i128::from(max) - i128::from(min);
    if range > i128::from(MAX_INT_RANGE) {
        return Err(BlockRandomError::invalid(format!(
            "range {range} exceeds the maximum of {MAX_INT_RANGE}"
        )));
    }
    Ok(range as u64)
}

/// Bounded integers and floats on top of any [`EntropyDraw`].
pub trait NumericDeriver: EntropyDraw {
    /// Uniform integer in `[min, max)`.
    ///
    /// Power-of-two ranges scale a 31-bit draw directly. Other ranges use
    /// rejection sampling: draws at or above `range * floor(2^31 / range)`
    /// are discarded so every residue is equally likely.
    fn random_int(&self, min: i64, max: i64, mode: Mode) -> Result<i64> {
        let range = int_range(min, max)?;

        if range.is_power_of_two() {
            let bits = u64::from(self.extract_bits(31, mode)?);
            return Ok(min + ((range * bits) >> 31) as i64);
        }

        let threshold = range * (MAX_INT_RANGE / range);
        loop {
            let bits = u64::from(self.extract_bits(31, mode)?);
            if bits < threshold {
                return Ok(min + (bits % range) as i64);
            }
        }
    }

    /// Float in `[0, 1)` with 24 bits of precision.
    fn random_float(&self, mode: Mode) -> Result<f64> {
        let bits = self.extract_bits(FLOAT_BITS, mode)?;
        Ok(f64::from(bits) / f64::from(1u32 << FLOAT_BITS))
    }

    /// Float in `[min, max)`.
    fn uniform(&self, min: f64, max: f64, mode: Mode) -> Result<f64> {
        if !(min < max) || !(max - min).is_finite() {
            return Err(BlockRandomError::invalid(format!(
                "uniform needs finite bounds with min < max (got min={min}, max={max})"
            )));
        }
        Ok(self.random_float(mode)? * (max - min) + min)
    }
}

impl<T: EntropyDraw + ?Sized> NumericDeriver for T {}
