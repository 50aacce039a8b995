//! Bit source: the two ways of consuming the pool.
//!
//! - **Blocking** draws only single-use ledger bytes from Primary and waits
//!   for the feed when it runs dry.
//! - **Recycled** draws never wait. Primary bytes are used when present;
//!   otherwise four Spare bytes are stretched through MurmurHash3. Every byte
//!   handed out is pushed back into Spare so it keeps circulating.

use std::sync::Arc;

use crate::error::{BlockRandomError, Result};
use crate::feed::Replenish;
use crate::hash::stretch_block;
use crate::pool::EntropyPool;

const LOW_48: u64 = (1 << 48) - 1;

/// How a draw is allowed to obtain entropy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Fresh ledger bytes only; may wait indefinitely.
    Blocking,
    /// Never waits; reuses and stretches previously seen entropy.
    Recycled,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blocking => write!(f, "blocking"),
            Self::Recycled => write!(f, "recycled"),
        }
    }
}

pub(crate) fn check_count(n: usize, what: &str) -> Result<()> {
    if n < 1 {
        return Err(BlockRandomError::invalid(format!("{what} must be >= 1, got {n}")));
    }
    Ok(())
}

/// Anything that can hand out raw bytes in either mode.
///
/// Numeric derivation is layered on top of this trait (see
/// [`NumericDeriver`](crate::numeric::NumericDeriver)) so it never touches
/// the channels directly.
pub trait EntropyDraw {
    /// Exactly `n` bytes. `n == 0` is an invalid argument.
    fn draw(&self, n: usize, mode: Mode) -> Result<Vec<u8>>;

    /// The top `bits` bits (`0..=32`) of the low 48 bits of an 8-byte
    /// big-endian draw.
    fn extract_bits(&self, bits: u32, mode: Mode) -> Result<u32> {
        if bits > 32 {
            return Err(BlockRandomError::invalid(format!(
                "can extract at most 32 bits, asked for {bits}"
            )));
        }
        let bytes = self.draw(8, mode)?;
        let word: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
            BlockRandomError::PoolExhausted(format!("short draw: {} bytes", bytes.len()))
        })?;
        let value = i64::from_be_bytes(word) as u64 & LOW_48;
        Ok((value >> (48 - bits)) as u32)
    }

    /// `true` iff one extracted bit is zero.
    fn next_bool(&self, mode: Mode) -> Result<bool> {
        Ok(self.extract_bits(1, mode)? == 0)
    }
}

/// Pool consumer implementing both draw modes.
#[derive(Clone)]
pub struct BitSource {
    pool: Arc<EntropyPool>,
    producer: Arc<dyn Replenish>,
}

impl BitSource {
    pub fn new(pool: Arc<EntropyPool>, producer: Arc<dyn Replenish>) -> Self {
        Self { pool, producer }
    }

    pub fn pool(&self) -> &Arc<EntropyPool> {
        &self.pool
    }

    /// `n` single-use ledger bytes, waiting for the feed as long as it takes.
    pub fn blocking_draw(&self, n: usize) -> Result<Vec<u8>> {
        check_count(n, "byte count")?;
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            match self.pool.try_take_primary() {
                Some(byte) => out.push(byte),
                None => {
                    self.producer.request_refill();
                    out.push(self.pool.take_primary_blocking());
                }
            }
        }
        Ok(out)
    }

    /// `n` bytes without ever waiting on the feed.
    pub fn recycled_draw(&self, n: usize) -> Result<Vec<u8>> {
        check_count(n, "byte count")?;
        let mut out = Vec::with_capacity(n + 3);
        let mut block: Vec<u8> = Vec::with_capacity(4);

        while out.len() < n {
            if let Some(byte) = self.pool.try_take_primary() {
                block.push(byte);
            } else if let Some(spare) = self.pool.try_take_spare_block() {
                // Ledger bytes of an unfinished block go back to Spare.
                self.return_to_spare(&mut block);
                block.extend_from_slice(&stretch_block(spare));
            } else {
                let stored = match self.producer.use_fallback_entropy() {
                    Ok(stored) => stored,
                    Err(e) => {
                        self.return_to_spare(&mut block);
                        return Err(e);
                    }
                };
                if stored == 0 && self.pool.spare_len() < 4 {
                    self.return_to_spare(&mut block);
                    return Err(BlockRandomError::PoolExhausted(
                        "spare channel cannot hold a 4-byte block".to_string(),
                    ));
                }
                continue;
            }

            if block.len() == 4 {
                for byte in block.drain(..) {
                    out.push(byte);
                    self.pool.try_put_spare(byte);
                }
            }
        }
        out.truncate(n);
        Ok(out)
    }

    fn return_to_spare(&self, block: &mut Vec<u8>) {
        for byte in block.drain(..) {
            self.pool.try_put_spare(byte);
        }
    }
}

impl EntropyDraw for BitSource {
    fn draw(&self, n: usize, mode: Mode) -> Result<Vec<u8>> {
        match mode {
            Mode::Blocking => self.blocking_draw(n),
            Mode::Recycled => self.recycled_draw(n),
        }
    }
}

impl std::fmt::Debug for BitSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitSource").field("pool", &self.pool).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockProducer, ScriptedDraw};
    use std::time::{Duration, Instant};

    fn source_with(
        pool: &Arc<EntropyPool>,
        producer: MockProducer,
    ) -> (BitSource, Arc<MockProducer>) {
        let producer = Arc::new(producer);
        let source = BitSource::new(Arc::clone(pool), producer.clone());
        (source, producer)
    }

    // -----------------------------------------------------------------------
    // Blocking draw tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_blocking_draw_consumes_primary_in_order() {
        let pool = Arc::new(EntropyPool::new(64));
        for b in [10, 20, 30, 40, 50, 60, 70, 80] {
            pool.try_put_primary(b);
        }
        let producer = MockProducer::new(Arc::clone(&pool)).with_refill(&[90]);
        let (source, producer) = source_with(&pool, producer);

        assert_eq!(source.blocking_draw(8).unwrap(), vec![10, 20, 30, 40, 50, 60, 70, 80]);
        assert_eq!(pool.primary_len(), 0);
        assert_eq!(producer.refills(), 0);

        assert_eq!(source.blocking_draw(1).unwrap(), vec![90]);
        assert_eq!(producer.refills(), 1, "one empty observation, one refill request");
    }

    #[test]
    fn test_blocking_draw_waits_for_producer_thread() {
        let pool = Arc::new(EntropyPool::new(64));
        let (source, producer) = source_with(&pool, MockProducer::new(Arc::clone(&pool)));

        let pusher = {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(100));
                pool.accept_batch(&[3, 2, 1], 1);
            })
        };
        assert_eq!(source.blocking_draw(3).unwrap(), vec![1, 2, 3]);
        pusher.join().unwrap();
        assert_eq!(producer.refills(), 1);
        assert_eq!(producer.fallbacks(), 0, "blocking mode never uses the fallback");
    }

    #[test]
    fn test_blocking_draw_rejects_zero() {
        let pool = Arc::new(EntropyPool::new(8));
        let (source, producer) = source_with(&pool, MockProducer::new(Arc::clone(&pool)));
        assert!(source.blocking_draw(0).unwrap_err().is_invalid_argument());
        assert_eq!(producer.refills(), 0);
    }

    // -----------------------------------------------------------------------
    // Recycled draw tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_recycled_prefers_primary_and_recycles_into_spare() {
        let pool = Arc::new(EntropyPool::new(64));
        for b in 1..=8 {
            pool.try_put_primary(b);
        }
        let (source, producer) = source_with(&pool, MockProducer::new(Arc::clone(&pool)));

        assert_eq!(source.recycled_draw(8).unwrap(), (1..=8).collect::<Vec<u8>>());
        assert_eq!(pool.primary_len(), 0);
        assert_eq!(pool.spare_len(), 8);
        assert_eq!(producer.fallbacks(), 0);
    }

    #[test]
    fn test_recycled_stretches_spare_block() {
        let pool = Arc::new(EntropyPool::new(64));
        pool.put_spare(&[1, 2, 3, 4]);
        let (source, _) = source_with(&pool, MockProducer::new(Arc::clone(&pool)));

        let derived = stretch_block([1, 2, 3, 4]);
        assert_eq!(source.recycled_draw(4).unwrap(), derived.to_vec());
        assert_eq!(pool.try_take_spare_block(), Some(derived));
        assert_eq!(pool.primary_len(), 0, "derived bytes never enter Primary");
    }

    #[test]
    fn test_recycled_truncates_last_block() {
        let pool = Arc::new(EntropyPool::new(64));
        pool.put_spare(&[9; 8]);
        let (source, _) = source_with(&pool, MockProducer::new(Arc::clone(&pool)));
        let out = source.recycled_draw(5).unwrap();
        assert_eq!(out.len(), 5);
        // Both full blocks were recycled even though only five bytes were returned.
        assert_eq!(pool.spare_len(), 8);
    }

    #[test]
    fn test_recycled_partial_primary_block_returns_to_spare() {
        let pool = Arc::new(EntropyPool::new(64));
        pool.try_put_primary(0xAA);
        pool.put_spare(&[5, 6, 7, 8]);
        let (source, _) = source_with(&pool, MockProducer::new(Arc::clone(&pool)));

        assert_eq!(source.recycled_draw(4).unwrap(), stretch_block([5, 6, 7, 8]).to_vec());
        assert_eq!(pool.try_take_spare(), Some(0xAA));
    }

    #[test]
    fn test_recycled_never_blocks_when_empty() {
        let pool = Arc::new(EntropyPool::new(64));
        let (source, producer) = source_with(&pool, MockProducer::new(Arc::clone(&pool)));

        let t0 = Instant::now();
        let out = source.recycled_draw(256).unwrap();
        assert!(t0.elapsed() < Duration::from_secs(2));
        assert_eq!(out.len(), 256);
        assert!(producer.fallbacks() >= 1);
        assert_eq!(producer.refills(), 0, "recycled mode must not ask the feed");
        assert_eq!(pool.primary_len(), 0);
    }

    #[test]
    fn test_recycled_exhausted_when_fallback_cannot_store() {
        let pool = Arc::new(EntropyPool::new(2));
        let (source, _) = source_with(&pool, MockProducer::new(Arc::clone(&pool)));
        pool.put_spare(&[1, 2]);
        assert!(matches!(
            source.recycled_draw(4),
            Err(BlockRandomError::PoolExhausted(_))
        ));
    }

    #[test]
    fn test_recycled_fallback_failure_keeps_primary_byte() {
        let pool = Arc::new(EntropyPool::new(64));
        pool.try_put_primary(0xAA);
        let producer = MockProducer::new(Arc::clone(&pool)).with_failing_fallback();
        let (source, producer) = source_with(&pool, producer);

        assert!(matches!(
            source.recycled_draw(4),
            Err(BlockRandomError::PoolExhausted(_))
        ));
        assert_eq!(producer.fallbacks(), 1);
        assert_eq!(pool.try_take_spare(), Some(0xAA));
        assert_eq!(pool.primary_len(), 0);
    }

    #[test]
    fn test_draw_lengths_both_modes() {
        let pool = Arc::new(EntropyPool::new(5000));
        let (source, _) = source_with(
            &pool,
            MockProducer::new(Arc::clone(&pool)).with_refill(&[0x5A; 64]),
        );
        for n in [1, 2, 3, 4, 5, 7, 8, 31, 100] {
            assert_eq!(source.draw(n, Mode::Recycled).unwrap().len(), n);
            assert_eq!(source.draw(n, Mode::Blocking).unwrap().len(), n);
        }
    }

    // -----------------------------------------------------------------------
    // Bit extraction tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_extract_bits_reads_upper_bits_of_low_48() {
        let word = [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0];
        let script = ScriptedDraw::new(word.iter().copied().cycle().take(32));
        assert_eq!(script.extract_bits(16, Mode::Recycled).unwrap(), 0x5678);
        assert_eq!(script.extract_bits(32, Mode::Recycled).unwrap(), 0x5678_9ABC);
        assert_eq!(script.extract_bits(0, Mode::Recycled).unwrap(), 0);
        assert_eq!(script.extract_bits(4, Mode::Blocking).unwrap(), 0x5);
        assert_eq!(script.remaining(), 0);
    }

    #[test]
    fn test_extract_bits_negative_word() {
        let script = ScriptedDraw::new([0xFF; 8]);
        assert_eq!(script.extract_bits(31, Mode::Recycled).unwrap(), 0x7FFF_FFFF);
    }

    #[test]
    fn test_extract_bits_rejects_more_than_32() {
        let script = ScriptedDraw::new([]);
        assert!(script.extract_bits(33, Mode::Recycled).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_next_bool() {
        // Bit 47 of the first word is 0, of the second word is 1.
        let script = ScriptedDraw::new([0, 0, 0x7F, 0, 0, 0, 0, 0, 0, 0, 0x80, 0, 0, 0, 0, 0]);
        assert!(script.next_bool(Mode::Recycled).unwrap());
        assert!(!script.next_bool(Mode::Recycled).unwrap());
    }
}
