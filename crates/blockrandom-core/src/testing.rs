//! Shared mocks for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::bits::{EntropyDraw, Mode};
use crate::error::{BlockRandomError, Result};
use crate::feed::Replenish;
use crate::pool::EntropyPool;

/// Producer that counts calls and answers them synchronously.
pub struct MockProducer {
    pub pool: Arc<EntropyPool>,
    pub refill_bytes: Vec<u8>,
    pub fallback_bytes: Vec<u8>,
    pub fallback_fails: bool,
    pub refills: AtomicUsize,
    pub fallbacks: AtomicUsize,
}

impl MockProducer {
    pub fn new(pool: Arc<EntropyPool>) -> Self {
        Self {
            pool,
            refill_bytes: Vec::new(),
            fallback_bytes: (1..=8).collect(),
            fallback_fails: false,
            refills: AtomicUsize::new(0),
            fallbacks: AtomicUsize::new(0),
        }
    }

    pub fn with_refill(mut self, bytes: &[u8]) -> Self {
        self.refill_bytes = bytes.to_vec();
        self
    }

    /// Fallback that reports a broken secure RNG.
    pub fn with_failing_fallback(mut self) -> Self {
        self.fallback_fails = true;
        self
    }

    pub fn refills(&self) -> usize {
        self.refills.load(Ordering::SeqCst)
    }

    pub fn fallbacks(&self) -> usize {
        self.fallbacks.load(Ordering::SeqCst)
    }
}

impl Replenish for MockProducer {
    fn request_refill(&self) {
        self.refills.fetch_add(1, Ordering::SeqCst);
        for &b in &self.refill_bytes {
            self.pool.try_put_primary(b);
        }
    }

    fn use_fallback_entropy(&self) -> Result<usize> {
        self.fallbacks.fetch_add(1, Ordering::SeqCst);
        if self.fallback_fails {
            return Err(BlockRandomError::PoolExhausted("secure RNG failed".to_string()));
        }
        Ok(self.pool.put_spare(&self.fallback_bytes))
    }
}

/// Draw source that replays a fixed byte script, ignoring the mode.
pub struct ScriptedDraw {
    bytes: Mutex<VecDeque<u8>>,
    pub modes: Mutex<Vec<Mode>>,
}

impl ScriptedDraw {
    pub fn new(bytes: impl IntoIterator<Item = u8>) -> Self {
        Self {
            bytes: Mutex::new(bytes.into_iter().collect()),
            modes: Mutex::new(Vec::new()),
        }
    }

    /// Script whose successive `extract_bits(bits)` calls return `values`.
    pub fn from_bits(bits: u32, values: &[u32]) -> Self {
        // extract_bits reads downward from bit 47 of the big-endian word.
        let shift = 48 - bits;
        Self::new(values.iter().flat_map(move |&v| (u64::from(v) << shift).to_be_bytes()))
    }

    pub fn from_bits31(values: &[u32]) -> Self {
        Self::from_bits(31, values)
    }

    pub fn remaining(&self) -> usize {
        self.bytes.lock().unwrap().len()
    }
}

impl EntropyDraw for ScriptedDraw {
    fn draw(&self, n: usize, mode: Mode) -> Result<Vec<u8>> {
        self.modes.lock().unwrap().push(mode);
        let mut q = self.bytes.lock().unwrap();
        assert!(q.len() >= n, "script exhausted");
        Ok(q.drain(..n).collect())
    }
}
