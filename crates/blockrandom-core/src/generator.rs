//! `BlockRandom`: one pool, one feed, one bit source, and the numeric API.

use std::sync::Arc;

use crate::bits::{BitSource, EntropyDraw, Mode};
use crate::config::FeedConfig;
use crate::error::{BlockRandomError, Result};
use crate::feed::{EntropyFeed, FeedHealth, FeedWorker, PollOutcome, Replenish};
use crate::numeric::NumericDeriver;
use crate::pool::{EntropyPool, PoolStatus};
use crate::sequence::SequenceOps;
use crate::source::{OsSecureSource, SecureSource, TransactionFeed};

/// Snapshot returned by [`BlockRandom::health`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorHealth {
    pub pool: PoolStatus,
    pub feed: FeedHealth,
}

/// Ledger-seeded random number generator.
///
/// Every operation comes in two flavours. The plain one (`rand_*`, `uniform`,
/// `shuffle`, ...) consumes fresh ledger bytes only and waits for the feed
/// when the pool is dry. The `recycled_*` one never waits.
///
/// ```no_run
/// use blockrandom_core::{BlockRandom, FeedConfig, TransactionFeed, TransactionRecord};
///
/// struct Ledger;
/// impl TransactionFeed for Ledger {
///     fn fetch_batch(&self) -> blockrandom_core::Result<Vec<TransactionRecord>> {
///         Ok(vec![TransactionRecord::new("00ff00ff", 1)])
///     }
/// }
///
/// let rng = BlockRandom::start(FeedConfig::default(), Box::new(Ledger)).unwrap();
/// let die = rng.recycled_int(1, 7).unwrap();
/// assert!((1..7).contains(&die));
/// ```
pub struct BlockRandom {
    feed: Arc<EntropyFeed>,
    source: BitSource,
    worker: Option<FeedWorker>,
}

impl BlockRandom {
    /// Build the pipeline and start the feed thread, with the OS RNG as fallback.
    pub fn start(config: FeedConfig, ledger: Box<dyn TransactionFeed>) -> Result<Self> {
        Self::with_fallback(config, ledger, Box::new(OsSecureSource))
    }

    /// Like [`start`](Self::start) with a caller-supplied fallback RNG.
    pub fn with_fallback(
        config: FeedConfig,
        ledger: Box<dyn TransactionFeed>,
        fallback: Box<dyn SecureSource>,
    ) -> Result<Self> {
        let mut rng = Self::detached(config, ledger, fallback)?;
        let worker = rng.feed.spawn().map_err(|e| {
            BlockRandomError::unavailable(format!("cannot start feed thread: {e}"))
        })?;
        rng.worker = Some(worker);
        Ok(rng)
    }

    /// Build the pipeline without a feed thread. The pool only fills through
    /// [`poll_now`](Self::poll_now) and the fallback RNG.
    pub fn detached(
        config: FeedConfig,
        ledger: Box<dyn TransactionFeed>,
        fallback: Box<dyn SecureSource>,
    ) -> Result<Self> {
        let pool = Arc::new(EntropyPool::new(config.capacity));
        let feed = Arc::new(EntropyFeed::new(Arc::clone(&pool), ledger, fallback, config)?);
        let producer: Arc<dyn Replenish> = feed.clone();
        Ok(Self {
            source: BitSource::new(pool, producer),
            feed,
            worker: None,
        })
    }

    /// Connect to the configured ledger URL over HTTP and start the feed.
    #[cfg(feature = "http")]
    pub fn from_config(config: FeedConfig) -> Result<Self> {
        let ledger = crate::http::LedgerFeed::new(&config)?;
        Self::start(config, Box::new(ledger))
    }

    pub fn pool(&self) -> &Arc<EntropyPool> {
        self.source.pool()
    }

    pub fn feed(&self) -> &Arc<EntropyFeed> {
        &self.feed
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some() && !self.feed.is_stopped()
    }

    /// Poll the ledger once on the calling thread.
    pub fn poll_now(&self) -> Result<PollOutcome> {
        self.feed.poll_once()
    }

    pub fn health(&self) -> GeneratorHealth {
        GeneratorHealth {
            pool: self.pool().status(),
            feed: self.feed.health(),
        }
    }

    /// Stop and join the feed thread. Buffered entropy stays usable.
    pub fn shutdown(&mut self) {
        match self.worker.take() {
            Some(worker) => worker.shutdown(),
            None => self.feed.stop(),
        }
    }

    // -- bytes --

    pub fn rand_bytes(&self, n: usize) -> Result<Vec<u8>> {
        self.source.draw(n, Mode::Blocking)
    }

    pub fn recycled_bytes(&self, n: usize) -> Result<Vec<u8>> {
        self.source.draw(n, Mode::Recycled)
    }

    // -- booleans --

    pub fn rand_bool(&self) -> Result<bool> {
        self.source.next_bool(Mode::Blocking)
    }

    pub fn recycled_bool(&self) -> Result<bool> {
        self.source.next_bool(Mode::Recycled)
    }

    // -- integers --

    /// Integer in `[min, max)`; `max - min` may be at most 2^31.
    pub fn rand_int(&self, min: i64, max: i64) -> Result<i64> {
        self.source.random_int(min, max, Mode::Blocking)
    }

    pub fn recycled_int(&self, min: i64, max: i64) -> Result<i64> {
        self.source.random_int(min, max, Mode::Recycled)
    }

    // -- floats --

    /// Float in `[0, 1)`.
    pub fn rand_float(&self) -> Result<f64> {
        self.source.random_float(Mode::Blocking)
    }

    pub fn recycled_float(&self) -> Result<f64> {
        self.source.random_float(Mode::Recycled)
    }

    /// Float in `[min, max)`.
    pub fn uniform(&self, min: f64, max: f64) -> Result<f64> {
        self.source.uniform(min, max, Mode::Blocking)
    }

    pub fn recycled_uniform(&self, min: f64, max: f64) -> Result<f64> {
        self.source.uniform(min, max, Mode::Recycled)
    }

    // -- sequences --

    pub fn shuffle<T>(&self, items: &mut [T]) -> Result<()> {
        self.source.shuffle(items, Mode::Blocking)
    }

    pub fn recycled_shuffle<T>(&self, items: &mut [T]) -> Result<()> {
        self.source.shuffle(items, Mode::Recycled)
    }

    pub fn shuffled<T: Clone>(&self, items: &[T]) -> Result<Vec<T>> {
        self.source.shuffled(items, Mode::Blocking)
    }

    pub fn recycled_shuffled<T: Clone>(&self, items: &[T]) -> Result<Vec<T>> {
        self.source.shuffled(items, Mode::Recycled)
    }

    /// Up to `n` items chosen uniformly from `items`, which is read once.
    pub fn sample<I: IntoIterator>(&self, items: I, n: usize) -> Result<Vec<I::Item>> {
        self.source.sample(items, n, Mode::Blocking)
    }

    pub fn recycled_sample<I: IntoIterator>(&self, items: I, n: usize) -> Result<Vec<I::Item>> {
        self.source.sample(items, n, Mode::Recycled)
    }

    pub fn choice<'a, T>(&self, items: &'a [T]) -> Result<&'a T> {
        self.source.choice(items, Mode::Blocking)
    }

    pub fn recycled_choice<'a, T>(&self, items: &'a [T]) -> Result<&'a T> {
        self.source.choice(items, Mode::Recycled)
    }
}

impl Drop for BlockRandom {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for BlockRandom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockRandom")
            .field("pool", &self.pool().status())
            .field("running", &self.is_running())
            .finish()
    }
}
