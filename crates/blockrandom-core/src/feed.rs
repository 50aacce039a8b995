//! Background producer that keeps the pool topped up from the ledger.
//!
//! Architecture:
//! 1. Poll the [`TransactionFeed`] for the latest batch
//! 2. Retry failed fetches up to `max_attempts`, pausing `retry_delay` between them
//! 3. Hex-decode the batch and hand it to [`EntropyPool::accept_batch`]
//! 4. Sleep `poll_interval`, waking early on stop or on a refill request
//! 5. Serve [`Replenish::use_fallback_entropy`] from the local secure RNG
//!
//! Expected failures (network errors, empty or stale polls) are logged and
//! absorbed; the loop only ends when [`EntropyFeed::stop`] is called.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::FeedConfig;
use crate::error::{BlockRandomError, Result};
use crate::pool::EntropyPool;
use crate::quality::quick_shannon;
use crate::source::{SecureSource, TransactionFeed, TransactionRecord, batch_entropy};

/// What the bit source needs from a producer.
pub trait Replenish: Send + Sync {
    /// Ask for a poll as soon as possible. Must not block.
    fn request_refill(&self);

    /// Push local secure random bytes into Spare. Returns how many were stored.
    fn use_fallback_entropy(&self) -> Result<usize>;
}

/// Result of one successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The batch was newer than the watermark and its bytes were pushed.
    Accepted { bytes: usize, recency: u64 },
    /// The batch was not newer than the watermark.
    Stale,
    /// The batch held no usable hashes.
    Empty,
}

#[derive(Default)]
struct Signal {
    stop: bool,
    refill: bool,
}

#[derive(Default)]
struct FeedStats {
    polls: AtomicU64,
    failed_attempts: AtomicU64,
    exhausted_polls: AtomicU64,
    accepted_batches: AtomicU64,
    rejected_batches: AtomicU64,
    bytes_ingested: AtomicU64,
    fallback_uses: AtomicU64,
    refill_requests: AtomicU64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Ledger poller bound to one [`EntropyPool`].
pub struct EntropyFeed {
    pool: Arc<EntropyPool>,
    ledger: Box<dyn TransactionFeed>,
    fallback: Box<dyn SecureSource>,
    config: FeedConfig,
    signal: Mutex<Signal>,
    wake: Condvar,
    stats: FeedStats,
}

impl EntropyFeed {
    /// Bind a ledger and a fallback RNG to `pool`.
    pub fn new(
        pool: Arc<EntropyPool>,
        ledger: Box<dyn TransactionFeed>,
        fallback: Box<dyn SecureSource>,
        config: FeedConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            pool,
            ledger,
            fallback,
            config,
            signal: Mutex::new(Signal::default()),
            wake: Condvar::new(),
            stats: FeedStats::default(),
        })
    }

    pub fn pool(&self) -> &Arc<EntropyPool> {
        &self.pool
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    fn lock_signal(&self) -> MutexGuard<'_, Signal> {
        self.signal.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch once (with retries) and ingest the result.
    pub fn poll_once(&self) -> Result<PollOutcome> {
        bump(&self.stats.polls);
        let records = self.fetch_with_retry()?;
        Ok(self.ingest(&records))
    }

    /// Hand an already-fetched batch to the pool.
    pub fn ingest(&self, records: &[TransactionRecord]) -> PollOutcome {
        let Some((raw, recency)) = batch_entropy(records) else {
            debug!(
                "{}: batch of {} records had no usable hashes",
                self.ledger.name(),
                records.len()
            );
            return PollOutcome::Empty;
        };

        if self.pool.accept_batch(&raw, recency) {
            bump(&self.stats.accepted_batches);
            self.stats
                .bytes_ingested
                .fetch_add(raw.len() as u64, Ordering::Relaxed);
            debug!(
                "{}: accepted {} bytes (H={:.3} bits/byte), watermark {recency}",
                self.ledger.name(),
                raw.len(),
                quick_shannon(&raw)
            );
            PollOutcome::Accepted {
                bytes: raw.len(),
                recency,
            }
        } else {
            bump(&self.stats.rejected_batches);
            debug!(
                "{}: batch at {recency} not newer than watermark {}",
                self.ledger.name(),
                self.pool.watermark()
            );
            PollOutcome::Stale
        }
    }

    fn fetch_with_retry(&self) -> Result<Vec<TransactionRecord>> {
        let attempts = self.config.max_attempts;
        let mut reason = String::new();
        for attempt in 1..=attempts {
            match self.ledger.fetch_batch() {
                Ok(records) => return Ok(records),
                Err(e) => {
                    bump(&self.stats.failed_attempts);
                    debug!(
                        "{}: fetch attempt {attempt}/{attempts} failed: {e}",
                        self.ledger.name()
                    );
                    reason = e.to_string();
                }
            }
            if attempt < attempts && !self.pause(self.config.retry_delay(), false) {
                return Err(BlockRandomError::FeedUnavailable {
                    attempts: attempt,
                    reason: format!("stopped while retrying ({reason})"),
                });
            }
        }
        bump(&self.stats.exhausted_polls);
        Err(BlockRandomError::FeedUnavailable { attempts, reason })
    }

    /// Wait up to `timeout`. Returns `false` if a stop was requested.
    fn pause(&self, timeout: Duration, wake_on_refill: bool) -> bool {
        let guard = self.lock_signal();
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, timeout, |s| !s.stop && !(wake_on_refill && s.refill))
            .unwrap_or_else(PoisonError::into_inner);
        !guard.stop
    }

    /// Run the polling loop on the current thread until [`stop`](Self::stop).
    pub fn run(&self) {
        info!("{}: entropy feed started", self.ledger.name());
        while !self.is_stopped() {
            self.lock_signal().refill = false;
            match self.poll_once() {
                Ok(outcome) => debug!("{}: poll finished: {outcome:?}", self.ledger.name()),
                Err(e) => warn!("{}: {e}; will poll again", self.ledger.name()),
            }
            if !self.pause(self.config.poll_interval(), true) {
                break;
            }
        }
        info!("{}: entropy feed stopped", self.ledger.name());
    }

    /// Start [`run`](Self::run) on a dedicated thread.
    pub fn spawn(self: &Arc<Self>) -> std::io::Result<FeedWorker> {
        let feed = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("blockrandom-feed".to_string())
            .spawn(move || feed.run())?;
        Ok(FeedWorker {
            feed: Arc::clone(self),
            handle: Some(handle),
        })
    }

    /// Ask the loop to exit; wakes any pause in progress.
    pub fn stop(&self) {
        self.lock_signal().stop = true;
        self.wake.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.lock_signal().stop
    }

    /// Counters since the feed was created.
    pub fn health(&self) -> FeedHealth {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        FeedHealth {
            polls: load(&self.stats.polls),
            failed_attempts: load(&self.stats.failed_attempts),
            exhausted_polls: load(&self.stats.exhausted_polls),
            accepted_batches: load(&self.stats.accepted_batches),
            rejected_batches: load(&self.stats.rejected_batches),
            bytes_ingested: load(&self.stats.bytes_ingested),
            fallback_uses: load(&self.stats.fallback_uses),
            refill_requests: load(&self.stats.refill_requests),
        }
    }
}

impl Replenish for EntropyFeed {
    fn request_refill(&self) {
        bump(&self.stats.refill_requests);
        self.lock_signal().refill = true;
        self.wake.notify_all();
    }

    fn use_fallback_entropy(&self) -> Result<usize> {
        let mut buf = vec![0u8; self.config.fallback_bytes];
        self.fallback.fill(&mut buf)?;
        let stored = self.pool.put_spare(&buf);
        bump(&self.stats.fallback_uses);
        warn!("spare entropy exhausted: pushed {stored} bytes from the local secure RNG");
        Ok(stored)
    }
}

/// Handle to a running feed thread. Dropping it stops and joins the thread.
pub struct FeedWorker {
    feed: Arc<EntropyFeed>,
    handle: Option<JoinHandle<()>>,
}

impl FeedWorker {
    pub fn feed(&self) -> &Arc<EntropyFeed> {
        &self.feed
    }

    /// Stop the loop and wait for the thread to exit.
    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        self.feed.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("entropy feed thread panicked");
            }
        }
    }
}

impl Drop for FeedWorker {
    fn drop(&mut self) {
        self.join();
    }
}

/// Feed counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedHealth {
    /// Poll cycles started.
    pub polls: u64,
    /// Individual fetch attempts that failed.
    pub failed_attempts: u64,
    /// Polls that gave up after `max_attempts` failures.
    pub exhausted_polls: u64,
    /// Batches newer than the watermark.
    pub accepted_batches: u64,
    /// Batches not newer than the watermark.
    pub rejected_batches: u64,
    /// Raw bytes decoded from accepted batches.
    pub bytes_ingested: u64,
    /// Times the local secure RNG refilled Spare.
    pub fallback_uses: u64,
    /// Refill requests from blocking consumers.
    pub refill_requests: u64,
}
