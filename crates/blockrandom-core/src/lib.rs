//! # blockrandom-core
//!
//! **Random numbers seeded by a public ledger.**
//!
//! `blockrandom-core` turns the hashes of unconfirmed ledger transactions into
//! bytes, bits, bounded integers, floats and sequence operations. A background
//! feed keeps a bounded pool topped up; consumers either wait for fresh ledger
//! bytes or recycle what has already been seen.
//!
//! ## Quick Start
//!
//! ```no_run
//! use blockrandom_core::{BlockRandom, FeedConfig, Result, TransactionFeed, TransactionRecord};
//!
//! struct FixedLedger;
//!
//! impl TransactionFeed for FixedLedger {
//!     fn fetch_batch(&self) -> Result<Vec<TransactionRecord>> {
//!         Ok(vec![TransactionRecord::new("5f3c9a0e", 1_700_000_000)])
//!     }
//! }
//!
//! let rng = BlockRandom::start(FeedConfig::default(), Box::new(FixedLedger)).unwrap();
//!
//! // Never waits on the ledger.
//! let roll = rng.recycled_int(1, 7).unwrap();
//! assert!((1..7).contains(&roll));
//!
//! // Fresh ledger bytes only.
//! let bytes = rng.rand_bytes(4).unwrap();
//! assert_eq!(bytes.len(), 4);
//! ```
//!
//! ## Architecture
//!
//! Ledger → Feed (retry, watermark) → Pool (Primary + Spare) → Bit source → Numeric API
//!
//! Two consumption modes:
//! - **Blocking**: single-use bytes from Primary. Waits on a condvar while the
//!   feed fetches more.
//! - **Recycled**: Primary if available, otherwise a Spare block stretched
//!   through MurmurHash3. Output is pushed back into Spare. When Spare is dry
//!   the local OS RNG tops it up, so this mode never waits.
//!
//! With the `http` feature, [`http::LedgerFeed`] polls a public
//! unconfirmed-transactions endpoint.
//!
//! This is not a cryptographic RNG: the ledger is public and recycled output
//! is derived from previously emitted bytes.

pub mod bits;
pub mod channel;
pub mod config;
pub mod error;
pub mod feed;
pub mod generator;
pub mod hash;
#[cfg(feature = "http")]
pub mod http;
pub mod numeric;
pub mod pool;
pub mod quality;
pub mod sequence;
pub mod source;

#[cfg(test)]
mod testing;

pub use bits::{BitSource, EntropyDraw, Mode};
pub use config::{DEFAULT_LEDGER_URL, FeedConfig};
pub use error::{BlockRandomError, Result};
pub use feed::{EntropyFeed, FeedHealth, FeedWorker, PollOutcome, Replenish};
pub use generator::{BlockRandom, GeneratorHealth};
pub use hash::{murmur3_32, stretch_block};
pub use numeric::{MAX_INT_RANGE, NumericDeriver};
pub use pool::{DEFAULT_CAPACITY, EntropyPool, PoolStatus};
pub use quality::{quick_min_entropy, quick_shannon};
pub use sequence::SequenceOps;
pub use source::{
    OsSecureSource, SecureSource, TransactionFeed, TransactionRecord, batch_entropy,
    parse_unconfirmed,
};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
