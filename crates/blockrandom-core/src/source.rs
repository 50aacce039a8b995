//! Collaborator traits: where raw entropy comes from.
//!
//! The pool is fed by two kinds of collaborator:
//! - a [`TransactionFeed`] that returns the latest batch of ledger
//!   transactions (hex hash + timestamp), and
//! - a [`SecureSource`], the local OS-grade RNG used only as a last resort
//!   when the Spare channel runs dry.

use serde::{Deserialize, Serialize};

use crate::error::{BlockRandomError, Result};

/// One unconfirmed ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction hash as a hex string.
    pub hash: String,
    /// Seconds since the Unix epoch at which the ledger saw the transaction.
    #[serde(alias = "timestamp")]
    pub time: u64,
}

impl TransactionRecord {
    pub fn new(hash: impl Into<String>, time: u64) -> Self {
        Self {
            hash: hash.into(),
            time,
        }
    }
}

/// Source of ledger transaction batches.
pub trait TransactionFeed: Send + Sync {
    /// Fetch the latest batch. Transport failures must surface as
    /// [`BlockRandomError::FeedUnavailable`].
    fn fetch_batch(&self) -> Result<Vec<TransactionRecord>>;

    /// Short identifier used in log lines.
    fn name(&self) -> &str {
        "ledger"
    }
}

/// Local secure random byte source.
pub trait SecureSource: Send + Sync {
    /// Fill `buf` with uniformly distributed bytes.
    fn fill(&self, buf: &mut [u8]) -> Result<()>;
}

/// Operating-system CSPRNG via the `getrandom` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsSecureSource;

impl SecureSource for OsSecureSource {
    fn fill(&self, buf: &mut [u8]) -> Result<()> {
        getrandom::fill(buf)
            .map_err(|e| BlockRandomError::PoolExhausted(format!("OS CSPRNG failed: {e}")))
    }
}

#[derive(Deserialize)]
struct UnconfirmedTransactions {
    txs: Vec<TransactionRecord>,
}

/// Parse the ledger's unconfirmed-transactions document (`{"txs": [...]}`).
///
/// Extra fields on each transaction are ignored.
pub fn parse_unconfirmed(json: &str) -> Result<Vec<TransactionRecord>> {
    let doc: UnconfirmedTransactions = serde_json::from_str(json)?;
    Ok(doc.txs)
}

/// Turn a batch into raw entropy bytes plus the batch's recency.
///
/// Records are ordered newest first; each hash is hex-decoded and the results
/// concatenated. Records whose hash is not valid hex are skipped. Returns
/// `None` when nothing usable remains.
pub fn batch_entropy(records: &[TransactionRecord]) -> Option<(Vec<u8>, u64)> {
    let mut ordered: Vec<&TransactionRecord> = records.iter().collect();
    ordered.sort_by(|a, b| b.time.cmp(&a.time));

    let mut raw = Vec::with_capacity(records.len() * 32);
    let mut newest = None;
    for record in ordered {
        match hex::decode(&record.hash) {
            Ok(bytes) if !bytes.is_empty() => {
                newest.get_or_insert(record.time);
                raw.extend_from_slice(&bytes);
            }
            Ok(_) => {}
            Err(e) => {
                log::debug!("skipping transaction with malformed hash {:?}: {e}", record.hash)
            }
        }
    }
    newest.map(|recency| (raw, recency))
}
