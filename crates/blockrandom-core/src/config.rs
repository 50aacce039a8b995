//! Feed and pool configuration.
//!
//! Defaults follow the ledger's rate policy: one poll every 10 seconds, eight
//! attempts with an 11 second pause between failures.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{BlockRandomError, Result};
use crate::pool::DEFAULT_CAPACITY;

/// Public endpoint listing unconfirmed transactions.
pub const DEFAULT_LEDGER_URL: &str = "https://blockchain.info/unconfirmed-transactions?format=json";

/// Runtime configuration for the pool and its feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Capacity of each pool channel, in bytes.
    pub capacity: usize,
    /// Fetch attempts per poll before giving up until the next poll.
    pub max_attempts: u32,
    /// Pause between failed attempts, in seconds.
    pub retry_delay_secs: f64,
    /// Pause between polls, in seconds.
    pub poll_interval_secs: f64,
    /// Bytes pushed into Spare each time the secure fallback is used.
    pub fallback_bytes: usize,
    /// Ledger endpoint used by the HTTP collaborator.
    pub url: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_attempts: 8,
            retry_delay_secs: 11.0,
            poll_interval_secs: 10.0,
            fallback_bytes: 8,
            url: DEFAULT_LEDGER_URL.to_string(),
        }
    }
}

impl FeedConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BlockRandomError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| BlockRandomError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    /// Reject values the pool and feed cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.capacity < 4 {
            return Err(BlockRandomError::invalid(
                "capacity must hold at least one 4-byte block",
            ));
        }
        if self.max_attempts < 1 {
            return Err(BlockRandomError::invalid("max_attempts must be >= 1"));
        }
        if self.fallback_bytes < 4 {
            return Err(BlockRandomError::invalid("fallback_bytes must be >= 4"));
        }
        for (name, secs) in [
            ("retry_delay_secs", self.retry_delay_secs),
            ("poll_interval_secs", self.poll_interval_secs),
        ] {
            if seconds(secs).is_none() {
                return Err(BlockRandomError::invalid(format!(
                    "{name} must be a non-negative number of seconds, got {secs}"
                )));
            }
        }
        Ok(())
    }

    /// Pause between failed attempts. Out-of-range values read as zero.
    pub fn retry_delay(&self) -> Duration {
        seconds(self.retry_delay_secs).unwrap_or_default()
    }

    /// Pause between polls. Out-of-range values read as zero.
    pub fn poll_interval(&self) -> Duration {
        seconds(self.poll_interval_secs).unwrap_or_default()
    }
}

/// `secs` as a `Duration`, or `None` when negative, NaN or too large.
fn seconds(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = FeedConfig::default();
        assert_eq!(config.capacity, 5000);
        assert_eq!(config.max_attempts, 8);
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert_eq!(config.retry_delay(), Duration::from_secs(11));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = FeedConfig::from_json_str(r#"{"capacity": 64, "poll_interval_secs": 0.5}"#)
            .unwrap();
        assert_eq!(config.capacity, 64);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.max_attempts, 8);
        assert_eq!(config.url, DEFAULT_LEDGER_URL);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for json in [
            r#"{"capacity": 2}"#,
            r#"{"max_attempts": 0}"#,
            r#"{"fallback_bytes": 1}"#,
            r#"{"retry_delay_secs": -1.0}"#,
            r#"{"poll_interval_secs": 1e20}"#,
            r#"{"retry_delay_secs": 1e300}"#,
        ] {
            let err = FeedConfig::from_json_str(json).unwrap_err();
            assert!(err.is_invalid_argument(), "{json} should be rejected, got {err}");
        }
    }

    #[test]
    fn test_unvalidated_huge_interval_does_not_panic() {
        let config = FeedConfig {
            poll_interval_secs: 1e20,
            retry_delay_secs: f64::NAN,
            ..FeedConfig::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.poll_interval(), Duration::ZERO);
        assert_eq!(config.retry_delay(), Duration::ZERO);
    }

    #[test]
    fn test_malformed_json() {
        let err = FeedConfig::from_json_str("capacity = 5").unwrap_err();
        assert!(matches!(err, BlockRandomError::Config(_)));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_attempts": 3, "url": "http://localhost:8080/txs"}}"#).unwrap();
        let config = FeedConfig::from_path(file.path()).unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.url, "http://localhost:8080/txs");
    }

    #[test]
    fn test_from_missing_path() {
        let err = FeedConfig::from_path("/nonexistent/blockrandom.json").unwrap_err();
        assert!(matches!(err, BlockRandomError::Config(_)));
    }
}
