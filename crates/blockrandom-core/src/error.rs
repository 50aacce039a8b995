//! Error taxonomy shared by every layer of the crate.

use thiserror::Error;

/// Result alias used across `blockrandom-core`.
pub type Result<T> = std::result::Result<T, BlockRandomError>;

/// Everything that can go wrong between the ledger and a numeric caller.
///
/// Only [`BlockRandomError::InvalidArgument`] and
/// [`BlockRandomError::PoolExhausted`] ever reach callers of the numeric API.
/// Feed-side variants are absorbed by the polling loop and logged.
#[derive(Debug, Error)]
pub enum BlockRandomError {
    /// Bad counts, empty ranges, empty sequences, invalid configuration values.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The ledger could not be reached after all retry attempts.
    #[error("external feed unavailable after {attempts} attempt(s): {reason}")]
    FeedUnavailable { attempts: u32, reason: String },

    /// The ledger answered with something that is not a transaction batch.
    #[error("malformed transaction batch: {0}")]
    MalformedBatch(String),

    /// Both channels were empty and the local secure RNG failed too.
    #[error("entropy pool exhausted: {0}")]
    PoolExhausted(String),

    /// A configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl BlockRandomError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Transport failure for a single fetch attempt.
    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        Self::FeedUnavailable {
            attempts: 1,
            reason: reason.to_string(),
        }
    }

    /// Whether the error comes from the caller's arguments rather than the
    /// entropy machinery.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

impl From<serde_json::Error> for BlockRandomError {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedBatch(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_feed_unavailable() {
        let e = BlockRandomError::FeedUnavailable {
            attempts: 8,
            reason: "connection refused".into(),
        };
        assert_eq!(
            e.to_string(),
            "external feed unavailable after 8 attempt(s): connection refused"
        );
    }

    #[test]
    fn test_is_invalid_argument() {
        assert!(BlockRandomError::invalid("n must be >= 1").is_invalid_argument());
        assert!(!BlockRandomError::PoolExhausted("os rng".into()).is_invalid_argument());
    }

    #[test]
    fn test_json_error_maps_to_malformed_batch() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let e: BlockRandomError = err.into();
        assert!(matches!(e, BlockRandomError::MalformedBatch(_)));
    }
}
