//! HTTP ledger collaborator (feature `http`).

use std::time::Duration;

use reqwest::blocking::Client;

use crate::config::FeedConfig;
use crate::error::{BlockRandomError, Result};
use crate::source::{TransactionFeed, TransactionRecord, parse_unconfirmed};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Polls an unconfirmed-transactions endpoint over HTTPS.
#[derive(Debug, Clone)]
pub struct LedgerFeed {
    client: Client,
    url: String,
}

impl LedgerFeed {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("blockrandom/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BlockRandomError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TransactionFeed for LedgerFeed {
    fn fetch_batch(&self) -> Result<Vec<TransactionRecord>> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.text())
            .map_err(BlockRandomError::unavailable)?;
        parse_unconfirmed(&body)
    }

    fn name(&self) -> &str {
        &self.url
    }
}
