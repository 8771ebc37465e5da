//! Timestamp to block resolution for bounded log scans.

use crate::errors::{MarketplaceError, Result};
use crate::retry::{retry, RetryConfig};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Inclusive block range for a log scan; `to = None` means the chain head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockWindow {
    pub from: u64,
    pub to: Option<u64>,
}

impl BlockWindow {
    /// Starts `lookback` blocks before `nearest`, ends `limit` blocks after it
    pub fn anchored(nearest: u64, lookback: u64, limit: Option<u64>) -> Self {
        Self {
            from: nearest.saturating_sub(lookback),
            to: limit.map(|l| nearest.saturating_add(l)),
        }
    }

    /// Whole chain history
    pub fn unbounded() -> Self {
        Self { from: 0, to: None }
    }
}

#[derive(Debug, Deserialize)]
struct BlockLookup {
    height: u64,
}

/// Resolves a unix timestamp to the nearest block through a DefiLlama-style API
pub struct BlockLocator {
    http: Client,
    base_url: String,
    retry: RetryConfig,
}

impl BlockLocator {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            retry: RetryConfig::default(),
        })
    }

    pub async fn nearest_block(&self, timestamp: u64) -> Result<u64> {
        let url = format!("{}{}", self.base_url, timestamp);
        let lookup: BlockLookup = retry(&self.retry, || async {
            let response = self.http.get(&url).send().await?.error_for_status()?;
            Ok::<_, MarketplaceError>(response.json().await?)
        })
        .await?;

        debug!(timestamp, block = lookup.height, "Resolved nearest block");
        Ok(lookup.height)
    }
}
