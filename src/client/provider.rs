//! Order book snapshot provider.
//!
//! The provider is queried in exactly two places: when an instrument is seen
//! for the first time (bootstrap) and on forced-resync boundaries for books
//! still missing a side (refill). Both callers treat any failure as "no
//! data"; the provider must never block ingestion indefinitely, so the HTTP
//! implementation carries a request timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Error;
use crate::types::RawOrderBookMsg;

/// Source of raw order book snapshots, keyed by asset pair.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    /// Fetch the raw half books (both sides) for a pair.
    ///
    /// An empty result is valid and means the provider holds no book for
    /// the pair.
    ///
    /// # Errors
    ///
    /// Returns an error when the provider is unreachable or responds with
    /// an unusable payload; callers degrade to an empty book.
    async fn get_raw_book(&self, asset_pair: &str) -> Result<Vec<RawOrderBookMsg>, Error>;
}

/// HTTP snapshot provider client
#[derive(Debug)]
pub struct HttpSnapshotProvider {
    client: Client,
    base_url: String,
}

impl HttpSnapshotProvider {
    /// Create a provider client for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl SnapshotProvider for HttpSnapshotProvider {
    async fn get_raw_book(&self, asset_pair: &str) -> Result<Vec<RawOrderBookMsg>, Error> {
        let url = format!("{}/api/OrderBooks/{}", self.base_url, asset_pair);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Provider(format!(
                "snapshot request for {asset_pair} failed with status {status}"
            )));
        }

        Ok(response.json().await?)
    }
}

/// Null provider for deployments without a snapshot source.
///
/// Always reports "no data", so every instrument bootstraps from live
/// updates only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSnapshots;

#[async_trait]
impl SnapshotProvider for NoSnapshots {
    async fn get_raw_book(&self, _asset_pair: &str) -> Result<Vec<RawOrderBookMsg>, Error> {
        Ok(Vec::new())
    }
}
