//! Slice Fetcher: ensures a slice address is present in the Cache Store.

use std::time::Duration;

use async_compression::tokio::bufread::GzipDecoder;
use futures::TryStreamExt;
use reqwest::{Client, StatusCode};
use tokio::io::BufReader;
use tokio_util::io::StreamReader;
use tracing::{debug, trace, warn};

use crate::address::SliceAddress;
use crate::error::{Error, Result};
use crate::store::CacheStore;

/// Retry budget for the Slice Fetcher.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(4),
        }
    }
}

impl RetryPolicy {
    fn backoff_for(&self, attempt: u32) -> Duration {
        let millis = self
            .initial_backoff
            .as_millis()
            .saturating_mul(1u128 << attempt.min(16));
        let capped = millis.min(self.max_backoff.as_millis());
        Duration::from_millis(capped as u64)
    }
}

#[derive(Clone)]
pub struct SliceFetcher {
    client: Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl SliceFetcher {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            retry,
        }
    }

    fn remote_url(&self, address: &SliceAddress) -> Result<reqwest::Url> {
        let base = if self.base_url.ends_with('/') {
            self.base_url.clone()
        } else {
            format!("{}/", self.base_url)
        };
        let mut url = reqwest::Url::parse(&format!("{base}{}/", address.exchange))
            .map_err(|e| Error::InvalidArgument(format!("invalid base URL: {e}")))?;
        url = url
            .join(&address.remote_relpath())
            .map_err(|e| Error::InvalidArgument(format!("invalid slice path: {e}")))?;
        url.query_pairs_mut()
            .append_pair("filters", &address.filters_query_value());
        Ok(url)
    }

    /// Ensures `address` is present in `store`, fetching and decompressing
    /// it from the remote service if necessary.
    pub async fn ensure(&self, store: &CacheStore, address: &SliceAddress) -> Result<()> {
        if store.has(address).await {
            trace!(%address, "cache hit, skipping fetch");
            return Ok(());
        }

        let mut last_err = None;
        for attempt in 0..self.retry.max_attempts {
            match self.try_fetch_once(store, address).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retriable() => {
                    warn!(%address, attempt, error = %err, "retriable fetch error");
                    last_err = Some(err);
                    if attempt + 1 < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.backoff_for(attempt)).await;
                    }
                }
                Err(err) => return Err(err),
            }
        }

        warn!(%address, "exhausted retries");
        let _ = last_err;
        Err(Error::Unavailable)
    }

    async fn try_fetch_once(&self, store: &CacheStore, address: &SliceAddress) -> Result<()> {
        let url = self.remote_url(address)?;

        let mut request = self.client.get(url);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;
        let status = response.status();

        match status {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(Error::Unauthorized),
            StatusCode::NOT_FOUND => return Err(Error::NotFound),
            s if s.is_server_error() => return Err(Error::Http(response.error_for_status().unwrap_err())),
            s if s.is_client_error() => return Err(Error::BadRequest { status: s }),
            _ => {}
        }

        debug!(%address, "downloading slice");

        let byte_stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let reader = StreamReader::new(byte_stream);
        let decoder = GzipDecoder::new(BufReader::new(reader));

        store.publish(address, decoder).await
    }
}
