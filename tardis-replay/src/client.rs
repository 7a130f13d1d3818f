//! The public client surface: `TardisClient`.

use std::path::{Path, PathBuf};

use async_stream::try_stream;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use futures::{Stream, StreamExt};
use tardis_cache::{CacheStore, Error, Filter};
use tracing::info;

use crate::config::Config;
use crate::replay::replay;

/// Parses a `from_date`/`to_date` argument: either a bare ISO-8601 date
/// (`YYYY-MM-DD`, treated as midnight UTC) or a full RFC3339 datetime.
fn parse_bound(raw: &str) -> Result<DateTime<Utc>, Error> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
        return Ok(Utc.from_utc_datetime(&midnight));
    }
    Err(Error::InvalidArgument(format!(
        "{raw:?} is neither an ISO-8601 date (YYYY-MM-DD) nor an RFC3339 datetime"
    )))
}

/// Replays historical tick-level market data for a venue, mediated by a
/// local on-disk cache.
///
/// Construct with [`TardisClient::new`] for the defaults, or
/// [`TardisClient::builder`] to override the cache directory, base URL,
/// or concurrency tunables.
#[derive(Debug, Clone)]
pub struct TardisClient {
    config: Config,
}

impl TardisClient {
    /// A client with an API key (pass `""` for unauthenticated access)
    /// and every other tunable at its default.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::builder().api_key(api_key).build()
    }

    pub fn builder() -> TardisClientBuilder {
        TardisClientBuilder::default()
    }

    /// Replays `[from, to)` for `exchange`, optionally narrowed by
    /// `filters`, as a lazy, in-order stream of `(local_timestamp,
    /// message)` pairs.
    ///
    /// `from` and `to` each accept either a bare ISO-8601 date
    /// (`YYYY-MM-DD`, midnight UTC) or a full RFC3339 datetime. A
    /// malformed bound surfaces as the stream's first (and only) item,
    /// `Err(Error::InvalidArgument(_))`.
    pub fn replay(
        &self,
        exchange: impl Into<String>,
        from: &str,
        to: &str,
        filters: Vec<Filter>,
    ) -> impl Stream<Item = Result<(DateTime<Utc>, serde_json::Value), Error>> {
        let config = self.config.clone();
        let exchange = exchange.into().to_lowercase();
        let from = parse_bound(from);
        let to = parse_bound(to);

        try_stream! {
            let from = from?;
            let to = to?;
            let mut inner = Box::pin(replay(config, exchange, from, to, filters));
            while let Some(item) = inner.next().await {
                yield item?;
            }
        }
    }

    /// Deletes the entire on-disk cache. Safe to call while no replay is
    /// active; in-flight replays racing a clear will simply re-fetch.
    pub async fn clear_cache(&self) -> Result<(), Error> {
        info!(cache_dir = %self.config.cache_dir.display(), "clearing cache");
        CacheStore::new(&self.config.cache_dir).clear().await
    }

    pub fn cache_dir(&self) -> &Path {
        &self.config.cache_dir
    }
}

/// Builder for [`TardisClient`], overriding individual [`Config`] fields.
#[derive(Debug, Default)]
pub struct TardisClientBuilder {
    config: Config,
}

impl TardisClientBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = api_key.into();
        self
    }

    pub fn cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.config.cache_dir = cache_dir.into();
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn prefetch_window(mut self, prefetch_window: usize) -> Self {
        self.config.prefetch_window = prefetch_window;
        self
    }

    pub fn build(self) -> TardisClient {
        TardisClient { config: self.config }
    }
}
