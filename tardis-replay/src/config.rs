//! Ambient configuration for the replay engine.

use std::path::PathBuf;
use std::time::Duration;

use tardis_cache::RetryPolicy;

/// Tunables governing concurrency, caching, and retry behavior.
///
/// Constructed with sane defaults via [`Config::default`]; use
/// [`TardisClient::builder`](crate::client::TardisClient::builder) to
/// override individual fields.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub cache_dir: PathBuf,
    pub base_url: String,
    pub concurrency: usize,
    pub prefetch_window: usize,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_initial_backoff: Duration,
    pub retry_max_backoff: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            cache_dir: std::env::temp_dir().join(".tardis-cache"),
            base_url: "https://api.tardis.dev/v1/data-feeds/".to_string(),
            concurrency: 6,
            prefetch_window: 16,
            request_timeout: Duration::from_secs(60),
            max_retries: 5,
            retry_initial_backoff: Duration::from_millis(250),
            retry_max_backoff: Duration::from_secs(4),
        }
    }
}

impl Config {
    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            initial_backoff: self.retry_initial_backoff,
            max_backoff: self.retry_max_backoff,
        }
    }
}
