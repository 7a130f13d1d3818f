//! Slice addressing.
//!
//! A [`SliceAddress`] is the deterministic identity of one UTC minute of
//! data for one `(exchange, filters)` tuple. It doubles as the on-disk
//! cache path (joined under a cache root) and the remote URL path (joined
//! under the data service's base URL).

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// A `(channel, symbols)` filter pair, order-preserved.
///
/// An empty `symbols` list means "all symbols for that channel." Filter
/// identity is positional: two filter lists with the same channels and
/// symbols but a different order are different cache keys by design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filter {
    pub channel: String,
    pub symbols: Vec<String>,
}

impl Filter {
    pub fn new(channel: impl Into<String>, symbols: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            channel: channel.into(),
            symbols: symbols.into_iter().map(Into::into).collect(),
        }
    }

    /// A filter with no symbol restriction: "all symbols for this channel."
    pub fn channel_only(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            symbols: Vec::new(),
        }
    }
}

/// The calendar identity of a slice: one UTC minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SliceMinute {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

/// The full, deterministic identity of a slice.
#[derive(Debug, Clone)]
pub struct SliceAddress {
    pub exchange: String,
    pub minute: SliceMinute,
    pub filters: Vec<Filter>,
}

/// Reserved path component standing in for "no filters."
const UNFILTERED_MARKER: &str = "all";

/// Suffix used for committed cache entries (decompressed NDJSON).
const CACHE_SUFFIX: &str = ".ndjson";

impl SliceAddress {
    pub fn new(exchange: impl Into<String>, minute: SliceMinute, filters: Vec<Filter>) -> Self {
        Self {
            exchange: exchange.into(),
            minute,
            filters,
        }
    }

    /// The filter path component: `all` when unfiltered, otherwise the
    /// hex-encoded SHA-256 digest of the canonical filter JSON. Hashing
    /// keeps the path filesystem-safe regardless of what characters a
    /// venue's channel/symbol names contain, while still being stable and
    /// order-sensitive.
    fn filter_component(&self) -> String {
        if self.filters.is_empty() {
            return UNFILTERED_MARKER.to_string();
        }

        let canonical =
            serde_json::to_vec(&self.filters).expect("Filter serialization is infallible");
        let digest = Sha256::digest(&canonical);
        hex::encode(digest)
    }

    /// The on-disk cache path for this slice, relative to the cache root.
    pub fn cache_relpath(&self) -> String {
        format!(
            "{}/{:04}-{:02}-{:02}/{:02}/{:02}/{}{}",
            self.exchange,
            self.minute.year,
            self.minute.month,
            self.minute.day,
            self.minute.hour,
            self.minute.minute,
            self.filter_component(),
            CACHE_SUFFIX
        )
    }

    /// The remote URL path (no query string), relative to the service's
    /// base URL for this exchange.
    pub fn remote_relpath(&self) -> String {
        format!(
            "{:04}/{:02}/{:02}/{:02}/{:02}.json.gz",
            self.minute.year, self.minute.month, self.minute.day, self.minute.hour, self.minute.minute
        )
    }

    /// The `filters` query parameter value: a JSON encoding of the filter
    /// list, left for the HTTP client to percent-encode.
    pub fn filters_query_value(&self) -> String {
        serde_json::to_string(&self.filters).expect("Filter serialization is infallible")
    }
}

impl fmt::Display for SliceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cache_relpath())
    }
}
