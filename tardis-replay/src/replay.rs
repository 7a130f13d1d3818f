//! Replay Pipeline: the engine proper.
//!
//! Enumerates the slices covering `[from, to)`, drives a bounded pool of
//! fetch tasks ahead of a delivery cursor, and streams parsed records to
//! the caller in strict slice order regardless of fetch completion order.

use std::collections::VecDeque;
use std::sync::Arc;

use async_stream::try_stream;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, TimeZone, Timelike, Utc};
use futures::Stream;
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, warn};

use tardis_cache::{CacheStore, Error, Filter, SliceAddress, SliceFetcher, SliceMinute};

use crate::config::Config;
use crate::reader::{read_trimmed, Record};

/// Splits `[from, to)` into the ordered list of one-minute slice
/// addresses it covers. `s_0` is the minute containing `from`; the last
/// slice is the minute containing `to` (exclusive only when `to` is
/// itself minute-aligned).
pub fn enumerate_slices(
    exchange: &str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    filters: &[Filter],
) -> Result<Vec<SliceAddress>, Error> {
    if exchange.is_empty() {
        return Err(Error::InvalidArgument("exchange must not be empty".to_string()));
    }
    if from >= to {
        return Err(Error::InvalidArgument(format!(
            "from ({from}) must be strictly before to ({to})"
        )));
    }

    let mut minutes = Vec::new();
    let mut cursor = floor_to_minute(from);
    let last = floor_to_minute(to - ChronoDuration::nanoseconds(1));

    while cursor <= last {
        minutes.push(SliceMinute {
            year: cursor.year(),
            month: cursor.month(),
            day: cursor.day(),
            hour: cursor.hour(),
            minute: cursor.minute(),
        });
        cursor += ChronoDuration::minutes(1);
    }

    Ok(minutes
        .into_iter()
        .map(|minute| SliceAddress::new(exchange, minute, filters.to_vec()))
        .collect())
}

fn floor_to_minute(t: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(t.year(), t.month(), t.day(), t.hour(), t.minute(), 0)
        .single()
        .expect("valid UTC calendar fields")
}

struct PipelineContext {
    store: CacheStore,
    fetcher: SliceFetcher,
    semaphore: Arc<Semaphore>,
}

impl PipelineContext {
    fn new(config: &Config) -> Result<Self, Error> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;

        let fetcher = SliceFetcher::new(client, &config.base_url, &config.api_key, config.retry_policy());

        Ok(Self {
            store: CacheStore::new(&config.cache_dir),
            fetcher,
            semaphore: Arc::new(Semaphore::new(config.concurrency.max(1))),
        })
    }

    fn schedule(&self, address: SliceAddress) -> AbortOnDropHandle<Result<(), Error>> {
        let store = self.store.clone();
        let fetcher = self.fetcher.clone();
        let semaphore = self.semaphore.clone();

        AbortOnDropHandle::new(tokio::task::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore is never closed");
            fetcher.ensure(&store, &address).await
        }))
    }

    /// Reads a committed slice, trimmed to the delivery window, healing
    /// once from a corrupt cache entry before giving up.
    async fn read_slice(
        &self,
        address: &SliceAddress,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Record>, Error> {
        let file = self.store.open_for_read(address).await?;
        match read_trimmed(address, tokio::io::BufReader::new(file), from, to).await {
            Ok(records) => Ok(records),
            Err(Error::CorruptCache { reason, .. }) => {
                warn!(%address, reason, "corrupt cache entry, evicting and re-fetching once");
                self.store.remove(address).await?;
                self.fetcher.ensure(&self.store, address).await?;
                let file = self.store.open_for_read(address).await?;
                read_trimmed(address, tokio::io::BufReader::new(file), from, to).await
            }
            Err(other) => Err(other),
        }
    }
}

/// Replays `[from, to)` for `exchange`, optionally narrowed by `filters`,
/// as a lazy, in-order stream of `(local_timestamp, message)` pairs.
pub fn replay(
    config: Config,
    exchange: String,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    filters: Vec<Filter>,
) -> impl Stream<Item = Result<(DateTime<Utc>, serde_json::Value), Error>> {
    try_stream! {
        let slices = enumerate_slices(&exchange, from, to, &filters)?;
        let ctx = PipelineContext::new(&config)?;
        let window = config.prefetch_window.max(1);

        let mut scheduled: VecDeque<AbortOnDropHandle<Result<(), Error>>> = VecDeque::new();
        let mut next_to_schedule = 0usize;

        let schedule_upto = |next_to_schedule: &mut usize, scheduled: &mut VecDeque<_>, upto: usize| {
            while *next_to_schedule < slices.len() && *next_to_schedule < upto {
                scheduled.push_back(ctx.schedule(slices[*next_to_schedule].clone()));
                *next_to_schedule += 1;
            }
        };

        schedule_upto(&mut next_to_schedule, &mut scheduled, window);

        for (k, address) in slices.iter().enumerate() {
            schedule_upto(&mut next_to_schedule, &mut scheduled, k + window + 1);

            let handle = scheduled.pop_front().expect("scheduled a task for every slice index");
            let fetch_result = handle.await.map_err(|_join_err| Error::Unavailable)?;
            fetch_result?;

            debug!(%address, k, total = slices.len(), "slice ready, delivering");

            let records = ctx.read_slice(address, from, to).await?;
            for record in records {
                yield (record.local_timestamp, record.message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn enumerate_two_minutes() {
        let slices = enumerate_slices(
            "bitmex",
            dt("2019-06-01T00:00:00Z"),
            dt("2019-06-01T00:02:00Z"),
            &[],
        )
        .unwrap();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].minute.minute, 0);
        assert_eq!(slices[1].minute.minute, 1);
    }

    #[test]
    fn enumerate_unaligned_from_includes_containing_minute() {
        let slices = enumerate_slices(
            "bitmex",
            dt("2019-06-01T00:00:30Z"),
            dt("2019-06-01T00:01:30Z"),
            &[],
        )
        .unwrap();
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].minute.minute, 0);
        assert_eq!(slices[1].minute.minute, 1);
    }

    #[test]
    fn enumerate_aligned_to_excludes_boundary_minute() {
        let slices = enumerate_slices(
            "bitmex",
            dt("2019-06-01T00:00:00Z"),
            dt("2019-06-01T00:01:00Z"),
            &[],
        )
        .unwrap();
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].minute.minute, 0);
    }

    #[test]
    fn from_equal_to_is_invalid_argument() {
        let err = enumerate_slices(
            "bitmex",
            dt("2019-06-01T00:00:00Z"),
            dt("2019-06-01T00:00:00Z"),
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn empty_exchange_is_invalid_argument() {
        let err = enumerate_slices("", dt("2019-06-01T00:00:00Z"), dt("2019-06-01T00:01:00Z"), &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
