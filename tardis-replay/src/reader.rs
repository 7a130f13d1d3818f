//! Slice Reader: parses a committed cache entry into ordered records.
//!
//! A slice covers one UTC minute for one exchange, so its parsed record
//! set is inherently small and bounded; we read it line-by-line (never
//! slurping the raw file into one buffer) and return the trimmed records
//! as a `Vec`, which the Replay Pipeline streams to the consumer one at a
//! time. Materializing a single slice's records is what makes the
//! corrupt-cache self-heal a clean retry-from-scratch rather than a
//! partial, duplicating re-yield.

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use tardis_cache::{Error, SliceAddress};

/// A single decoded record: an observer-side timestamp and an opaque
/// parsed JSON message body.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub local_timestamp: DateTime<Utc>,
    pub message: serde_json::Value,
}

/// Reads records from `source`, keeping only those with
/// `from <= local_timestamp < to`, and stopping as soon as a record past
/// `to` is observed (records are file-ordered, so this is a prefix/suffix
/// trim, not a full scan).
pub async fn read_trimmed<R>(
    address: &SliceAddress,
    source: R,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Record>, Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = BufReader::new(source).lines();
    let mut out = Vec::new();

    while let Some(line) = lines.next_line().await.map_err(Error::Io)? {
        if line.is_empty() {
            continue;
        }

        let record = parse_line(address, &line)?;

        if record.local_timestamp >= to {
            break;
        }
        if record.local_timestamp < from {
            continue;
        }
        out.push(record);
    }

    Ok(out)
}

fn parse_line(address: &SliceAddress, line: &str) -> Result<Record, Error> {
    let (ts_str, json_str) = line.split_once(' ').ok_or_else(|| Error::CorruptCache {
        address: address.to_string(),
        reason: format!("missing timestamp/message separator in line: {line:?}"),
    })?;

    let local_timestamp = DateTime::parse_from_rfc3339(ts_str)
        .map_err(|e| Error::CorruptCache {
            address: address.to_string(),
            reason: format!("bad timestamp {ts_str:?}: {e}"),
        })?
        .with_timezone(&Utc);

    let message: serde_json::Value = serde_json::from_str(json_str).map_err(|e| Error::CorruptCache {
        address: address.to_string(),
        reason: format!("bad JSON message: {e}"),
    })?;

    Ok(Record {
        local_timestamp,
        message,
    })
}
