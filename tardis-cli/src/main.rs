#![deny(
    asm_sub_register,
    deprecated,
    missing_abi,
    unsafe_code,
    unused_macros,
    unused_must_use,
    unused_unsafe
)]
#![deny(clippy::from_over_into, clippy::needless_question_mark)]

//! Manual smoke-test surface for [`tardis_replay`]. Not part of the engine;
//! just enough wiring to drive a replay from a shell and watch it stream.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use tardis_replay::{Filter, TardisClient};
use tracing_subscriber::filter::EnvFilter;

/// Replay historical market data through the local cache.
#[derive(Parser, Debug)]
struct Args {
    /// Venue to replay, e.g. "bitmex".
    exchange: String,

    /// Start of the replay window: a bare date (2019-06-01) or an RFC3339
    /// datetime (2019-06-01T00:00:00Z).
    from: String,

    /// End of the replay window (exclusive), same format as `from`.
    to: String,

    /// Restrict to a channel, optionally "channel:SYMBOL,SYMBOL". Repeatable.
    #[arg(long = "filter", value_name = "CHANNEL[:SYMBOLS]")]
    filters: Vec<String>,

    /// API key. Falls back to the TARDIS_API_KEY environment variable.
    #[arg(long)]
    api_key: Option<String>,

    /// Overrides the on-disk cache directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Overrides the data-feed base URL, mainly for pointing at a mock.
    #[arg(long)]
    base_url: Option<String>,

    /// Number of slices kept in flight ahead of the consumer.
    #[arg(long, default_value_t = 16)]
    prefetch_window: usize,

    /// Maximum concurrent HTTP requests against the data feed.
    #[arg(long, default_value_t = 6)]
    concurrency: usize,

    /// Deletes the on-disk cache before replaying.
    #[arg(long)]
    clear_cache: bool,
}

fn parse_filter(raw: &str) -> Filter {
    match raw.split_once(':') {
        Some((channel, symbols)) => {
            Filter::new(channel, symbols.split(',').filter(|s| !s.is_empty()))
        }
        None => Filter::channel_only(raw),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = Args::parse();

    let api_key = args
        .api_key
        .or_else(|| std::env::var("TARDIS_API_KEY").ok())
        .unwrap_or_default();

    let mut builder = TardisClient::builder()
        .api_key(api_key)
        .prefetch_window(args.prefetch_window)
        .concurrency(args.concurrency);
    if let Some(cache_dir) = args.cache_dir {
        builder = builder.cache_dir(cache_dir);
    }
    if let Some(base_url) = args.base_url {
        builder = builder.base_url(base_url);
    }
    let client = builder.build();

    if args.clear_cache {
        tracing::info!("clearing cache before replay");
        client.clear_cache().await?;
    }

    let filters: Vec<Filter> = args.filters.iter().map(|f| parse_filter(f)).collect();

    let mut stream = Box::pin(client.replay(args.exchange, &args.from, &args.to, filters));
    let mut count: u64 = 0;
    while let Some(result) = stream.next().await {
        let (timestamp, message) = result?;
        println!("{timestamp} {message}");
        count += 1;
    }
    tracing::info!(records = count, "replay finished");

    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        #[cfg(debug_assertions)]
        return EnvFilter::new("info").add_directive("tardis_replay=debug".parse().unwrap());

        #[cfg(not(debug_assertions))]
        return EnvFilter::new("info");
    });

    tracing_subscriber::fmt()
        .pretty()
        .with_env_filter(filter)
        .init();
}
