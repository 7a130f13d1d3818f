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

//! Streaming historical-replay engine built on [`tardis_cache`].

pub mod client;
pub mod config;
mod reader;
mod replay;

pub use client::{TardisClient, TardisClientBuilder};
pub use config::Config;
pub use reader::Record;
pub use replay::enumerate_slices;
pub use tardis_cache::{Error, Filter, Result, SliceAddress};
