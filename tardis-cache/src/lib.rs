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

//! The cache and transport spine of the replay engine: slice addressing,
//! the on-disk cache store, and the HTTP fetcher that keeps the store
//! populated from the remote data service.

pub mod address;
pub mod error;
pub mod fetch;
pub mod store;

pub use address::{Filter, SliceAddress, SliceMinute};
pub use error::{Error, Result};
pub use fetch::{RetryPolicy, SliceFetcher};
pub use store::CacheStore;
