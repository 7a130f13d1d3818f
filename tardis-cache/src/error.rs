//! Shared error type for the cache and fetch layers.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// An error surfaced by the addressing, cache, or fetch layers.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unauthorized: the requested slice needs an API key or a higher tier")]
    Unauthorized,

    #[error("not found: the requested slice is outside the service's coverage")]
    NotFound,

    #[error("bad request ({status})")]
    BadRequest { status: reqwest::StatusCode },

    #[error("service unavailable after exhausting retries")]
    Unavailable,

    #[error("corrupt cache entry {address}: {reason}")]
    CorruptCache { address: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Whether a fetch attempt that produced this error should be retried.
    ///
    /// `Io` is retriable only when it wraps a transport failure that
    /// surfaced mid-body (the response stream breaks while `publish` is
    /// copying it to disk) — a genuine local filesystem failure (disk
    /// full, permission denied) is not something a retry will fix.
    pub(crate) fn is_retriable(&self) -> bool {
        match self {
            Error::Http(_) => true,
            Error::Io(io_err) => io_err
                .get_ref()
                .is_some_and(|inner| inner.is::<reqwest::Error>()),
            _ => false,
        }
    }
}
