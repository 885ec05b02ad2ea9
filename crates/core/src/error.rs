//! Unified error types for offgrid.
//!
//! Every message carries a stable code prefix so log lines can be grepped
//! without knowing the variant layout.

use tokio_rusqlite::rusqlite;

use crate::fetch::FetchError;

/// Unified error type shared by the proxy, the cache store and the host.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty namespace name).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A request URL could not be parsed.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Network fetch failed at the transport level.
    #[error("FETCH_FAILED: {0}")]
    Fetch(#[from] FetchError),

    /// Install could not leave a usable offline page behind.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored headers could not be encoded or decoded.
    #[error("CACHE_ERROR: corrupt headers: {0}")]
    CorruptHeaders(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CorruptHeaders(err.to_string())
    }
}
