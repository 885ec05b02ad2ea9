//! The network side of the proxy.

use async_trait::async_trait;

use crate::http::{PageResponse, ProxyRequest};

/// Transport-level fetch failures.
///
/// An HTTP error status is not a failure: the fetcher returns it as a
/// regular [`PageResponse`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// DNS, connect, TLS or body read errors.
    #[error("network error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    /// The response exceeded the configured byte limit.
    #[error("response too large: {0}")]
    TooLarge(String),

    /// The host gave up on the request before it completed.
    #[error("request aborted")]
    Aborted,

    /// The request could not be turned into a network call at all.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Performs actual HTTP fetches on behalf of the proxy.
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
    async fn fetch(&self, request: &ProxyRequest) -> Result<PageResponse, FetchError>;
}
