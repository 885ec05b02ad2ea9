//! Structured errors for the offgrid host.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use offgrid_core::Error;

/// Errors raised while bringing a generation up or answering host routes.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Every install attempt failed; the generation never goes live.
    #[error("INSTALL_FAILED: gave up after {attempts} attempt(s): {source}")]
    InstallExhausted {
        attempts: u32,
        #[source]
        source: Error,
    },

    #[error(transparent)]
    Core(#[from] Error),
}

impl IntoResponse for HostError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self, "host route failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}
