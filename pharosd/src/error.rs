use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use pharos_core::AuditError;

/// Wraps coordinator failures for the HTTP layer. Every audit failure maps
/// to a 400 with an `Error: <message>` body, matching the service's
/// long-standing contract; the caller decides whether and how to retry.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ServerError(#[from] AuditError);

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "audit request failed");
        (StatusCode::BAD_REQUEST, format!("Error: {}", self.0)).into_response()
    }
}
