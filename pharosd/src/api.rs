//! HTTP surface: one audit endpoint plus a liveness check.

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use pharos_core::{AuditService, OutputFormat};

use crate::error::ServerError;
use crate::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);
    Router::new()
        .route("/audit", get(handle_audit))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub url: String,
    /// Report format, `html` or `json`.
    #[serde(rename = "type")]
    pub output_type: Option<String>,
}

/// GET /audit?url=&type= — runs one audit and returns the report body.
pub async fn handle_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Response, ServerError> {
    let format = match query.output_type.as_deref() {
        Some(value) => value.parse::<OutputFormat>()?,
        None => OutputFormat::default(),
    };
    let report = state.service.run_audit(&query.url, format).await?;
    Ok(([(header::CONTENT_TYPE, format.content_type())], report).into_response())
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "pharosd",
        version: env!("CARGO_PKG_VERSION"),
    })
}
