//! Shared response types and system endpoints (`/health`, `/access-logs`),
//! kept from the teacher almost verbatim — these don't vary by domain.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::state::{AccessLogEntry, AppState};

/// Health check response
#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}

/// Error response
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

/// Response for access logs endpoint
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogsResponse {
    pub logs: Vec<AccessLogEntry>,
    pub total: usize,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.uptime_secs(),
    })
}

/// Get access logs
///
/// Returns a list of all HTTP access log entries.
#[utoipa::path(
    get,
    path = "/access-logs",
    responses(
        (status = 200, description = "Access log entries", body = AccessLogsResponse)
    ),
    tag = "system"
)]
pub async fn access_logs_handler(State(state): State<Arc<AppState>>) -> Json<AccessLogsResponse> {
    let logs = state.get_access_logs();
    let total = logs.len();
    Json(AccessLogsResponse { logs, total })
}

/// Clear access logs
///
/// Clears all HTTP access log entries.
#[utoipa::path(
    delete,
    path = "/access-logs",
    responses(
        (status = 200, description = "Access logs cleared")
    ),
    tag = "system"
)]
pub async fn clear_access_logs_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.clear_access_logs();
    log::info!("access logs cleared");
    StatusCode::OK
}
