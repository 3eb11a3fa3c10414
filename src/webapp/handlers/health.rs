use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

use super::super::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: Vec<String>,
    pub service_uptime_secs: u64,
    /// Items in the loaded catalog
    pub items: usize,
    /// Payment records currently tracked
    pub tracked_payments: usize,
    #[schema(example = "lnbits")]
    pub backend: String,
}

/// Health check endpoint (free)
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let backend = if state.mock_mode { "mock" } else { "lnbits" };
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            service: vec![
                env!("CARGO_PKG_NAME").to_string(),
                env!("CARGO_PKG_VERSION").to_string(),
            ],
            service_uptime_secs: state.started_at.elapsed().as_secs(),
            items: state.gate.catalog().len(),
            tracked_payments: state.gate.tracker().len().await,
            backend: backend.to_string(),
        }),
    )
}
