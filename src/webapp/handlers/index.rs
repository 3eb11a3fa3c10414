use std::collections::BTreeMap;

use axum::{Json, extract::State};
use serde::Serialize;
use utoipa::ToSchema;

use super::super::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct IndexResponse {
    pub name: String,
    pub version: String,
    #[schema(example = "L402")]
    pub protocol: String,
    pub payment: String,
    /// Endpoint -> description
    pub endpoints: BTreeMap<String, String>,
    pub total_items: usize,
    pub mock_mode: bool,
}

/// Service info and endpoint table
#[utoipa::path(
    get,
    path = "/",
    tag = "Health",
    responses(
        (status = 200, description = "Service information", body = IndexResponse)
    )
)]
pub async fn index_handler(State(state): State<AppState>) -> Json<IndexResponse> {
    let endpoints = [
        ("GET /catalog", "Browse available items (free)"),
        ("GET /items/{id}/preview", "Free preview of an item"),
        ("GET /items/{id}", "Full item content (L402 paywall)"),
        ("GET /payments/{payment_hash}/status", "Check payment status"),
        ("GET /health", "Service health"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    Json(IndexResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        protocol: "L402".to_string(),
        payment: "Lightning Network (sats)".to_string(),
        endpoints,
        total_items: state.gate.catalog().len(),
        mock_mode: state.mock_mode,
    })
}
