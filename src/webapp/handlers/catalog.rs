use axum::{Json, extract::State};

use super::super::AppState;
use super::super::models::CatalogResponse;

/// List every item with its tier and price, in catalog order
#[utoipa::path(
    get,
    path = "/catalog",
    tag = "Catalog",
    responses(
        (status = 200, description = "Catalog listing", body = CatalogResponse)
    )
)]
pub async fn catalog_handler(State(state): State<AppState>) -> Json<CatalogResponse> {
    let items = state.gate.catalog().list();
    Json(CatalogResponse {
        total: items.len(),
        items,
        payment_protocol: "L402".to_string(),
    })
}
