use axum::{
    Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};

use super::super::AppState;
use super::super::models::{
    ErrorResponse, PaymentStatusResponse, error_bad_request, gate_error_response,
};
use crate::lightning::PaymentHash;

/// Settlement status of a payment, without releasing any content
#[utoipa::path(
    get,
    path = "/payments/{payment_hash}/status",
    tag = "Payments",
    params(
        ("payment_hash" = String, Path, description = "Hex payment hash from a challenge")
    ),
    responses(
        (status = 200, description = "Current settlement status", body = PaymentStatusResponse),
        (status = 400, description = "Malformed payment hash", body = ErrorResponse),
        (status = 503, description = "Payment backend unavailable", body = ErrorResponse)
    )
)]
pub async fn payment_status_handler(
    State(state): State<AppState>,
    Path(payment_hash): Path<String>,
) -> Response {
    let payment_hash: PaymentHash = match payment_hash.parse() {
        Ok(hash) => hash,
        Err(e) => return error_bad_request(&format!("Invalid payment hash: {}", e)),
    };

    let report = match state.gate.payment_status(&payment_hash).await {
        Ok(report) => report,
        Err(e) => return gate_error_response(&e),
    };

    let record = report.record.as_ref();
    Json(PaymentStatusResponse {
        payment_hash: report.payment_hash,
        status: report.status,
        paid: report.status.is_settled(),
        item_id: record.and_then(|r| r.item_id.clone()),
        amount: record.and_then(|r| r.amount),
        last_checked_at: record.and_then(|r| r.last_checked_at),
    })
    .into_response()
}
