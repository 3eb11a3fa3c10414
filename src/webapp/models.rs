use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::catalog::{CatalogEntry, CatalogItem, Tier};
use crate::gate::{Challenge, GateError, Rejection};
use crate::lightning::{PaymentHash, SettlementStatus};

/// Seconds a client should wait before polling again
pub const RETRY_AFTER_SECS: u64 = 5;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn error_response(code: StatusCode, message: &str) -> Response {
    (code, Json(ErrorResponse { error: message.to_string() })).into_response()
}

// Shortcut functions for common error codes
pub fn error_bad_request(message: &str) -> Response {
    error_response(StatusCode::BAD_REQUEST, message)
}

pub fn error_not_found(message: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, message)
}

pub fn error_internal(message: &str) -> Response {
    error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
}

pub fn with_retry_after(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
    response
}

/// Transient backend failure, distinct from any payment verdict
pub fn error_unavailable(message: &str) -> Response {
    with_retry_after(error_response(StatusCode::SERVICE_UNAVAILABLE, message))
}

/// Map a gate failure onto its HTTP status
pub fn gate_error_response(err: &GateError) -> Response {
    match err {
        GateError::ItemNotFound(_) => error_not_found("Item not found"),
        GateError::BackendUnavailable(_) => {
            error_unavailable("Payment service unavailable, retry shortly")
        }
        GateError::BackendRejected(_) => {
            error_response(StatusCode::BAD_GATEWAY, "Payment service rejected the request")
        }
        GateError::Issuance(_) => error_internal("Failed to issue credential"),
    }
}

// ============================================================================
// Catalog models
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogResponse {
    pub items: Vec<CatalogEntry>,
    pub total: usize,
    #[schema(example = "L402")]
    pub payment_protocol: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ItemSummary {
    #[schema(example = "K01")]
    pub id: String,
    pub title: String,
    pub tier: Tier,
    /// Price in sats
    #[schema(example = 50)]
    pub price: u64,
}

impl From<&CatalogItem> for ItemSummary {
    fn from(item: &CatalogItem) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            tier: item.tier,
            price: item.price,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PreviewResponse {
    #[serde(flatten)]
    pub item: ItemSummary,
    /// First section of the content, with a purchase footer
    pub preview: String,
    #[schema(example = "/items/K01")]
    pub full_content_endpoint: String,
}

/// Full content, returned once payment is verified
#[derive(Debug, Serialize, ToSchema)]
pub struct ItemResponse {
    #[serde(flatten)]
    pub item: ItemSummary,
    #[schema(value_type = String)]
    pub payment_hash: PaymentHash,
    pub content: String,
}

// ============================================================================
// Payment models
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct InvoiceInfo {
    /// BOLT11 payment request to pay
    pub payment_request: String,
    #[schema(value_type = String)]
    pub payment_hash: PaymentHash,
    /// Amount in sats
    pub amount: u64,
    /// Unix seconds after which the invoice can no longer be paid
    pub expires_at: u64,
}

/// Body of a 402 challenge
#[derive(Debug, Serialize, ToSchema)]
pub struct ChallengeResponse {
    #[schema(example = 402)]
    pub status: u16,
    pub message: String,
    pub item: ItemSummary,
    pub invoice: InvoiceInfo,
    /// Credential bound to this invoice and item
    pub macaroon: String,
    pub instructions: String,
    /// Why a presented credential was not accepted
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "proof_mismatch")]
    pub reason: Option<String>,
    /// Invoice preimage; only present when running against the mock backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mock_preimage: Option<String>,
}

impl ChallengeResponse {
    pub fn new(challenge: &Challenge, rejection: Option<Rejection>) -> Self {
        Self {
            status: StatusCode::PAYMENT_REQUIRED.as_u16(),
            message: "Payment required".to_string(),
            item: ItemSummary::from(challenge.item.as_ref()),
            invoice: InvoiceInfo {
                payment_request: challenge.invoice.payment_request.clone(),
                payment_hash: challenge.invoice.payment_hash,
                amount: challenge.invoice.amount,
                expires_at: challenge.invoice.expires_at(),
            },
            macaroon: challenge.token.clone(),
            instructions: "Pay the Lightning invoice, then retry with header: \
                           Authorization: L402 <macaroon>:<preimage>"
                .to_string(),
            reason: rejection.map(|r| r.as_str().to_string()),
            mock_preimage: challenge.invoice.mock_preimage.clone(),
        }
    }
}

/// Valid credential, payment not observed yet
#[derive(Debug, Serialize, ToSchema)]
pub struct NotSettledResponse {
    pub error: String,
    #[schema(example = "not_settled")]
    pub code: String,
    #[schema(value_type = String)]
    pub payment_hash: PaymentHash,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentStatusResponse {
    #[schema(value_type = String)]
    pub payment_hash: PaymentHash,
    pub status: SettlementStatus,
    pub paid: bool,
    pub item_id: Option<String>,
    pub amount: Option<u64>,
    /// Unix seconds of the last backend query
    pub last_checked_at: Option<u64>,
}
