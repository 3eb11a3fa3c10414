use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::super::AppState;
use super::super::models::{
    ChallengeResponse, ErrorResponse, ItemResponse, ItemSummary, NotSettledResponse, PreviewResponse,
    error_not_found, gate_error_response, with_retry_after,
};
use crate::gate::{Outcome, challenge_header};

/// Free preview of an item
#[utoipa::path(
    get,
    path = "/items/{id}/preview",
    tag = "Catalog",
    params(
        ("id" = String, Path, description = "Item id, case-insensitive", example = "K01")
    ),
    responses(
        (status = 200, description = "Preview of the first section", body = PreviewResponse),
        (status = 404, description = "Unknown item", body = ErrorResponse)
    )
)]
pub async fn preview_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(item) = state.gate.catalog().lookup(&id) else {
        return error_not_found("Item not found");
    };
    Json(PreviewResponse {
        full_content_endpoint: format!("/items/{}", item.id),
        preview: item.preview.clone(),
        item: ItemSummary::from(item.as_ref()),
    })
    .into_response()
}

/// Full item content behind the L402 paywall
///
/// Without a credential, or with one that is not accepted, the response is a
/// 402 challenge carrying a fresh invoice and credential. With a valid
/// credential and proof the content is returned once the payment has settled.
#[utoipa::path(
    get,
    path = "/items/{id}",
    tag = "Catalog",
    params(
        ("id" = String, Path, description = "Item id, case-insensitive", example = "K01"),
        ("Authorization" = Option<String>, Header, description = "L402 <macaroon>:<preimage>")
    ),
    responses(
        (status = 200, description = "Payment verified, full content", body = ItemResponse),
        (status = 402, description = "Challenge, or payment not settled yet", body = ChallengeResponse),
        (status = 404, description = "Unknown item", body = ErrorResponse),
        (status = 502, description = "Payment backend rejected the invoice request", body = ErrorResponse),
        (status = 503, description = "Payment backend unavailable", body = ErrorResponse)
    )
)]
pub async fn item_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    // A header that is not valid UTF-8 is presented-but-unusable, not absent
    let authorization = headers
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default());

    let outcome = match state.gate.request(&id, authorization).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(item = %id, error = %e, "Item request failed");
            return gate_error_response(&e);
        }
    };

    match outcome {
        Outcome::Granted { item, payment_hash } => Json(ItemResponse {
            item: ItemSummary::from(item.as_ref()),
            payment_hash,
            content: item.content.clone(),
        })
        .into_response(),

        Outcome::NotSettled { payment_hash } => with_retry_after(
            (
                StatusCode::PAYMENT_REQUIRED,
                Json(NotSettledResponse {
                    error: "Payment not settled yet, retry shortly".to_string(),
                    code: "not_settled".to_string(),
                    payment_hash,
                }),
            )
                .into_response(),
        ),

        Outcome::Challenged { challenge, rejection } => {
            let mut body = ChallengeResponse::new(&challenge, rejection);
            if !state.mock_mode {
                body.mock_preimage = None;
            }
            let mut response = (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response();
            let www_authenticate =
                challenge_header(&challenge.token, &challenge.invoice.payment_request);
            match HeaderValue::from_str(&www_authenticate) {
                Ok(value) => {
                    response.headers_mut().insert(header::WWW_AUTHENTICATE, value);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Backend returned an unprintable payment request");
                }
            }
            response
        }
    }
}
