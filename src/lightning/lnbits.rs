//! HTTP client for an LNbits wallet

use std::time::Duration;

use http::StatusCode;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use super::backend::BackendError;
use super::types::{HexParseError, Invoice, PaymentHash, SettlementStatus};
use crate::prelude::unix_now;

const API_KEY_HEADER: &str = "X-Api-Key";
const CREATE_CONTEXT: &str = "POST /api/v1/payments";
const STATUS_CONTEXT: &str = "GET /api/v1/payments/{payment_hash}";

/// Invoice lifetime requested from LNbits unless configured otherwise
pub const DEFAULT_INVOICE_EXPIRY_SECS: u64 = 3600;

// ============================================================================
// Errors
// ============================================================================

/// Errors from LnbitsClient HTTP operations.
#[derive(Debug, thiserror::Error)]
pub enum LnbitsError {
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        context: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("HTTP error: {context}: {source}")]
    Http {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Failed to deserialize JSON: {context}: {source}")]
    JsonDeserialization {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("Unexpected HTTP status {status}: {context}: {body}")]
    HttpStatus {
        context: &'static str,
        status: StatusCode,
        body: String,
    },
    #[error("Failed to read response body: {context}: {source}")]
    ResponseBodyRead {
        context: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("LNbits response is missing {0}")]
    MissingField(&'static str),
    #[error("LNbits returned an invalid payment hash: {0}")]
    InvalidPaymentHash(#[from] HexParseError),
}

impl From<LnbitsError> for BackendError {
    fn from(err: LnbitsError) -> Self {
        match &err {
            // Only invoice creation can be refused; status lookups are reads
            LnbitsError::HttpStatus { context, status, .. }
                if *context == CREATE_CONTEXT && status.is_client_error() =>
            {
                BackendError::Rejected(err.to_string())
            }
            _ => BackendError::Unavailable(err.to_string()),
        }
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct CreateInvoiceRequest<'a> {
    out: bool,
    amount: u64,
    memo: &'a str,
    unit: &'static str,
    expiry: u64,
}

#[derive(Debug, Deserialize)]
struct CreateInvoiceResponse {
    payment_hash: String,
    #[serde(default)]
    payment_request: Option<String>,
    /// Older LNbits releases name the descriptor `bolt11`
    #[serde(default)]
    bolt11: Option<String>,
}

impl CreateInvoiceResponse {
    fn into_payment_request(self) -> Option<String> {
        self.payment_request.or(self.bolt11)
    }
}

#[derive(Debug, Default, Deserialize)]
struct PaymentDetails {
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PaymentStatusResponse {
    paid: bool,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Option<PaymentDetails>,
}

impl PaymentStatusResponse {
    fn settlement_status(&self) -> SettlementStatus {
        if self.paid {
            return SettlementStatus::Settled;
        }
        let status = self
            .details
            .as_ref()
            .and_then(|d| d.status.as_deref())
            .or(self.status.as_deref())
            .unwrap_or("pending");
        match status.to_ascii_lowercase().as_str() {
            "success" => SettlementStatus::Settled,
            "expired" | "failed" => SettlementStatus::Expired,
            _ => SettlementStatus::Pending,
        }
    }
}

// ============================================================================
// LnbitsClient
// ============================================================================

/// A client for one LNbits wallet.
///
/// The admin key is only used for invoice creation; status lookups use the
/// invoice (read) key.
#[derive(Debug)]
pub struct LnbitsClient {
    create_url: Url,
    status_base_url: Url,
    client: Client,
    invoice_key: SecretString,
    admin_key: SecretString,
    invoice_expiry_secs: u64,
    timeout: Option<Duration>,
}

impl LnbitsClient {
    pub fn try_new(
        base_url: &str,
        invoice_key: SecretString,
        admin_key: SecretString,
    ) -> Result<Self, LnbitsError> {
        let mut normalized = base_url.trim_end_matches('/').to_string();
        normalized.push('/');
        let base = Url::parse(&normalized).map_err(|e| LnbitsError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        let create_url = base.join("./api/v1/payments").map_err(|e| LnbitsError::UrlParse {
            context: "Failed to construct ./api/v1/payments URL",
            source: e,
        })?;
        let status_base_url =
            base.join("./api/v1/payments/").map_err(|e| LnbitsError::UrlParse {
                context: "Failed to construct ./api/v1/payments/ URL",
                source: e,
            })?;
        Ok(Self {
            create_url,
            status_base_url,
            client: Client::new(),
            invoice_key,
            admin_key,
            invoice_expiry_secs: DEFAULT_INVOICE_EXPIRY_SECS,
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_invoice_expiry(mut self, secs: u64) -> Self {
        self.invoice_expiry_secs = secs;
        self
    }

    fn status_url(&self, payment_hash: &PaymentHash) -> Result<Url, LnbitsError> {
        self.status_base_url
            .join(&payment_hash.to_hex())
            .map_err(|e| LnbitsError::UrlParse {
                context: "Failed to construct payment status URL",
                source: e,
            })
    }

    pub async fn create_invoice(&self, amount: u64, memo: &str) -> Result<Invoice, LnbitsError> {
        let context = CREATE_CONTEXT;
        let body = CreateInvoiceRequest {
            out: false,
            amount,
            memo,
            unit: "sat",
            expiry: self.invoice_expiry_secs,
        };
        let mut req = self
            .client
            .post(self.create_url.clone())
            .header(API_KEY_HEADER, self.admin_key.expose_secret())
            .json(&body);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let response = req
            .send()
            .await
            .map_err(|e| LnbitsError::Http { context, source: e })?;

        let created: CreateInvoiceResponse = handle_response(response, context).await?;
        let payment_hash: PaymentHash = created.payment_hash.parse()?;
        let payment_request = created
            .into_payment_request()
            .ok_or(LnbitsError::MissingField("payment_request"))?;

        tracing::debug!(%payment_hash, amount, "LNbits invoice created");

        Ok(Invoice {
            payment_hash,
            amount,
            payment_request,
            created_at: unix_now(),
            expiry: self.invoice_expiry_secs,
            mock_preimage: None,
        })
    }

    pub async fn payment_status(
        &self,
        payment_hash: &PaymentHash,
    ) -> Result<SettlementStatus, LnbitsError> {
        let context = STATUS_CONTEXT;
        let mut req = self
            .client
            .get(self.status_url(payment_hash)?)
            .header(API_KEY_HEADER, self.invoice_key.expose_secret());
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        let response = req
            .send()
            .await
            .map_err(|e| LnbitsError::Http { context, source: e })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(SettlementStatus::Unknown);
        }

        let status: PaymentStatusResponse = handle_response(response, context).await?;
        Ok(status.settlement_status())
    }
}

/// Handle HTTP response: parse JSON on success, extract error on failure
async fn handle_response<R: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    context: &'static str,
) -> Result<R, LnbitsError> {
    if response.status().is_success() {
        response
            .json::<R>()
            .await
            .map_err(|e| LnbitsError::JsonDeserialization { context, source: e })
    } else {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LnbitsError::ResponseBodyRead { context, source: e })?;
        Err(LnbitsError::HttpStatus { context, status, body })
    }
}
