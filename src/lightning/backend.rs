//! Core trait for payment backends, plus the timeout wrapper every outbound call goes through

use std::sync::Arc;
use std::time::Duration;

use super::lnbits::LnbitsClient;
use super::mock::MockBackend;
use super::types::{Invoice, PaymentHash, SettlementStatus};

// ============================================================================
// Errors
// ============================================================================

/// Failures a payment backend may report to the rest of the service.
///
/// Callers never read either variant as "paid" or "unpaid".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// Network error, timeout or backend-side fault. Retryable.
    #[error("payment backend unavailable: {0}")]
    Unavailable(String),
    /// The backend refused the request (e.g. a non-positive amount)
    #[error("payment backend rejected the request: {0}")]
    Rejected(String),
}

// ============================================================================
// PaymentBackend Trait
// ============================================================================

/// Asynchronous interface to an external Lightning payment service.
///
/// This is the only seam through which the service talks to the network.
pub trait PaymentBackend {
    /// Creates an invoice for `amount` satoshis.
    fn create_invoice(
        &self,
        amount: u64,
        memo: &str,
    ) -> impl Future<Output = Result<Invoice, BackendError>> + Send;

    /// Reports the settlement state of an invoice. Idempotent, read-only.
    fn check_settlement(
        &self,
        payment_hash: &PaymentHash,
    ) -> impl Future<Output = Result<SettlementStatus, BackendError>> + Send;
}

impl<T: PaymentBackend> PaymentBackend for Arc<T> {
    fn create_invoice(
        &self,
        amount: u64,
        memo: &str,
    ) -> impl Future<Output = Result<Invoice, BackendError>> + Send {
        self.as_ref().create_invoice(amount, memo)
    }

    fn check_settlement(
        &self,
        payment_hash: &PaymentHash,
    ) -> impl Future<Output = Result<SettlementStatus, BackendError>> + Send {
        self.as_ref().check_settlement(payment_hash)
    }
}

// ============================================================================
// TimeoutBackend - bounded outbound calls
// ============================================================================

/// Wraps a backend so that no call outlives `timeout`.
///
/// An elapsed call is reported as [`BackendError::Unavailable`], which the
/// access gate turns into a transient-failure response.
#[derive(Clone, Debug)]
pub struct TimeoutBackend<B> {
    inner: B,
    timeout: Duration,
}

impl<B> TimeoutBackend<B> {
    pub fn new(inner: B, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl<B> PaymentBackend for TimeoutBackend<B>
where
    B: PaymentBackend + Send + Sync,
{
    async fn create_invoice(&self, amount: u64, memo: &str) -> Result<Invoice, BackendError> {
        tokio::time::timeout(self.timeout, self.inner.create_invoice(amount, memo))
            .await
            .map_err(|_| {
                BackendError::Unavailable(format!(
                    "invoice creation timed out after {:?}",
                    self.timeout
                ))
            })?
    }

    async fn check_settlement(
        &self,
        payment_hash: &PaymentHash,
    ) -> Result<SettlementStatus, BackendError> {
        tokio::time::timeout(self.timeout, self.inner.check_settlement(payment_hash))
            .await
            .map_err(|_| {
                BackendError::Unavailable(format!(
                    "settlement check timed out after {:?}",
                    self.timeout
                ))
            })?
    }
}

// ============================================================================
// AnyBackend - runtime-selected backend
// ============================================================================

/// The backend chosen at startup: a real LNbits wallet or the in-process mock.
#[derive(Debug)]
pub enum AnyBackend {
    Lnbits(LnbitsClient),
    Mock(MockBackend),
}

impl AnyBackend {
    pub fn is_mock(&self) -> bool {
        matches!(self, AnyBackend::Mock(_))
    }
}

impl PaymentBackend for AnyBackend {
    async fn create_invoice(&self, amount: u64, memo: &str) -> Result<Invoice, BackendError> {
        match self {
            AnyBackend::Lnbits(client) => Ok(client.create_invoice(amount, memo).await?),
            AnyBackend::Mock(mock) => mock.create_invoice(amount, memo).await,
        }
    }

    async fn check_settlement(
        &self,
        payment_hash: &PaymentHash,
    ) -> Result<SettlementStatus, BackendError> {
        match self {
            AnyBackend::Lnbits(client) => Ok(client.payment_status(payment_hash).await?),
            AnyBackend::Mock(mock) => mock.check_settlement(payment_hash).await,
        }
    }
}
