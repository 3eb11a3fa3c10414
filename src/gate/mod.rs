//! Access gate: the per-request state machine tying catalog, backend,
//! credentials and settlement together.
//!
//! A request without a credential is challenged with a fresh invoice and a
//! credential bound to it. A request presenting `token:preimage` is granted
//! only when the token is authentic, bound to the requested item, the preimage
//! reduces to the bound payment hash, and the backend has reported that hash
//! settled. Every other path ends in a challenge or an error, never in content.

pub mod authorization;

use std::sync::Arc;

use crate::catalog::{CatalogError, CatalogItem, CatalogStore};
use crate::credential::{CredentialError, CredentialIssuer};
use crate::lightning::{BackendError, Invoice, PaymentBackend, PaymentHash, SettlementStatus};
use crate::prelude::unix_now;
use crate::settlement::{SettlementRecord, SettlementTracker};

pub use authorization::{AuthorizationError, PresentedCredential, challenge_header, parse_authorization};

const DEFAULT_MEMO_PREFIX: &str = "skill402";

// ============================================================================
// Outcomes and errors
// ============================================================================

/// Why a presented credential was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Unparsable header, forged or corrupted token
    InvalidCredential,
    /// Authentic token, but issued for another item
    ItemMismatch,
    /// Preimage does not hash to the bound payment hash
    ProofMismatch,
    /// Token older than the configured credential lifetime
    CredentialExpired,
}

impl Rejection {
    pub fn as_str(self) -> &'static str {
        match self {
            Rejection::InvalidCredential => "invalid_credential",
            Rejection::ItemMismatch => "item_mismatch",
            Rejection::ProofMismatch => "proof_mismatch",
            Rejection::CredentialExpired => "credential_expired",
        }
    }
}

/// A freshly issued invoice and the credential bound to it
#[derive(Debug, Clone)]
pub struct Challenge {
    pub item: Arc<CatalogItem>,
    pub invoice: Invoice,
    pub token: String,
}

#[derive(Debug)]
pub enum Outcome {
    Challenged {
        challenge: Challenge,
        rejection: Option<Rejection>,
    },
    /// Valid credential and proof, payment not observed yet
    NotSettled { payment_hash: PaymentHash },
    Granted {
        item: Arc<CatalogItem>,
        payment_hash: PaymentHash,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("item '{0}' not found")]
    ItemNotFound(String),
    #[error("payment backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("payment backend rejected the request: {0}")]
    BackendRejected(String),
    #[error("failed to issue credential: {0}")]
    Issuance(#[from] CredentialError),
}

impl From<BackendError> for GateError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Unavailable(msg) => GateError::BackendUnavailable(msg),
            BackendError::Rejected(msg) => GateError::BackendRejected(msg),
        }
    }
}

impl From<CatalogError> for GateError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => GateError::ItemNotFound(id),
            other => GateError::ItemNotFound(other.to_string()),
        }
    }
}

/// What the status endpoint reports for one payment hash
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub payment_hash: PaymentHash,
    pub status: SettlementStatus,
    pub record: Option<SettlementRecord>,
}

// ============================================================================
// AccessGate
// ============================================================================

pub struct AccessGate<B> {
    catalog: Arc<CatalogStore>,
    issuer: CredentialIssuer,
    tracker: SettlementTracker<B>,
    credential_ttl_secs: Option<u64>,
    memo_prefix: String,
}

impl<B> std::fmt::Debug for AccessGate<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("items", &self.catalog.len())
            .field("credential_ttl_secs", &self.credential_ttl_secs)
            .finish_non_exhaustive()
    }
}

impl<B> AccessGate<B> {
    pub fn new(catalog: Arc<CatalogStore>, issuer: CredentialIssuer, backend: B) -> Self {
        Self {
            catalog,
            issuer,
            tracker: SettlementTracker::new(backend),
            credential_ttl_secs: None,
            memo_prefix: DEFAULT_MEMO_PREFIX.to_string(),
        }
    }

    /// Reject credentials older than `ttl` seconds. Off by default.
    pub fn with_credential_ttl(mut self, ttl: Option<u64>) -> Self {
        self.credential_ttl_secs = ttl;
        self
    }

    pub fn with_memo_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.memo_prefix = prefix.into();
        self
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn tracker(&self) -> &SettlementTracker<B> {
        &self.tracker
    }

    fn expired(&self, issued_at: u64) -> bool {
        match self.credential_ttl_secs {
            Some(ttl) => unix_now() > issued_at.saturating_add(ttl),
            None => false,
        }
    }
}

impl<B> AccessGate<B>
where
    B: PaymentBackend + Send + Sync,
{
    /// Run one request for `item_id` through the gate.
    ///
    /// `authorization` is the raw `Authorization` header, if any.
    pub async fn request(
        &self,
        item_id: &str,
        authorization: Option<&str>,
    ) -> Result<Outcome, GateError> {
        let item = self.catalog.lookup(item_id)?;

        let Some(header) = authorization else {
            return self.challenge(item, None).await;
        };

        let presented = match parse_authorization(header) {
            Ok(presented) => presented,
            Err(e) => {
                tracing::debug!(item = %item.id, error = %e, "Unusable authorization header");
                return self.challenge(item, Some(Rejection::InvalidCredential)).await;
            }
        };

        let credential = match self.issuer.verify(&presented.token) {
            Ok(credential) => credential,
            Err(e) => {
                tracing::info!(item = %item.id, error = %e, "Credential rejected");
                return self.challenge(item, Some(Rejection::InvalidCredential)).await;
            }
        };
        let caveats = &credential.caveats;

        if caveats.item_id != item.id {
            tracing::info!(item = %item.id, bound = %caveats.item_id, "Credential bound to another item");
            return self.challenge(item, Some(Rejection::ItemMismatch)).await;
        }

        if self.expired(caveats.issued_at) {
            tracing::info!(item = %item.id, issued_at = caveats.issued_at, "Credential expired");
            return self.challenge(item, Some(Rejection::CredentialExpired)).await;
        }

        let payment_hash = caveats.payment_hash;
        if !presented.proof.matches(&payment_hash) {
            tracing::info!(item = %item.id, %payment_hash, "Proof does not match payment hash");
            return self.challenge(item, Some(Rejection::ProofMismatch)).await;
        }

        if self.tracker.is_settled(&payment_hash).await? {
            tracing::info!(item = %item.id, %payment_hash, "Access granted");
            Ok(Outcome::Granted { item, payment_hash })
        } else {
            tracing::debug!(item = %item.id, %payment_hash, "Payment not settled yet");
            Ok(Outcome::NotSettled { payment_hash })
        }
    }

    async fn challenge(
        &self,
        item: Arc<CatalogItem>,
        rejection: Option<Rejection>,
    ) -> Result<Outcome, GateError> {
        let memo = format!("{}: {} - {}", self.memo_prefix, item.id, item.title);
        let invoice = self.tracker.backend().create_invoice(item.price, &memo).await?;

        // Record first so the bound hash always exists in the tracker
        self.tracker.record(&invoice, &item.id).await;
        let token = self.issuer.issue(&item.id, invoice.payment_hash)?.encode();

        tracing::info!(
            item = %item.id,
            amount = invoice.amount,
            payment_hash = %invoice.payment_hash,
            reason = rejection.map(Rejection::as_str),
            "Challenge issued"
        );

        Ok(Outcome::Challenged {
            challenge: Challenge { item, invoice, token },
            rejection,
        })
    }

    pub async fn payment_status(&self, payment_hash: &PaymentHash) -> Result<StatusReport, GateError> {
        let status = self.tracker.status(payment_hash).await?;
        let record = self.tracker.snapshot(payment_hash).await;
        Ok(StatusReport {
            payment_hash: *payment_hash,
            status,
            record,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{K01_CONTENT, test_catalog};
    use crate::lightning::{MockBackend, Preimage};
    use secrecy::SecretString;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn issuer() -> CredentialIssuer {
        CredentialIssuer::new(&SecretString::from("gate-test-secret")).unwrap()
    }

    fn gate(mock: &MockBackend) -> AccessGate<MockBackend> {
        AccessGate::new(Arc::new(test_catalog()), issuer(), mock.clone())
    }

    fn authorization(challenge: &Challenge) -> String {
        format!(
            "L402 {}:{}",
            challenge.token,
            challenge.invoice.mock_preimage.as_deref().unwrap()
        )
    }

    async fn challenged(gate: &AccessGate<MockBackend>, item: &str) -> Challenge {
        match gate.request(item, None).await.unwrap() {
            Outcome::Challenged { challenge, rejection: None } => challenge,
            other => panic!("expected challenge, got {:?}", other),
        }
    }

    fn rejection(outcome: Outcome) -> Rejection {
        match outcome {
            Outcome::Challenged { rejection: Some(r), .. } => r,
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_challenge_matches_price_and_binds_item() {
        let mock = MockBackend::new();
        let gate = gate(&mock);
        for entry in gate.catalog().list() {
            let challenge = challenged(&gate, &entry.id).await;
            assert_eq!(challenge.invoice.amount, entry.price);

            let credential = issuer().verify(&challenge.token).unwrap();
            assert_eq!(credential.caveats.item_id, entry.id);
            assert_eq!(credential.caveats.payment_hash, challenge.invoice.payment_hash);
        }

        let challenge = challenged(&gate, "K01").await;
        assert_eq!(challenge.invoice.amount, 50);
        let record = gate.tracker().snapshot(&challenge.invoice.payment_hash).await.unwrap();
        assert_eq!(record.item_id.as_deref(), Some("K01"));
    }

    #[tokio::test]
    async fn test_pending_then_granted_idempotently() {
        let mock = MockBackend::new();
        let gate = gate(&mock);
        let challenge = challenged(&gate, "K01").await;
        let auth = authorization(&challenge);

        match gate.request("K01", Some(&auth)).await.unwrap() {
            Outcome::NotSettled { payment_hash } => {
                assert_eq!(payment_hash, challenge.invoice.payment_hash)
            }
            other => panic!("expected not settled, got {:?}", other),
        }

        mock.settle(&challenge.invoice.payment_hash).await;
        for _ in 0..2 {
            match gate.request("k01", Some(&auth)).await.unwrap() {
                Outcome::Granted { item, .. } => assert_eq!(item.content, K01_CONTENT),
                other => panic!("expected grant, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_tampered_token_gets_fresh_challenge() {
        let mock = MockBackend::new();
        let gate = gate(&mock);
        let challenge = challenged(&gate, "K01").await;
        mock.settle(&challenge.invoice.payment_hash).await;

        let mut token = challenge.token.clone().into_bytes();
        token[3] = if token[3] == b'x' { b'y' } else { b'x' };
        let token = String::from_utf8(token).unwrap();
        let auth = format!(
            "L402 {}:{}",
            token,
            challenge.invoice.mock_preimage.as_deref().unwrap()
        );

        match gate.request("K01", Some(&auth)).await.unwrap() {
            Outcome::Challenged { challenge: fresh, rejection } => {
                assert_eq!(rejection, Some(Rejection::InvalidCredential));
                assert_ne!(fresh.invoice.payment_hash, challenge.invoice.payment_hash);
            }
            other => panic!("expected challenge, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_credential_for_other_item_rejected() {
        let mock = MockBackend::new();
        let gate = gate(&mock);
        let challenge = challenged(&gate, "K01").await;
        mock.settle(&challenge.invoice.payment_hash).await;

        let outcome = gate.request("C01", Some(&authorization(&challenge))).await.unwrap();
        assert_eq!(rejection(outcome), Rejection::ItemMismatch);
    }

    #[tokio::test]
    async fn test_wrong_proof_rejected_even_when_settled() {
        let mock = MockBackend::new();
        let gate = gate(&mock);
        let challenge = challenged(&gate, "K01").await;
        mock.settle(&challenge.invoice.payment_hash).await;

        let auth = format!("L402 {}:{}", challenge.token, Preimage::random().to_hex());
        let outcome = gate.request("K01", Some(&auth)).await.unwrap();
        assert_eq!(rejection(outcome), Rejection::ProofMismatch);
    }

    #[tokio::test]
    async fn test_garbage_header_rejected() {
        let mock = MockBackend::new();
        let gate = gate(&mock);
        for header in ["Bearer abc", "L402 abc", "L402 not-a-token:00"] {
            let outcome = gate.request("K01", Some(header)).await.unwrap();
            assert_eq!(rejection(outcome), Rejection::InvalidCredential);
        }
    }

    #[tokio::test]
    async fn test_expired_credential() {
        let mock = MockBackend::new();
        let gate = gate(&mock).with_credential_ttl(Some(60));
        let invoice = mock.create_invoice(50, "K01").await.unwrap();
        mock.settle(&invoice.payment_hash).await;

        let stale = issuer()
            .issue_at("K01", invoice.payment_hash, unix_now() - 120)
            .unwrap()
            .encode();
        let auth = format!("L402 {}:{}", stale, invoice.mock_preimage.as_deref().unwrap());
        let outcome = gate.request("K01", Some(&auth)).await.unwrap();
        assert_eq!(rejection(outcome), Rejection::CredentialExpired);

        // Without a TTL the same credential is good forever
        let gate = AccessGate::new(Arc::new(test_catalog()), issuer(), mock.clone());
        assert!(matches!(
            gate.request("K01", Some(&auth)).await.unwrap(),
            Outcome::Granted { .. }
        ));
    }

    #[tokio::test]
    async fn test_unknown_item_is_not_found() {
        let mock = MockBackend::new();
        let gate = gate(&mock);
        let challenge = challenged(&gate, "K01").await;
        for auth in [None, Some(authorization(&challenge))] {
            let err = gate.request("ZZ9", auth.as_deref()).await.unwrap_err();
            assert!(matches!(err, GateError::ItemNotFound(_)));
        }
    }

    #[tokio::test]
    async fn test_backend_offline() {
        let mock = MockBackend::new();
        let gate = gate(&mock);
        let challenge = challenged(&gate, "K01").await;

        mock.set_offline(true);
        assert!(matches!(
            gate.request("K01", None).await,
            Err(GateError::BackendUnavailable(_))
        ));
        assert!(matches!(
            gate.request("K01", Some(&authorization(&challenge))).await,
            Err(GateError::BackendUnavailable(_))
        ));
    }

    /// Settles everything on the first check, then fails
    #[derive(Default)]
    struct SettleOnce {
        checks: AtomicUsize,
        inner: MockBackend,
    }

    impl PaymentBackend for SettleOnce {
        async fn create_invoice(&self, amount: u64, memo: &str) -> Result<Invoice, BackendError> {
            self.inner.create_invoice(amount, memo).await
        }

        async fn check_settlement(&self, _hash: &PaymentHash) -> Result<SettlementStatus, BackendError> {
            if self.checks.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(SettlementStatus::Settled)
            } else {
                Err(BackendError::Unavailable("gone".into()))
            }
        }
    }

    #[tokio::test]
    async fn test_grant_survives_backend_loss_after_settlement() {
        let gate = AccessGate::new(
            Arc::new(test_catalog()),
            issuer(),
            SettleOnce {
                checks: AtomicUsize::new(0),
                inner: MockBackend::new(),
            },
        );
        let Outcome::Challenged { challenge, .. } = gate.request("T01", None).await.unwrap() else {
            panic!("expected challenge");
        };
        let auth = authorization(&challenge);
        for _ in 0..3 {
            assert!(matches!(
                gate.request("T01", Some(&auth)).await.unwrap(),
                Outcome::Granted { .. }
            ));
        }
        assert_eq!(gate.tracker().backend().checks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_payment_status() {
        let mock = MockBackend::new();
        let gate = gate(&mock);
        let challenge = challenged(&gate, "I01").await;

        let report = gate.payment_status(&challenge.invoice.payment_hash).await.unwrap();
        assert_eq!(report.status, SettlementStatus::Pending);
        let record = report.record.unwrap();
        assert_eq!(record.item_id.as_deref(), Some("I01"));
        assert_eq!(record.amount, Some(75));

        let report = gate.payment_status(&PaymentHash([4u8; 32])).await.unwrap();
        assert_eq!(report.status, SettlementStatus::Unknown);
        assert!(report.record.is_none());
    }
}
