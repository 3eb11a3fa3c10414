//! In-process payment backend for development and tests.
//!
//! Invoices are generated locally with a random preimage, and the preimage is
//! handed back in the invoice so a client can complete the flow without a
//! wallet. Nothing here touches the network.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use super::backend::{BackendError, PaymentBackend};
use super::types::{Invoice, PaymentHash, Preimage, SettlementStatus};
use crate::prelude::{RwArc, unix_now};

const MOCK_INVOICE_EXPIRY_SECS: u64 = 3600;

#[derive(Debug, Clone)]
struct MockInvoice {
    preimage: Preimage,
    status: SettlementStatus,
}

#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    invoices: RwArc<HashMap<PaymentHash, MockInvoice>>,
    /// Mark invoices settled as soon as they are first checked
    auto_settle: bool,
    offline: Arc<AtomicBool>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            invoices: Arc::new(RwLock::new(HashMap::new())),
            auto_settle: false,
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn auto_settling() -> Self {
        Self {
            auto_settle: true,
            ..Self::new()
        }
    }

    /// Simulate a backend outage; every call fails with `Unavailable` until cleared
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), BackendError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(BackendError::Unavailable("mock backend is offline".into()))
        } else {
            Ok(())
        }
    }

    pub async fn preimage(&self, payment_hash: &PaymentHash) -> Option<Preimage> {
        self.invoices
            .read()
            .await
            .get(payment_hash)
            .map(|inv| inv.preimage)
    }

    /// Mark an invoice paid. Returns false for unknown hashes.
    pub async fn settle(&self, payment_hash: &PaymentHash) -> bool {
        self.set_status(payment_hash, SettlementStatus::Settled).await
    }

    /// Mark an invoice expired, unless it was already paid
    pub async fn expire(&self, payment_hash: &PaymentHash) -> bool {
        let mut invoices = self.invoices.write().await;
        match invoices.get_mut(payment_hash) {
            Some(inv) if !inv.status.is_settled() => {
                inv.status = SettlementStatus::Expired;
                true
            }
            _ => false,
        }
    }

    async fn set_status(&self, payment_hash: &PaymentHash, status: SettlementStatus) -> bool {
        match self.invoices.write().await.get_mut(payment_hash) {
            Some(inv) => {
                inv.status = status;
                true
            }
            None => false,
        }
    }
}

/// A BOLT11-shaped descriptor; not decodable by real wallets
fn mock_payment_request(amount: u64, payment_hash: &PaymentHash) -> String {
    let hex = payment_hash.to_hex();
    format!("lnbc{}n1mock_{}", amount, &hex[..20])
}

impl PaymentBackend for MockBackend {
    async fn create_invoice(&self, amount: u64, memo: &str) -> Result<Invoice, BackendError> {
        self.check_online()?;
        if amount == 0 {
            return Err(BackendError::Rejected("amount must be positive".into()));
        }

        let preimage = Preimage::random();
        let payment_hash = preimage.payment_hash();

        self.invoices.write().await.insert(
            payment_hash,
            MockInvoice {
                preimage,
                status: SettlementStatus::Pending,
            },
        );

        tracing::debug!(%payment_hash, amount, memo, "Mock invoice created");

        Ok(Invoice {
            payment_hash,
            amount,
            payment_request: mock_payment_request(amount, &payment_hash),
            created_at: unix_now(),
            expiry: MOCK_INVOICE_EXPIRY_SECS,
            mock_preimage: Some(preimage.to_hex()),
        })
    }

    async fn check_settlement(
        &self,
        payment_hash: &PaymentHash,
    ) -> Result<SettlementStatus, BackendError> {
        self.check_online()?;
        let mut invoices = self.invoices.write().await;
        let Some(inv) = invoices.get_mut(payment_hash) else {
            return Ok(SettlementStatus::Unknown);
        };
        if self.auto_settle && inv.status == SettlementStatus::Pending {
            inv.status = SettlementStatus::Settled;
        }
        Ok(inv.status)
    }
}
