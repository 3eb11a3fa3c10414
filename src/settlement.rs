//! Process-wide record of invoices and their last observed settlement state
//!
//! Settled is terminal: once the backend has reported a payment hash as paid,
//! every later check is answered from the record without a backend round trip.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use utoipa::ToSchema;

use crate::lightning::{BackendError, Invoice, PaymentBackend, PaymentHash, SettlementStatus};
use crate::prelude::{RwArc, unix_now};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SettlementRecord {
    #[schema(value_type = String)]
    pub payment_hash: PaymentHash,
    /// Item the invoice was created for; unknown for hashes first seen on a credential
    pub item_id: Option<String>,
    pub amount: Option<u64>,
    pub status: SettlementStatus,
    /// Unix seconds
    pub created_at: u64,
    /// Unix seconds of the last backend query, if any
    pub last_checked_at: Option<u64>,
}

impl SettlementRecord {
    fn pending(payment_hash: PaymentHash, item_id: Option<String>, amount: Option<u64>) -> Self {
        Self {
            payment_hash,
            item_id,
            amount,
            status: SettlementStatus::Pending,
            created_at: unix_now(),
            last_checked_at: None,
        }
    }
}

type Slot = Arc<Mutex<SettlementRecord>>;

/// Caches settlement verdicts in front of a [`PaymentBackend`].
///
/// Each payment hash has its own lock, held across the backend query, so
/// concurrent checks for one hash share a single round trip and all observe
/// its result. Checks for different hashes never wait on each other.
#[derive(Debug)]
pub struct SettlementTracker<B> {
    backend: B,
    records: RwArc<HashMap<PaymentHash, Slot>>,
}

impl<B> SettlementTracker<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Register a freshly created invoice as pending
    pub async fn record(&self, invoice: &Invoice, item_id: &str) {
        let record = SettlementRecord::pending(
            invoice.payment_hash,
            Some(item_id.to_string()),
            Some(invoice.amount),
        );
        self.records
            .write()
            .await
            .entry(invoice.payment_hash)
            .or_insert_with(|| Arc::new(Mutex::new(record)));
    }

    async fn slot(&self, payment_hash: &PaymentHash) -> Option<Slot> {
        self.records.read().await.get(payment_hash).cloned()
    }

    async fn slot_or_insert(&self, payment_hash: &PaymentHash) -> Slot {
        if let Some(slot) = self.slot(payment_hash).await {
            return slot;
        }
        let mut records = self.records.write().await;
        Arc::clone(records.entry(*payment_hash).or_insert_with(|| {
            Arc::new(Mutex::new(SettlementRecord::pending(*payment_hash, None, None)))
        }))
    }

    /// Copy of the current record, waiting for any in-flight check on it
    pub async fn snapshot(&self, payment_hash: &PaymentHash) -> Option<SettlementRecord> {
        let slot = self.slot(payment_hash).await?;
        let record = slot.lock().await;
        Some(record.clone())
    }

    /// Drop records that never settled and were created before `cutoff` (unix seconds).
    ///
    /// Settled records are kept, as are records with a check in flight.
    pub async fn prune(&self, cutoff: u64) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, slot| match slot.try_lock() {
            Ok(record) => record.status.is_settled() || record.created_at >= cutoff,
            Err(_) => true,
        });
        before - records.len()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl<B> SettlementTracker<B>
where
    B: PaymentBackend + Send + Sync,
{
    /// Query the backend unless the record is already settled; caller holds the lock
    async fn refresh(&self, record: &mut SettlementRecord) -> Result<SettlementStatus, BackendError> {
        if record.status.is_settled() {
            return Ok(SettlementStatus::Settled);
        }
        let result = self.backend.check_settlement(&record.payment_hash).await;
        record.last_checked_at = Some(unix_now());
        match result {
            Ok(status) => {
                if status != record.status {
                    tracing::info!(
                        payment_hash = %record.payment_hash,
                        from = %record.status,
                        to = %status,
                        "Settlement status changed"
                    );
                }
                record.status = status;
                Ok(status)
            }
            Err(e) => {
                tracing::warn!(payment_hash = %record.payment_hash, error = %e, "Settlement check failed");
                Err(e)
            }
        }
    }

    /// Whether the payment behind `payment_hash` is settled.
    ///
    /// `Err` means settlement could not be confirmed and must be read as not
    /// settled. Pending, expired and unknown invoices are `Ok(false)`.
    pub async fn is_settled(&self, payment_hash: &PaymentHash) -> Result<bool, BackendError> {
        let slot = self.slot_or_insert(payment_hash).await;
        let mut record = slot.lock().await;
        Ok(self.refresh(&mut record).await?.is_settled())
    }

    /// Current status for the status endpoint.
    ///
    /// Unlike [`Self::is_settled`] this never creates a record for a hash the
    /// tracker has not seen, so arbitrary lookups cannot grow the record set.
    pub async fn status(&self, payment_hash: &PaymentHash) -> Result<SettlementStatus, BackendError> {
        match self.slot(payment_hash).await {
            Some(slot) => {
                let mut record = slot.lock().await;
                self.refresh(&mut record).await
            }
            None => self.backend.check_settlement(payment_hash).await,
        }
    }
}
