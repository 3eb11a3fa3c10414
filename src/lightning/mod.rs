//! Lightning payment backends
//!
//! - `types`: payment hashes, preimages, invoices
//! - `backend`: the `PaymentBackend` trait and the timeout wrapper
//! - `lnbits`: LNbits wallet client
//! - `mock`: in-process backend for development

pub mod backend;
pub mod lnbits;
pub mod mock;
pub mod types;

pub use backend::{AnyBackend, BackendError, PaymentBackend, TimeoutBackend};
pub use lnbits::{LnbitsClient, LnbitsError};
pub use mock::MockBackend;
pub use types::{HexParseError, Invoice, PaymentHash, Preimage, SettlementStatus};
