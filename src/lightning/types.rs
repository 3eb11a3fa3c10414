//! Lightning payment primitives: payment hashes, preimages, invoices

use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Digest;
use subtle::ConstantTimeEq;
use utoipa::ToSchema;

use crate::sha256;

// ============================================================================
// Hex parsing
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HexParseError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("expected 32 bytes, got {0}")]
    Length(usize),
}

fn parse_32(s: &str) -> Result<[u8; 32], HexParseError> {
    let bytes = hex::decode(s.trim())?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| HexParseError::Length(len))
}

// ============================================================================
// Payment Hash
// ============================================================================

/// SHA-256 of an invoice preimage; identifies the invoice everywhere.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PaymentHash(pub [u8; 32]);

impl PaymentHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Display for PaymentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Debug for PaymentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "PaymentHash({})", self.to_hex())
    }
}

impl FromStr for PaymentHash {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_32(s).map(PaymentHash)
    }
}

impl Serialize for PaymentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PaymentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PaymentHash::from_str(&s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Preimage
// ============================================================================

/// The secret revealed to a payer when an invoice is paid.
///
/// Presenting it is the payment proof: it reduces to the invoice's
/// [`PaymentHash`] via SHA-256.
#[derive(Clone, Copy)]
pub struct Preimage([u8; 32]);

impl Preimage {
    pub fn random() -> Self {
        Self(rand::random())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn payment_hash(&self) -> PaymentHash {
        PaymentHash(sha256!(self.0).finalize().into())
    }

    /// Constant-time check that this preimage reduces to `hash`
    pub fn matches(&self, hash: &PaymentHash) -> bool {
        self.payment_hash().0.ct_eq(&hash.0).into()
    }
}

impl Debug for Preimage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("Preimage(..)")
    }
}

impl FromStr for Preimage {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_32(s).map(Preimage)
    }
}

// ============================================================================
// Settlement Status
// ============================================================================

/// Backend-reported state of an invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SettlementStatus {
    Pending,
    Settled,
    Expired,
    /// The backend has no record of the payment hash
    Unknown,
}

impl SettlementStatus {
    pub fn is_settled(self) -> bool {
        matches!(self, SettlementStatus::Settled)
    }
}

impl Display for SettlementStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            SettlementStatus::Pending => "pending",
            SettlementStatus::Settled => "settled",
            SettlementStatus::Expired => "expired",
            SettlementStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Invoice
// ============================================================================

/// A payable request created by the backend for one catalog purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Invoice {
    #[schema(value_type = String, example = "3f4c...e1")]
    pub payment_hash: PaymentHash,
    /// Amount in satoshis
    #[schema(example = 50)]
    pub amount: u64,
    /// BOLT11 payment request handed to the client's wallet
    pub payment_request: String,
    /// Unix seconds
    pub created_at: u64,
    /// Seconds after `created_at` the invoice stays payable
    pub expiry: u64,
    /// Preimage disclosed by the mock backend only, so the flow can be driven
    /// without a wallet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock_preimage: Option<String>,
}

impl Invoice {
    pub fn expires_at(&self) -> u64 {
        self.created_at.saturating_add(self.expiry)
    }
}
