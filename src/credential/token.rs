//! Token encoding: `base64url(payload) "." base64url(mac)`

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::lightning::PaymentHash;

/// Highest caveat schema version this build understands
pub const CAVEAT_VERSION: u8 = 1;

pub const MAC_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("malformed token: {0}")]
    Malformed(&'static str),
    #[error("invalid base64 in token: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("invalid caveats: {0}")]
    Caveats(#[from] serde_json::Error),
    #[error("unsupported caveat version {0}")]
    UnsupportedVersion(u8),
    #[error("signature mismatch")]
    BadSignature,
    #[error("signing secret must not be empty")]
    EmptySecret,
}

/// The restrictions a credential carries.
///
/// Fields unknown to this version are ignored on decode, so later versions
/// can add caveats without invalidating tokens already in circulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caveats {
    #[serde(rename = "v")]
    pub version: u8,
    /// Random nonce, unique per credential
    #[serde(rename = "id")]
    pub identifier: String,
    #[serde(rename = "item")]
    pub item_id: String,
    #[serde(rename = "hash")]
    pub payment_hash: PaymentHash,
    /// Unix seconds
    #[serde(rename = "iat")]
    pub issued_at: u64,
}

/// A decoded credential together with the exact bytes its MAC covers
#[derive(Debug, Clone)]
pub struct Credential {
    pub caveats: Caveats,
    pub(crate) payload: Vec<u8>,
    pub(crate) mac: [u8; MAC_LEN],
}

impl Credential {
    pub fn encode(&self) -> String {
        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&self.payload),
            URL_SAFE_NO_PAD.encode(self.mac)
        )
    }

    /// Split a raw token into payload and MAC bytes without checking either
    pub(crate) fn split(raw: &str) -> Result<(Vec<u8>, Vec<u8>), CredentialError> {
        let (payload, mac) = raw
            .trim()
            .split_once('.')
            .ok_or(CredentialError::Malformed("missing separator"))?;
        if payload.is_empty() || mac.is_empty() {
            return Err(CredentialError::Malformed("empty segment"));
        }
        Ok((URL_SAFE_NO_PAD.decode(payload)?, URL_SAFE_NO_PAD.decode(mac)?))
    }

    pub(crate) fn parse_caveats(payload: &[u8]) -> Result<Caveats, CredentialError> {
        let caveats: Caveats = serde_json::from_slice(payload)?;
        if caveats.version == 0 || caveats.version > CAVEAT_VERSION {
            return Err(CredentialError::UnsupportedVersion(caveats.version));
        }
        Ok(caveats)
    }
}
