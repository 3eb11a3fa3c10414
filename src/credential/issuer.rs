//! HMAC-SHA256 credential minting and verification

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::token::{CAVEAT_VERSION, Caveats, Credential, CredentialError, MAC_LEN};
use crate::lightning::PaymentHash;
use crate::prelude::unix_now;

type HmacSha256 = Hmac<Sha256>;

/// Separates credential MACs from any other use of the same secret
const MAC_DOMAIN: &[u8] = b"skill402.credential";

/// Mints and verifies credentials with a process-held secret.
///
/// The keyed MAC state is built once; issuing and verifying only clone it,
/// so the issuer is freely shareable across request tasks.
#[derive(Clone)]
pub struct CredentialIssuer {
    keyed: HmacSha256,
}

impl std::fmt::Debug for CredentialIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialIssuer(..)")
    }
}

impl CredentialIssuer {
    pub fn new(secret: &SecretString) -> Result<Self, CredentialError> {
        let key = secret.expose_secret().as_bytes();
        if key.is_empty() {
            return Err(CredentialError::EmptySecret);
        }
        let keyed = HmacSha256::new_from_slice(key).map_err(|_| CredentialError::EmptySecret)?;
        Ok(Self { keyed })
    }

    /// An issuer keyed with a fresh random secret; its tokens die with the process
    pub fn random() -> Self {
        let secret: [u8; 32] = rand::random();
        let keyed = HmacSha256::new_from_slice(&secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        Self { keyed }
    }

    fn mac(&self, payload: &[u8]) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(MAC_DOMAIN);
        mac.update(payload);
        mac
    }

    pub fn issue(&self, item_id: &str, payment_hash: PaymentHash) -> Result<Credential, CredentialError> {
        self.issue_at(item_id, payment_hash, unix_now())
    }

    pub fn issue_at(
        &self,
        item_id: &str,
        payment_hash: PaymentHash,
        issued_at: u64,
    ) -> Result<Credential, CredentialError> {
        if item_id.is_empty() {
            return Err(CredentialError::Malformed("empty item id"));
        }
        let nonce: [u8; 16] = rand::random();
        let caveats = Caveats {
            version: CAVEAT_VERSION,
            identifier: hex::encode(nonce),
            item_id: item_id.to_string(),
            payment_hash,
            issued_at,
        };
        let payload = serde_json::to_vec(&caveats)?;
        let mac: [u8; MAC_LEN] = self.mac(&payload).finalize().into_bytes().into();
        Ok(Credential { caveats, payload, mac })
    }

    /// Authenticate a raw token. Any decoding, version or MAC failure is an error;
    /// there is no partially trusted result.
    pub fn verify(&self, raw: &str) -> Result<Credential, CredentialError> {
        let (payload, mac) = Credential::split(raw)?;
        // Check the MAC before trusting anything inside the payload
        self.mac(&payload)
            .verify_slice(&mac)
            .map_err(|_| CredentialError::BadSignature)?;
        let caveats = Credential::parse_caveats(&payload)?;
        let mac: [u8; MAC_LEN] = mac
            .try_into()
            .map_err(|_| CredentialError::Malformed("mac length"))?;
        Ok(Credential { caveats, payload, mac })
    }
}
