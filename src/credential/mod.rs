//! Signed access credentials binding an item id to an invoice's payment hash

pub mod issuer;
pub mod token;

pub use issuer::CredentialIssuer;
pub use token::{CAVEAT_VERSION, Caveats, Credential, CredentialError};
