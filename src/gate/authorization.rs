//! Parsing of `Authorization: L402 <token>:<preimage>` headers

use crate::lightning::{HexParseError, Preimage};

/// Scheme names accepted on the way in; `L402` is the one we emit
const SCHEMES: [&str; 2] = ["L402", "LSAT"];

#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("unsupported authorization scheme")]
    Scheme,
    #[error("expected <token>:<preimage>")]
    Format,
    #[error("invalid preimage: {0}")]
    Preimage(#[from] HexParseError),
}

/// A credential and payment proof as presented by a client
#[derive(Debug)]
pub struct PresentedCredential {
    pub token: String,
    pub proof: Preimage,
}

pub fn parse_authorization(header: &str) -> Result<PresentedCredential, AuthorizationError> {
    let (scheme, rest) = header
        .trim()
        .split_once(char::is_whitespace)
        .ok_or(AuthorizationError::Scheme)?;
    if !SCHEMES.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
        return Err(AuthorizationError::Scheme);
    }

    // Tokens never contain ':', so the last one separates the proof
    let (token, proof) = rest
        .trim()
        .rsplit_once(':')
        .ok_or(AuthorizationError::Format)?;
    if token.is_empty() || proof.is_empty() {
        return Err(AuthorizationError::Format);
    }

    Ok(PresentedCredential {
        token: token.to_string(),
        proof: proof.parse()?,
    })
}

/// `WWW-Authenticate` value for a challenge
pub fn challenge_header(token: &str, payment_request: &str) -> String {
    format!("L402 macaroon=\"{}\", invoice=\"{}\"", token, payment_request)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preimage_hex() -> String {
        "0f".repeat(32)
    }

    #[test]
    fn test_parse_l402() {
        let header = format!("L402 abc.def:{}", preimage_hex());
        let presented = parse_authorization(&header).unwrap();
        assert_eq!(presented.token, "abc.def");
        assert_eq!(presented.proof.to_hex(), preimage_hex());
    }

    #[test]
    fn test_parse_lsat_and_case() {
        let header = format!("lsat abc.def:{}", preimage_hex());
        assert!(parse_authorization(&header).is_ok());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_authorization(&format!("Bearer abc:{}", preimage_hex())),
            Err(AuthorizationError::Scheme)
        ));
        assert!(matches!(parse_authorization("L402"), Err(AuthorizationError::Scheme)));
        assert!(matches!(
            parse_authorization("L402 abc.def"),
            Err(AuthorizationError::Format)
        ));
        assert!(matches!(
            parse_authorization(&format!("L402 :{}", preimage_hex())),
            Err(AuthorizationError::Format)
        ));
        assert!(matches!(
            parse_authorization("L402 abc.def:nothex"),
            Err(AuthorizationError::Preimage(_))
        ));
    }

    #[test]
    fn test_challenge_header() {
        assert_eq!(
            challenge_header("tok", "lnbc50n1x"),
            "L402 macaroon=\"tok\", invoice=\"lnbc50n1x\""
        );
    }
}
