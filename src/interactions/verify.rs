//! Request signature verification.
//!
//! Every interaction request is signed with the application's Ed25519 key
//! over `timestamp || body`.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Invalid public key: {0}")]
    InvalidKey(String),

    #[error("Missing signature headers")]
    MissingHeaders,

    #[error("Malformed signature")]
    Malformed,

    #[error("Signature does not match")]
    Mismatch,
}

#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    /// Build a verifier from the hex-encoded public key.
    pub fn from_hex(public_key: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(public_key.trim())
            .map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SignatureError::InvalidKey("expected 32 bytes".into()))?;
        let key =
            VerifyingKey::from_bytes(&bytes).map_err(|e| SignatureError::InvalidKey(e.to_string()))?;
        Ok(Self { key })
    }

    pub fn verify(
        &self,
        signature: Option<&str>,
        timestamp: Option<&str>,
        body: &[u8],
    ) -> Result<(), SignatureError> {
        let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
            return Err(SignatureError::MissingHeaders);
        };

        let raw = hex::decode(signature).map_err(|_| SignatureError::Malformed)?;
        let raw: [u8; 64] = raw.try_into().map_err(|_| SignatureError::Malformed)?;
        let signature = Signature::from_bytes(&raw);

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        self.key
            .verify(&message, &signature)
            .map_err(|_| SignatureError::Mismatch)
    }
}


#[cfg(test)]
mod tests {
    use super::{test_keys::*, *};

    #[test]
    fn test_valid_signature() {
        let verifier = SignatureVerifier::from_hex(&public_key_hex()).unwrap();
        let body = br#"{"type":1}"#;
        let sig = sign("1700000000", body);
        assert_eq!(verifier.verify(Some(&sig), Some("1700000000"), body), Ok(()));
    }

    #[test]
    fn test_rejections() {
        let verifier = SignatureVerifier::from_hex(&public_key_hex()).unwrap();
        let body = br#"{"type":1}"#;
        let sig = sign("1700000000", body);

        assert_eq!(
            verifier.verify(None, Some("1700000000"), body),
            Err(SignatureError::MissingHeaders)
        );
        assert_eq!(
            verifier.verify(Some("zz"), Some("1700000000"), body),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verifier.verify(Some(&sig), Some("1700000001"), body),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verifier.verify(Some(&sig), Some("1700000000"), br#"{"type":2}"#),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_invalid_key() {
        assert!(matches!(
            SignatureVerifier::from_hex("abcd"),
            Err(SignatureError::InvalidKey(_))
        ));
        assert!(matches!(
            SignatureVerifier::from_hex("not hex"),
            Err(SignatureError::InvalidKey(_))
        ));
    }
}
