//! secp256k1 account signer.
//!
//! Signs chain submissions and proof requests with the participant's
//! account key. Signatures are 64-byte raw `(r, s)`; verification is
//! exposed as a free function for the gateway's request authentication.

use k256::ecdsa::signature::{Signer as _, Verifier as _};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};

use crate::error::ChainBridgeError;
use crate::ports::Signer;

/// Account signer over a raw 32-byte secp256k1 secret.
pub struct Secp256k1Signer {
    address: String,
    key: SigningKey,
}

impl Secp256k1Signer {
    /// Build a signer from a 32-byte secret and the participant address.
    pub fn new(secret: &[u8], address: String) -> Result<Self, ChainBridgeError> {
        let key = SigningKey::from_slice(secret)
            .map_err(|e| ChainBridgeError::Signer(e.to_string()))?;
        Ok(Self { address, key })
    }

    /// Build a signer from a hex-encoded secret.
    pub fn from_hex(secret_hex: &str, address: String) -> Result<Self, ChainBridgeError> {
        let secret =
            hex::decode(secret_hex).map_err(|e| ChainBridgeError::Signer(e.to_string()))?;
        Self::new(&secret, address)
    }
}

impl Signer for Secp256k1Signer {
    fn address(&self) -> &str {
        &self.address
    }

    fn pubkey_hex(&self) -> String {
        hex::encode(self.key.verifying_key().to_encoded_point(true).as_bytes())
    }

    fn sign(&self, payload: &[u8]) -> Vec<u8> {
        let signature: Signature = self.key.sign(payload);
        signature.to_vec()
    }
}

/// Verify a raw 64-byte signature against a hex-encoded compressed pubkey.
pub fn verify_signature(pubkey_hex: &str, payload: &[u8], signature: &[u8]) -> bool {
    let Ok(pubkey_bytes) = hex::decode(pubkey_hex) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(&pubkey_bytes) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    verifying_key.verify(payload, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_signer() -> Secp256k1Signer {
        // Fixed secret; tests only.
        let secret = [7u8; 32];
        Secp256k1Signer::new(&secret, "grid1test".to_string()).unwrap()
    }

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let signer = test_signer();
        let payload = b"canonical request digest";
        let signature = signer.sign(payload);

        assert!(verify_signature(&signer.pubkey_hex(), payload, &signature));
        assert!(!verify_signature(&signer.pubkey_hex(), b"tampered", &signature));
    }

    #[test]
    fn test_verify_rejects_garbage_inputs() {
        let signer = test_signer();
        let signature = signer.sign(b"x");
        assert!(!verify_signature("zz-not-hex", b"x", &signature));
        assert!(!verify_signature(&signer.pubkey_hex(), b"x", &[1, 2, 3]));
    }

    #[test]
    fn test_pubkey_is_compressed_sec1() {
        let signer = test_signer();
        let pubkey = hex::decode(signer.pubkey_hex()).unwrap();
        assert_eq!(pubkey.len(), 33);
        assert!(pubkey[0] == 0x02 || pubkey[0] == 0x03);
    }

    #[test]
    fn test_rejects_bad_secret() {
        assert!(Secp256k1Signer::new(&[0u8; 5], "a".to_string()).is_err());
        // All-zero secret is not a valid scalar.
        assert!(Secp256k1Signer::new(&[0u8; 32], "a".to_string()).is_err());
    }
}
