//! # Recoverable Signatures
//!
//! secp256k1 ECDSA over 32-byte digests, in the 65-byte compact recoverable
//! format the UPCX chain expects:
//!
//! ```text
//! header (1 byte) || r (32 bytes) || s (32 bytes)
//! header = recovery_id + 27 + 4
//! ```
//!
//! The `+ 27` is Bitcoin heritage; the `+ 4` flags that the signer's public
//! key is compressed. So valid headers are `31..=34` and nothing else.
//!
//! Nonces are RFC 6979 deterministic and `s` is low-S normalized by k256,
//! which also adjusts the recovery id to match. Same key, same digest, same
//! signature, every time.
//!
//! We only sign digests. Hashing the message is the caller's business; this
//! module never guesses which hash function a protocol wanted.

use std::fmt;

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use thiserror::Error;

use super::keys::KeyPair;
use crate::config::{PUBLIC_KEY_LENGTH, SIGNATURE_HEADER_BASE, SIGNATURE_LENGTH};

/// Errors during signature operations.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The private key is not a valid secp256k1 scalar.
    #[error("private key scalar is outside the valid secp256k1 range")]
    OutOfRangeKey,

    /// The signature bytes are malformed.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// No public key could be recovered from the signature and digest.
    #[error("public key recovery failed")]
    RecoveryFailed,
}

/// A 65-byte compact recoverable signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature([u8; SIGNATURE_LENGTH]);

impl RecoverableSignature {
    /// Wrap raw bytes. Only the length is checked here; the header and the
    /// scalars are validated when the signature is used.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        let array: [u8; SIGNATURE_LENGTH] = bytes.try_into().map_err(|_| {
            SignatureError::InvalidSignature(format!(
                "expected {SIGNATURE_LENGTH} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    /// Parse from hex.
    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let bytes =
            hex::decode(s).map_err(|e| SignatureError::InvalidSignature(format!("hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// The raw 65 bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    /// Lowercase hex encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The recovery id carried in the header, or `None` if the header is
    /// outside `31..=34`.
    pub fn recovery_id(&self) -> Option<u8> {
        let id = self.0[0].checked_sub(SIGNATURE_HEADER_BASE)?;
        (id <= 3).then_some(id)
    }
}

impl fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecoverableSignature({})", self.to_hex())
    }
}

/// Sign a 32-byte digest with a keypair.
///
/// # Example
///
/// ```
/// use upcx_custody::crypto::{keys::KeyPair, sha256, signatures};
///
/// let kp = KeyPair::generate_random().unwrap();
/// let digest = sha256(b"transfer 10 UPCX");
/// let sig = signatures::sign(&kp, &digest).unwrap();
///
/// assert!(signatures::verify(kp.public_key(), &digest, &sig));
/// ```
pub fn sign(keypair: &KeyPair, digest: &[u8; 32]) -> Result<RecoverableSignature, SignatureError> {
    let signing_key = keypair
        .signing_key()
        .map_err(|_| SignatureError::OutOfRangeKey)?;
    sign_with_signing_key(&signing_key, digest)
}

/// Sign a 32-byte digest with raw private key bytes.
pub fn sign_with_private_key(
    private_key: &[u8],
    digest: &[u8; 32],
) -> Result<RecoverableSignature, SignatureError> {
    let signing_key =
        SigningKey::from_slice(private_key).map_err(|_| SignatureError::OutOfRangeKey)?;
    sign_with_signing_key(&signing_key, digest)
}

fn sign_with_signing_key(
    signing_key: &SigningKey,
    digest: &[u8; 32],
) -> Result<RecoverableSignature, SignatureError> {
    let (signature, recovery_id) = signing_key
        .sign_prehash_recoverable(digest)
        .map_err(|e| SignatureError::InvalidSignature(e.to_string()))?;

    let mut out = [0u8; SIGNATURE_LENGTH];
    out[0] = SIGNATURE_HEADER_BASE + recovery_id.to_byte();
    out[1..].copy_from_slice(&signature.to_bytes());
    Ok(RecoverableSignature(out))
}

/// Recover the compressed public key that produced `signature` over `digest`.
pub fn recover_public_key(
    signature: &RecoverableSignature,
    digest: &[u8; 32],
) -> Result<[u8; PUBLIC_KEY_LENGTH], SignatureError> {
    let id = signature.recovery_id().ok_or_else(|| {
        SignatureError::InvalidSignature(format!("header byte {} out of range", signature.0[0]))
    })?;
    let recovery_id = RecoveryId::from_byte(id)
        .ok_or_else(|| SignatureError::InvalidSignature("invalid recovery id".to_string()))?;

    let compact = Signature::from_slice(&signature.0[1..])
        .map_err(|e| SignatureError::InvalidSignature(e.to_string()))?;

    let recovered = VerifyingKey::recover_from_prehash(digest, &compact, recovery_id)
        .map_err(|_| SignatureError::RecoveryFailed)?;

    let point = recovered.to_encoded_point(true);
    let mut public_key = [0u8; PUBLIC_KEY_LENGTH];
    public_key.copy_from_slice(point.as_bytes());
    Ok(public_key)
}

/// Check that `signature` over `digest` was made by `public_key`.
///
/// Returns `false` for a malformed signature rather than an error. "Not
/// valid" is the only answer a verifier needs.
pub fn verify(
    public_key: &[u8; PUBLIC_KEY_LENGTH],
    digest: &[u8; 32],
    signature: &RecoverableSignature,
) -> bool {
    matches!(recover_public_key(signature, digest), Ok(recovered) if &recovered == public_key)
}
