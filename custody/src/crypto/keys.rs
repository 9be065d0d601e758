//! # Key Management
//!
//! secp256k1 keypair generation, seed derivation and WIF serialization for
//! UPCX accounts.
//!
//! A [`KeyPair`] owns 32 bytes of private scalar and the 33-byte compressed
//! public key computed from it. The public half is derived exactly once, at
//! construction, and neither half is mutable afterwards, so the two can
//! never drift apart.
//!
//! ## Security considerations
//!
//! - The private key lives in a [`Zeroizing`] buffer. Every exit path
//!   (success, `?`, panic unwinding) wipes it when the keypair drops.
//! - Randomness comes from `OsRng`. If the OS refuses to give us entropy we
//!   fail loudly with [`KeyError::RandomnessFailure`]. We never retry with
//!   something weaker.
//! - Seed derivation adds the index to the seed as a 256-bit big-endian
//!   integer inside a wiped buffer, and does *not* reduce modulo the curve
//!   order. Values outside `[1, n)` come back as
//!   [`KeyError::OutOfRangeKey`] so the caller can pick another index.
//! - Key bytes are never logged and never appear in `Debug` output.

use std::fmt;

use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

use super::base58::{self, CodecError};
use crate::config::{MIN_SEED_LENGTH, PRIVATE_KEY_LENGTH, PUBLIC_KEY_LENGTH, WIF_VERSION};
use crate::identity::address::UpcxAddress;

/// Errors that can occur during key operations.
#[derive(Debug, Error)]
pub enum KeyError {
    /// Malformed input: bad hex, wrong length, too-short seed.
    #[error("invalid key input: {0}")]
    InvalidInput(String),

    /// The scalar is zero, not below the curve order, or wider than 32 bytes.
    #[error("private key scalar is outside the valid secp256k1 range")]
    OutOfRangeKey,

    /// The OS randomness source failed.
    #[error("randomness source unavailable: {0}")]
    RandomnessFailure(String),

    /// WIF decoding failed.
    #[error("invalid WIF: {0}")]
    Wif(#[from] CodecError),
}

/// A secp256k1 keypair: private scalar plus compressed public key.
///
/// Intentionally does NOT implement `Serialize`. Exporting a private key
/// should be a deliberate call to [`to_wif`](Self::to_wif), not a side
/// effect of shoving a struct into a JSON response.
///
/// # Examples
///
/// ```
/// use upcx_custody::crypto::keys::KeyPair;
///
/// let kp = KeyPair::generate_random().unwrap();
/// let wif = kp.to_wif();
/// let restored = KeyPair::from_wif(&wif).unwrap();
/// assert_eq!(kp.public_key(), restored.public_key());
/// ```
#[derive(Clone)]
pub struct KeyPair {
    private_key: Zeroizing<[u8; PRIVATE_KEY_LENGTH]>,
    public_key: [u8; PUBLIC_KEY_LENGTH],
}

impl KeyPair {
    /// Generate a fresh keypair from 32 bytes of OS randomness.
    pub fn generate_random() -> Result<Self, KeyError> {
        let mut bytes = Zeroizing::new([0u8; PRIVATE_KEY_LENGTH]);
        OsRng
            .try_fill_bytes(&mut bytes[..])
            .map_err(|e| KeyError::RandomnessFailure(e.to_string()))?;
        Self::from_private_key(&bytes[..])
    }

    /// Derive a keypair from a hex seed and an index.
    ///
    /// The seed (optionally `0x`-prefixed) is read as a big-endian unsigned
    /// integer, `index` is added, and the result is left-padded to 32
    /// bytes. A result wider than 32 bytes, zero, or not below the curve
    /// order is [`KeyError::OutOfRangeKey`].
    ///
    /// Deterministic: the same `(seed, index)` always yields the same key.
    pub fn derive_from_seed(seed_hex: &str, index: u32) -> Result<Self, KeyError> {
        let trimmed = seed_hex.strip_prefix("0x").unwrap_or(seed_hex);
        let seed = Zeroizing::new(
            hex::decode(trimmed).map_err(|e| KeyError::InvalidInput(format!("seed hex: {e}")))?,
        );
        if seed.len() < MIN_SEED_LENGTH {
            return Err(KeyError::InvalidInput(format!(
                "seed must be at least {MIN_SEED_LENGTH} bytes, got {}",
                seed.len()
            )));
        }

        let significant = seed.iter().position(|&b| b != 0).unwrap_or(seed.len());
        let digits = &seed[significant..];
        if digits.len() > PRIVATE_KEY_LENGTH {
            return Err(KeyError::OutOfRangeKey);
        }

        let mut scalar = Zeroizing::new([0u8; PRIVATE_KEY_LENGTH]);
        scalar[PRIVATE_KEY_LENGTH - digits.len()..].copy_from_slice(digits);
        add_be(&mut scalar, index)?;
        Self::from_private_key(&scalar[..])
    }

    /// Build a keypair from raw 32-byte private key material.
    ///
    /// The public key is recomputed here, always.
    pub fn from_private_key(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != PRIVATE_KEY_LENGTH {
            return Err(KeyError::InvalidInput(format!(
                "private key must be {PRIVATE_KEY_LENGTH} bytes, got {}",
                bytes.len()
            )));
        }
        let signing_key =
            SigningKey::from_slice(bytes).map_err(|_| KeyError::OutOfRangeKey)?;

        let point = signing_key.verifying_key().to_encoded_point(true);
        let mut public_key = [0u8; PUBLIC_KEY_LENGTH];
        public_key.copy_from_slice(point.as_bytes());

        let mut private_key = Zeroizing::new([0u8; PRIVATE_KEY_LENGTH]);
        private_key.copy_from_slice(bytes);

        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// Parse a hex-encoded private key.
    pub fn from_hex(hex_str: &str) -> Result<Self, KeyError> {
        let bytes = Zeroizing::new(
            hex::decode(hex_str).map_err(|e| KeyError::InvalidInput(format!("key hex: {e}")))?,
        );
        Self::from_private_key(&bytes)
    }

    /// Parse a WIF string (version `0x80`, 32-byte payload, double-SHA256 checksum).
    pub fn from_wif(wif: &str) -> Result<Self, KeyError> {
        let payload = Zeroizing::new(base58::decode_checked(
            wif.trim(),
            WIF_VERSION,
            PRIVATE_KEY_LENGTH,
        )?);
        Self::from_private_key(&payload)
    }

    /// Encode the private key as WIF.
    ///
    /// Handle the result like the key itself, because it *is* the key.
    pub fn to_wif(&self) -> String {
        base58::encode_checked(WIF_VERSION, &self.private_key[..])
    }

    /// The compressed public key bytes.
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.public_key
    }

    /// The public key as lowercase hex. Safe to log.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key)
    }

    /// The account's UPCX address.
    pub fn upcx_address(&self) -> UpcxAddress {
        UpcxAddress::from_public_key(&self.public_key)
    }

    /// Borrow the raw private key bytes.
    ///
    /// **Handle with extreme care.** Copy it and you own the job of
    /// wiping the copy.
    pub fn private_key_bytes(&self) -> &[u8; PRIVATE_KEY_LENGTH] {
        &self.private_key
    }

    pub(crate) fn signing_key(&self) -> Result<SigningKey, KeyError> {
        SigningKey::from_slice(&self.private_key[..]).map_err(|_| KeyError::OutOfRangeKey)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret key material in debug output. Not even "partially."
        write!(f, "KeyPair(pub={})", self.public_key_hex())
    }
}

impl PartialEq for KeyPair {
    /// Two keypairs are equal if their public keys match; the private key
    /// is a function of nothing else we could compare in constant time anyway.
    fn eq(&self, other: &Self) -> bool {
        self.public_key == other.public_key
    }
}

impl Eq for KeyPair {}

/// Adds `index` to a 32-byte big-endian integer in place. Carry out of the
/// top byte is [`KeyError::OutOfRangeKey`].
fn add_be(scalar: &mut [u8; PRIVATE_KEY_LENGTH], index: u32) -> Result<(), KeyError> {
    let mut carry = u64::from(index);
    for byte in scalar.iter_mut().rev() {
        if carry == 0 {
            break;
        }
        let sum = u64::from(*byte) + (carry & 0xff);
        *byte = sum as u8;
        carry = (carry >> 8) + (sum >> 8);
    }
    if carry != 0 {
        return Err(KeyError::OutOfRangeKey);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// secp256k1 group order n.
    const CURVE_ORDER_HEX: &str =
        "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141";

    /// Compressed encoding of the generator point G.
    const GENERATOR_HEX: &str =
        "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    fn zero_seed() -> String {
        "00".repeat(32)
    }

    #[test]
    fn test_generate_produces_valid_keypair() {
        let kp = KeyPair::generate_random().unwrap();
        assert_eq!(kp.public_key().len(), 33);
        assert!(matches!(kp.public_key()[0], 0x02 | 0x03));
        assert_eq!(kp.private_key_bytes().len(), 32);
    }

    #[test]
    fn test_two_generated_keypairs_are_different() {
        let kp1 = KeyPair::generate_random().unwrap();
        let kp2 = KeyPair::generate_random().unwrap();
        assert_ne!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn test_private_key_one_is_generator() {
        let kp = KeyPair::derive_from_seed(&zero_seed(), 1).unwrap();
        assert_eq!(kp.public_key_hex(), GENERATOR_HEX);
    }

    #[test]
    fn test_known_wif_vectors() {
        let one = KeyPair::derive_from_seed(&zero_seed(), 1).unwrap();
        assert_eq!(one.to_wif(), "5HpHagT65TZzG1PH3CSu63k8DbpvD8s5ip4nEB3kEsreAnchuDf");

        let kp = KeyPair::from_hex("0c28fca386c7a227600b2fe50b7cae11ec86d3bf1fbe471be89827e19d72aa1d")
            .unwrap();
        assert_eq!(kp.to_wif(), "5HueCGU8rMjxEXxiPuD5BDku4MkFqeZyd4dZ1jvhTVqvbTLvyTJ");
    }

    #[test]
    fn test_wif_roundtrip() {
        for _ in 0..8 {
            let kp = KeyPair::generate_random().unwrap();
            let restored = KeyPair::from_wif(&kp.to_wif()).unwrap();
            assert_eq!(kp.private_key_bytes(), restored.private_key_bytes());
            assert_eq!(kp.public_key(), restored.public_key());
        }
    }

    #[test]
    fn test_wif_checksum_flip_rejected() {
        let kp = KeyPair::generate_random().unwrap();
        let mut raw = base58::decode(&kp.to_wif()).unwrap();
        assert_eq!(raw.len(), 37);
        for i in 33..37 {
            let original = raw[i];
            raw[i] ^= 0xff;
            let tampered = base58::encode(&raw);
            assert!(matches!(
                KeyPair::from_wif(&tampered),
                Err(KeyError::Wif(CodecError::ChecksumMismatch))
            ));
            raw[i] = original;
        }
    }

    #[test]
    fn test_wif_wrong_version_rejected() {
        let wif = base58::encode_checked(0xef, &[0x11; 32]);
        assert!(matches!(
            KeyPair::from_wif(&wif),
            Err(KeyError::Wif(CodecError::VersionMismatch { .. }))
        ));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let seed = "ab".repeat(32);
        let a = KeyPair::derive_from_seed(&seed, 7).unwrap();
        let b = KeyPair::derive_from_seed(&seed, 7).unwrap();
        assert_eq!(a.private_key_bytes(), b.private_key_bytes());
        assert_eq!(a.public_key(), b.public_key());
    }

    #[test]
    fn test_derivation_index_changes_key() {
        let seed = "ab".repeat(32);
        let a = KeyPair::derive_from_seed(&seed, 0).unwrap();
        let b = KeyPair::derive_from_seed(&seed, 1).unwrap();
        assert_ne!(a.public_key(), b.public_key());
        // Index is added, not hashed: the last byte moves by one.
        assert_eq!(b.private_key_bytes()[31], a.private_key_bytes()[31] + 1);
    }

    #[test]
    fn test_derivation_accepts_hex_prefix() {
        let seed = "cd".repeat(32);
        let plain = KeyPair::derive_from_seed(&seed, 3).unwrap();
        let prefixed = KeyPair::derive_from_seed(&format!("0x{seed}"), 3).unwrap();
        assert_eq!(plain, prefixed);
    }

    #[test]
    fn test_derivation_zero_is_out_of_range() {
        assert!(matches!(
            KeyPair::derive_from_seed(&zero_seed(), 0),
            Err(KeyError::OutOfRangeKey)
        ));
    }

    #[test]
    fn test_derivation_curve_order_is_out_of_range() {
        assert!(matches!(
            KeyPair::derive_from_seed(CURVE_ORDER_HEX, 0),
            Err(KeyError::OutOfRangeKey)
        ));
        // n - 1 is the largest valid scalar; n - 1 + 1 is not.
        let n_minus_one = "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364140";
        assert!(KeyPair::derive_from_seed(n_minus_one, 0).is_ok());
        assert!(matches!(
            KeyPair::derive_from_seed(n_minus_one, 1),
            Err(KeyError::OutOfRangeKey)
        ));
    }

    #[test]
    fn test_derivation_overflow_is_out_of_range() {
        let max = "ff".repeat(32);
        assert!(matches!(
            KeyPair::derive_from_seed(&max, 1),
            Err(KeyError::OutOfRangeKey)
        ));
    }

    #[test]
    fn test_derivation_carries_across_bytes() {
        let mut seed = "11".repeat(28);
        seed.push_str("00ffffff");
        let kp = KeyPair::derive_from_seed(&seed, 0x0102_0304).unwrap();
        let mut expected = [0x11u8; 32];
        expected[28..].copy_from_slice(&[0x02, 0x02, 0x03, 0x03]);
        assert_eq!(kp.private_key_bytes(), &expected);
    }

    #[test]
    fn test_derivation_ignores_leading_zero_bytes_past_32() {
        let seed = "ab".repeat(32);
        let wide = format!("0000{seed}");
        assert_eq!(
            KeyPair::derive_from_seed(&wide, 9).unwrap(),
            KeyPair::derive_from_seed(&seed, 9).unwrap()
        );
        // 33 significant bytes can never fit.
        assert!(matches!(
            KeyPair::derive_from_seed(&format!("01{seed}"), 0),
            Err(KeyError::OutOfRangeKey)
        ));
    }

    #[test]
    fn test_derivation_rejects_bad_seed() {
        assert!(matches!(
            KeyPair::derive_from_seed("not-hex", 0),
            Err(KeyError::InvalidInput(_))
        ));
        assert!(matches!(
            KeyPair::derive_from_seed("deadbeef", 0),
            Err(KeyError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_derivation_left_pads_leading_zero_seed() {
        // A 32-byte seed that is mostly zeros still becomes a 32-byte key.
        let mut seed = "00".repeat(31);
        seed.push_str("05");
        let kp = KeyPair::derive_from_seed(&seed, 2).unwrap();
        let mut expected = [0u8; 32];
        expected[31] = 7;
        assert_eq!(kp.private_key_bytes(), &expected);
    }

    #[test]
    fn test_from_private_key_length_checked() {
        assert!(matches!(
            KeyPair::from_private_key(&[1u8; 31]),
            Err(KeyError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_clone_preserves_identity() {
        let kp = KeyPair::generate_random().unwrap();
        let cloned = kp.clone();
        assert_eq!(kp.private_key_bytes(), cloned.private_key_bytes());
        assert_eq!(kp, cloned);
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let kp = KeyPair::generate_random().unwrap();
        let debug_str = format!("{:?}", kp);
        assert!(debug_str.starts_with("KeyPair(pub="));
        assert!(!debug_str.contains(&hex::encode(kp.private_key_bytes())));
    }

    #[test]
    fn test_address_matches_keypair() {
        let kp = KeyPair::generate_random().unwrap();
        let address = kp.upcx_address();
        assert!(address.to_string().starts_with("UPCX"));
        assert_eq!(address.public_key_bytes(), kp.public_key());
    }
}
