//! # UPCX Addresses
//!
//! A UPCX address is the human-facing form of an account's public key:
//!
//! ```text
//! public_key (33 bytes, compressed)
//!     -> checksum = RIPEMD160(public_key)[0..4]
//!     -> "UPCX" + base58(public_key || checksum)
//! ```
//!
//! This is the string the account registry stores as `pubKey` and the one
//! users paste around. Note the checksum: raw RIPEMD-160, not the
//! double-SHA256 used by WIF. The two schemes stay separate; unifying them
//! would silently invalidate every address already registered.

use std::fmt;
use std::str::FromStr;

use k256::PublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::{ADDRESS_PREFIX, CHECKSUM_LENGTH, PUBLIC_KEY_LENGTH};
use crate::crypto::base58;
use crate::crypto::hash::ripemd160;

/// Errors that can occur while parsing a UPCX address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The string does not start with `UPCX`.
    #[error("address must start with '{ADDRESS_PREFIX}'")]
    MissingPrefix,

    /// The body is not valid Base58.
    #[error("address body is not valid base58")]
    InvalidBase58,

    /// The decoded body has the wrong length.
    #[error("invalid address length: expected {expected} bytes, got {got}")]
    InvalidLength {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes.
        got: usize,
    },

    /// The RIPEMD-160 checksum does not match.
    #[error("address checksum mismatch")]
    ChecksumMismatch,

    /// The embedded bytes are not a point on secp256k1.
    #[error("address does not encode a valid secp256k1 public key")]
    InvalidPublicKey,
}

/// A validated UPCX public-key address.
///
/// # Examples
///
/// ```
/// use upcx_custody::crypto::keys::KeyPair;
/// use upcx_custody::identity::UpcxAddress;
///
/// let kp = KeyPair::generate_random().unwrap();
/// let address = kp.upcx_address().to_string();
/// assert!(address.starts_with("UPCX"));
///
/// let parsed: UpcxAddress = address.parse().unwrap();
/// assert_eq!(parsed.public_key_bytes(), kp.public_key());
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct UpcxAddress {
    public_key: [u8; PUBLIC_KEY_LENGTH],
}

impl UpcxAddress {
    /// Build an address from a compressed public key.
    pub fn from_public_key(public_key: &[u8; PUBLIC_KEY_LENGTH]) -> Self {
        Self {
            public_key: *public_key,
        }
    }

    /// Parse and validate an address string.
    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let body = s
            .strip_prefix(ADDRESS_PREFIX)
            .ok_or(AddressError::MissingPrefix)?;
        let raw = base58::decode(body).ok_or(AddressError::InvalidBase58)?;

        let expected = PUBLIC_KEY_LENGTH + CHECKSUM_LENGTH;
        if raw.len() != expected {
            return Err(AddressError::InvalidLength {
                expected,
                got: raw.len(),
            });
        }

        let (key, check) = raw.split_at(PUBLIC_KEY_LENGTH);
        if ripemd160(key)[..CHECKSUM_LENGTH] != *check {
            return Err(AddressError::ChecksumMismatch);
        }

        PublicKey::from_sec1_bytes(key).map_err(|_| AddressError::InvalidPublicKey)?;

        let mut public_key = [0u8; PUBLIC_KEY_LENGTH];
        public_key.copy_from_slice(key);
        Ok(Self { public_key })
    }

    /// The compressed public key this address encodes.
    pub fn public_key_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.public_key
    }

    fn encode(&self) -> String {
        let mut full = Vec::with_capacity(PUBLIC_KEY_LENGTH + CHECKSUM_LENGTH);
        full.extend_from_slice(&self.public_key);
        full.extend_from_slice(&ripemd160(&self.public_key)[..CHECKSUM_LENGTH]);
        format!("{ADDRESS_PREFIX}{}", base58::encode(&full))
    }
}

impl fmt::Display for UpcxAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for UpcxAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UpcxAddress({})", self.encode())
    }
}

impl FromStr for UpcxAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for UpcxAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for UpcxAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::KeyPair;

    #[test]
    fn address_roundtrip() {
        let kp = KeyPair::generate_random().unwrap();
        let s = kp.upcx_address().to_string();
        let parsed = UpcxAddress::parse(&s).unwrap();
        assert_eq!(parsed, kp.upcx_address());
    }

    #[test]
    fn address_layout() {
        let kp = KeyPair::generate_random().unwrap();
        let s = kp.upcx_address().to_string();
        let raw = base58::decode(&s[4..]).unwrap();
        assert_eq!(raw.len(), 37);
        assert_eq!(&raw[..33], kp.public_key());
        assert_eq!(&raw[33..], &ripemd160(kp.public_key())[..4]);
    }

    #[test]
    fn address_checksum_differs_from_wif_scheme() {
        // The address checksum must be RIPEMD-160, not double SHA-256.
        let kp = KeyPair::generate_random().unwrap();
        let s = kp.upcx_address().to_string();
        let raw = base58::decode(&s[4..]).unwrap();
        assert_ne!(&raw[33..], &base58::checksum(kp.public_key())[..]);
    }

    #[test]
    fn missing_prefix_rejected() {
        let kp = KeyPair::generate_random().unwrap();
        let s = kp.upcx_address().to_string();
        assert_eq!(UpcxAddress::parse(&s[4..]), Err(AddressError::MissingPrefix));
        assert_eq!(
            UpcxAddress::parse(&format!("EOS{}", &s[4..])),
            Err(AddressError::MissingPrefix)
        );
    }

    #[test]
    fn checksum_flip_rejected() {
        let kp = KeyPair::generate_random().unwrap();
        let s = kp.upcx_address().to_string();
        let mut raw = base58::decode(&s[4..]).unwrap();
        raw[36] ^= 0x01;
        let tampered = format!("UPCX{}", base58::encode(&raw));
        assert_eq!(UpcxAddress::parse(&tampered), Err(AddressError::ChecksumMismatch));
    }

    #[test]
    fn wrong_length_rejected() {
        let short = format!("UPCX{}", base58::encode(&[2u8; 20]));
        assert!(matches!(
            UpcxAddress::parse(&short),
            Err(AddressError::InvalidLength { expected: 37, got: 20 })
        ));
    }

    #[test]
    fn off_curve_key_rejected() {
        // 0x05 is not a valid SEC1 tag, so this can never be a public key,
        // even with a correct checksum.
        let mut bogus = vec![0x05u8; 33];
        let check = ripemd160(&bogus);
        bogus.extend_from_slice(&check[..4]);
        let s = format!("UPCX{}", base58::encode(&bogus));
        assert_eq!(UpcxAddress::parse(&s), Err(AddressError::InvalidPublicKey));
    }

    #[test]
    fn serde_uses_string_form() {
        let kp = KeyPair::generate_random().unwrap();
        let address = kp.upcx_address();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", address));
        let back: UpcxAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
