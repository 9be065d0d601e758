//! # Share Encryption
//!
//! Symmetric encryption for threshold shares before they leave the device.
//! Each share is sealed under a [`ShareKey`] derived from the user's
//! identity claims, then handed to the custodian as a base64 string:
//!
//! ```text
//! base64( iv || ciphertext )
//! ```
//!
//! Two suites are supported, selected by [`ShareCipher`]:
//!
//! - **AES-256-GCM** (default). 12-byte random nonce, 16-byte tag appended
//!   to the ciphertext. Wrong key, bit flips and truncation all fail
//!   deterministically. This is what new backups use.
//! - **AES-256-CBC + PKCS#7** (legacy). 16-byte random IV, no
//!   authentication. This is the format already sitting in custodian pools
//!   written by older clients, so we must keep reading it. A wrong key is
//!   only caught when the padding happens to come out invalid (roughly 255
//!   times in 256); the share checksum one layer up catches the rest.
//!
//! ## Nonce management
//!
//! Every call draws a fresh IV from `OsRng`. Share keys are stable per
//! identity, so a fixed IV would leak equality of plaintexts across
//! backups. Don't be clever here.
//!
//! ## Errors
//!
//! Deliberately vague. "Wrong key" and "corrupted ciphertext" are the same
//! error; the difference is none of an attacker's business.

use std::fmt;
use std::str::FromStr;

use aes::Aes256;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::{AES_BLOCK_LENGTH, AES_GCM_NONCE_LENGTH, AES_GCM_TAG_LENGTH, AES_KEY_LENGTH};

/// Errors that can occur during share encryption/decryption.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed -- wrong key or corrupted ciphertext")]
    DecryptFailed,

    #[error("invalid base64 in encrypted share")]
    InvalidBase64,

    #[error("ciphertext too short: expected at least {expected} bytes, got {got}")]
    CiphertextTooShort { expected: usize, got: usize },

    #[error("ciphertext length {0} is not a multiple of the AES block size")]
    InvalidLength(usize),

    #[error("invalid PKCS#7 padding")]
    BadPadding,

    #[error("invalid key length: expected {AES_KEY_LENGTH} bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("randomness source unavailable: {0}")]
    RandomnessFailure(String),

    #[error("decrypted payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("unknown cipher suite '{0}'")]
    UnknownCipher(String),
}

// ---------------------------------------------------------------------------
// Share Key
// ---------------------------------------------------------------------------

/// A 32-byte AES-256 key used to seal shares. Wiped on drop.
#[derive(Clone)]
pub struct ShareKey(Zeroizing<[u8; AES_KEY_LENGTH]>);

impl ShareKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; AES_KEY_LENGTH]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Parse a base64 (standard alphabet) key.
    pub fn from_base64(s: &str) -> Result<Self, EncryptionError> {
        let raw = Zeroizing::new(
            STANDARD
                .decode(s.trim())
                .map_err(|_| EncryptionError::InvalidBase64)?,
        );
        if raw.len() != AES_KEY_LENGTH {
            return Err(EncryptionError::InvalidKeyLength(raw.len()));
        }
        let mut key = Zeroizing::new([0u8; AES_KEY_LENGTH]);
        key.copy_from_slice(&raw);
        Ok(Self(key))
    }

    /// Base64 (standard alphabet, padded) encoding of the key.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0[..])
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; AES_KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for ShareKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ShareKey(<redacted>)")
    }
}

// ---------------------------------------------------------------------------
// Cipher Suites
// ---------------------------------------------------------------------------

/// Which cipher suite seals the shares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShareCipher {
    /// AES-256-GCM with a 12-byte nonce.
    #[default]
    Aes256Gcm,
    /// AES-256-CBC with PKCS#7 padding and a 16-byte IV.
    Aes256CbcPkcs7,
}

impl ShareCipher {
    /// Stable textual name, matching the serde form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShareCipher::Aes256Gcm => "aes256-gcm",
            ShareCipher::Aes256CbcPkcs7 => "aes256-cbc-pkcs7",
        }
    }
}

impl fmt::Display for ShareCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShareCipher {
    type Err = EncryptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aes256-gcm" | "gcm" => Ok(ShareCipher::Aes256Gcm),
            "aes256-cbc-pkcs7" | "cbc" => Ok(ShareCipher::Aes256CbcPkcs7),
            other => Err(EncryptionError::UnknownCipher(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Encrypt with the default suite (AES-256-GCM).
///
/// # Example
///
/// ```
/// use upcx_custody::crypto::encryption::{decrypt, encrypt, ShareKey};
///
/// let key = ShareKey::from_bytes([0x42u8; 32]);
/// let sealed = encrypt(&key, b"share bytes").unwrap();
/// assert_eq!(decrypt(&key, &sealed).unwrap(), b"share bytes");
/// ```
pub fn encrypt(key: &ShareKey, plaintext: &[u8]) -> Result<String, EncryptionError> {
    encrypt_with(ShareCipher::Aes256Gcm, key, plaintext)
}

/// Decrypt a blob produced by [`encrypt`].
pub fn decrypt(key: &ShareKey, blob: &str) -> Result<Vec<u8>, EncryptionError> {
    decrypt_with(ShareCipher::Aes256Gcm, key, blob)
}

/// Encrypt UTF-8 text with the default suite.
pub fn encrypt_str(key: &ShareKey, plaintext: &str) -> Result<String, EncryptionError> {
    encrypt(key, plaintext.as_bytes())
}

/// Decrypt a blob into UTF-8 text.
pub fn decrypt_str(key: &ShareKey, blob: &str) -> Result<String, EncryptionError> {
    let bytes = decrypt(key, blob)?;
    String::from_utf8(bytes).map_err(|_| EncryptionError::InvalidUtf8)
}

/// Encrypt with an explicit suite. Returns `base64(iv || ciphertext)`.
pub fn encrypt_with(
    cipher: ShareCipher,
    key: &ShareKey,
    plaintext: &[u8],
) -> Result<String, EncryptionError> {
    let sealed = match cipher {
        ShareCipher::Aes256Gcm => gcm_seal(key, plaintext)?,
        ShareCipher::Aes256CbcPkcs7 => cbc_seal(key, plaintext)?,
    };
    Ok(STANDARD.encode(sealed))
}

/// Decrypt with an explicit suite.
pub fn decrypt_with(
    cipher: ShareCipher,
    key: &ShareKey,
    blob: &str,
) -> Result<Vec<u8>, EncryptionError> {
    let data = STANDARD
        .decode(blob.trim())
        .map_err(|_| EncryptionError::InvalidBase64)?;
    match cipher {
        ShareCipher::Aes256Gcm => gcm_open(key, &data),
        ShareCipher::Aes256CbcPkcs7 => cbc_open(key, &data),
    }
}

fn random_iv<const N: usize>() -> Result<[u8; N], EncryptionError> {
    let mut iv = [0u8; N];
    OsRng
        .try_fill_bytes(&mut iv)
        .map_err(|e| EncryptionError::RandomnessFailure(e.to_string()))?;
    Ok(iv)
}

// ---------------------------------------------------------------------------
// AES-256-GCM
// ---------------------------------------------------------------------------

fn gcm_seal(key: &ShareKey, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let cipher =
        Aes256Gcm::new_from_slice(&key.0[..]).map_err(|_| EncryptionError::EncryptFailed)?;
    let nonce_bytes = random_iv::<AES_GCM_NONCE_LENGTH>()?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|_| EncryptionError::EncryptFailed)?;

    let mut out = Vec::with_capacity(AES_GCM_NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn gcm_open(key: &ShareKey, data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let min = AES_GCM_NONCE_LENGTH + AES_GCM_TAG_LENGTH;
    if data.len() < min {
        return Err(EncryptionError::CiphertextTooShort {
            expected: min,
            got: data.len(),
        });
    }
    let (nonce_bytes, ciphertext) = data.split_at(AES_GCM_NONCE_LENGTH);
    let cipher =
        Aes256Gcm::new_from_slice(&key.0[..]).map_err(|_| EncryptionError::DecryptFailed)?;
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| EncryptionError::DecryptFailed)
}

// ---------------------------------------------------------------------------
// AES-256-CBC + PKCS#7
// ---------------------------------------------------------------------------

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

fn cbc_seal(key: &ShareKey, plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let iv = random_iv::<AES_BLOCK_LENGTH>()?;
    cbc_seal_with_iv(key, iv, plaintext)
}

fn cbc_seal_with_iv(
    key: &ShareKey,
    iv: [u8; AES_BLOCK_LENGTH],
    plaintext: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256CbcEnc::new_from_slices(&key.0[..], &iv)
        .map_err(|_| EncryptionError::InvalidKeyLength(key.0.len()))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(AES_BLOCK_LENGTH + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn cbc_open(key: &ShareKey, data: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let min = 2 * AES_BLOCK_LENGTH;
    if data.len() < min {
        return Err(EncryptionError::CiphertextTooShort {
            expected: min,
            got: data.len(),
        });
    }
    let (iv, ciphertext) = data.split_at(AES_BLOCK_LENGTH);
    if ciphertext.len() % AES_BLOCK_LENGTH != 0 {
        return Err(EncryptionError::InvalidLength(ciphertext.len()));
    }

    let cipher = Aes256CbcDec::new_from_slices(&key.0[..], iv)
        .map_err(|_| EncryptionError::InvalidKeyLength(key.0.len()))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| EncryptionError::BadPadding)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> ShareKey {
        ShareKey::from_bytes([byte; AES_KEY_LENGTH])
    }

    #[test]
    fn test_gcm_roundtrip() {
        let k = key(0x11);
        let sealed = encrypt(&k, b"a share").unwrap();
        assert_eq!(decrypt(&k, &sealed).unwrap(), b"a share");
    }

    #[test]
    fn test_cbc_roundtrip_all_padding_lengths() {
        let k = key(0x22);
        for len in 0..=48 {
            let plain: Vec<u8> = (0..len as u8).collect();
            let sealed = encrypt_with(ShareCipher::Aes256CbcPkcs7, &k, &plain).unwrap();
            let raw = STANDARD.decode(&sealed).unwrap();
            assert_eq!((raw.len() - 16) % 16, 0);
            assert!(raw.len() - 16 > len);
            assert_eq!(
                decrypt_with(ShareCipher::Aes256CbcPkcs7, &k, &sealed).unwrap(),
                plain
            );
        }
    }

    #[test]
    fn test_cbc_known_answer() {
        // NIST SP 800-38A F.2.5, CBC-AES256.Encrypt, first two blocks.
        let k = ShareKey::from_bytes(
            hex::decode("603deb1015ca71be2b73aef0857d77811f352c073b6108d72d9810a30914dff4")
                .unwrap()
                .try_into()
                .unwrap(),
        );
        let iv: [u8; 16] = hex::decode("000102030405060708090a0b0c0d0e0f")
            .unwrap()
            .try_into()
            .unwrap();
        let plain =
            hex::decode("6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51").unwrap();
        let sealed = cbc_seal_with_iv(&k, iv, &plain).unwrap();
        assert_eq!(&sealed[..16], &iv);
        assert_eq!(
            hex::encode(&sealed[16..48]),
            "f58c4c04d6e5f1ba779eabfb5f7bfbd69cfc4e967edb808d679f777bc6702c7d"
        );
        // Aligned input gets a whole block of padding.
        assert_eq!(sealed.len(), 16 + 48);
        assert_eq!(cbc_open(&k, &sealed).unwrap(), plain);
    }

    #[test]
    fn test_cbc_rejects_invalid_final_padding() {
        use cbc::cipher::block_padding::NoPadding;

        let k = key(0x21);
        let iv = [0x5au8; AES_BLOCK_LENGTH];
        // A zero final byte is never valid PKCS#7.
        let body = Aes256CbcEnc::new_from_slices(&k.0[..], &iv)
            .unwrap()
            .encrypt_padded_vec_mut::<NoPadding>(&[0u8; 32]);
        let mut sealed = iv.to_vec();
        sealed.extend_from_slice(&body);
        assert!(matches!(cbc_open(&k, &sealed), Err(EncryptionError::BadPadding)));

        // Same blocks with a proper padding block appended open cleanly.
        let good = cbc_seal_with_iv(&k, iv, &[0u8; 32]).unwrap();
        assert_eq!(&good[..48], &sealed[..]);
        assert_eq!(cbc_open(&k, &good).unwrap(), vec![0u8; 32]);
    }

    #[test]
    fn test_str_helpers() {
        let k = key(0x33);
        let sealed = encrypt_str(&k, "5HueCGU8rMjxEXxiPuD5BDku4MkFqeZyd4dZ1jvhTVqvbTLvyTJ").unwrap();
        assert_eq!(
            decrypt_str(&k, &sealed).unwrap(),
            "5HueCGU8rMjxEXxiPuD5BDku4MkFqeZyd4dZ1jvhTVqvbTLvyTJ"
        );
    }

    #[test]
    fn test_fresh_iv_per_call() {
        let k = key(0x44);
        assert_ne!(encrypt(&k, b"same").unwrap(), encrypt(&k, b"same").unwrap());
        assert_ne!(
            encrypt_with(ShareCipher::Aes256CbcPkcs7, &k, b"same").unwrap(),
            encrypt_with(ShareCipher::Aes256CbcPkcs7, &k, b"same").unwrap()
        );
    }

    #[test]
    fn test_gcm_wrong_key_fails() {
        let sealed = encrypt(&key(1), b"secret").unwrap();
        assert!(matches!(
            decrypt(&key(2), &sealed),
            Err(EncryptionError::DecryptFailed)
        ));
    }

    #[test]
    fn test_cbc_wrong_key_does_not_return_plaintext() {
        let plain = b"a share that is long enough to span blocks";
        let sealed = encrypt_with(ShareCipher::Aes256CbcPkcs7, &key(1), plain).unwrap();
        match decrypt_with(ShareCipher::Aes256CbcPkcs7, &key(2), &sealed) {
            Ok(garbage) => assert_ne!(garbage, plain.to_vec()),
            Err(e) => assert!(matches!(e, EncryptionError::BadPadding)),
        }
    }

    #[test]
    fn test_gcm_tamper_detected() {
        let k = key(5);
        let sealed = encrypt(&k, b"tamper me").unwrap();
        let mut raw = STANDARD.decode(&sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert!(matches!(
            decrypt(&k, &STANDARD.encode(&raw)),
            Err(EncryptionError::DecryptFailed)
        ));
    }

    #[test]
    fn test_short_and_malformed_blobs() {
        let k = key(6);
        assert!(matches!(decrypt(&k, "!!!not base64"), Err(EncryptionError::InvalidBase64)));
        assert!(matches!(
            decrypt(&k, &STANDARD.encode([0u8; 10])),
            Err(EncryptionError::CiphertextTooShort { .. })
        ));
        assert!(matches!(
            decrypt_with(ShareCipher::Aes256CbcPkcs7, &k, &STANDARD.encode([0u8; 16])),
            Err(EncryptionError::CiphertextTooShort { .. })
        ));
        assert!(matches!(
            decrypt_with(ShareCipher::Aes256CbcPkcs7, &k, &STANDARD.encode([0u8; 40])),
            Err(EncryptionError::InvalidLength(24))
        ));
    }

    #[test]
    fn test_cross_suite_decrypt_fails() {
        let k = key(7);
        let sealed = encrypt_with(ShareCipher::Aes256CbcPkcs7, &k, &[9u8; 16]).unwrap();
        assert!(decrypt(&k, &sealed).is_err());
    }

    #[test]
    fn test_share_key_base64_roundtrip() {
        let k = key(0xab);
        let encoded = k.to_base64();
        assert_eq!(ShareKey::from_base64(&encoded).unwrap().as_bytes(), k.as_bytes());
        assert!(matches!(
            ShareKey::from_base64(&STANDARD.encode([1u8; 16])),
            Err(EncryptionError::InvalidKeyLength(16))
        ));
        assert_eq!(format!("{:?}", k), "ShareKey(<redacted>)");
    }

    #[test]
    fn test_cipher_names() {
        assert_eq!("aes256-gcm".parse::<ShareCipher>().unwrap(), ShareCipher::Aes256Gcm);
        assert_eq!("CBC".parse::<ShareCipher>().unwrap(), ShareCipher::Aes256CbcPkcs7);
        assert!("rot13".parse::<ShareCipher>().is_err());
        assert_eq!(
            serde_json::to_string(&ShareCipher::Aes256CbcPkcs7).unwrap(),
            "\"aes256-cbc-pkcs7\""
        );
    }
}
