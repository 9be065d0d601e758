//! # Mnemonic Seeds
//!
//! BIP-39 phrases as the human-writable root of a UPCX key. A fresh account
//! gets a phrase, the phrase stretches (PBKDF2, 2048 rounds) into a 64-byte
//! seed, and the first 32 bytes of that seed feed
//! [`KeyPair::derive_from_seed`]:
//!
//! ```text
//! phrase --PBKDF2--> seed[64] --[0..32] as hex--> derive_from_seed(hex, index)
//! ```
//!
//! The phrase itself sits in a [`SecretString`] so it never shows up in a
//! `Debug` dump, and every seed buffer is wiped on drop.

use std::fmt;

use bip39::Mnemonic;
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::crypto::keys::{KeyError, KeyPair};

/// Errors from mnemonic handling.
#[derive(Debug, Error)]
pub enum MnemonicError {
    /// Word count is not one of 12, 15, 18, 21, 24.
    #[error("unsupported mnemonic length: {0} words")]
    InvalidWordCount(usize),

    /// Bad word, bad checksum, or otherwise not a BIP-39 phrase.
    #[error("invalid mnemonic phrase: {0}")]
    InvalidPhrase(String),

    /// The OS randomness source failed.
    #[error("randomness source unavailable: {0}")]
    RandomnessFailure(String),

    /// Deriving the keypair from the seed failed.
    #[error(transparent)]
    Key(#[from] KeyError),
}

/// A validated BIP-39 phrase.
pub struct MnemonicSeed {
    inner: Mnemonic,
    phrase: SecretString,
}

impl MnemonicSeed {
    /// Generate a new phrase with `word_count` words from OS randomness.
    pub fn generate(word_count: usize) -> Result<Self, MnemonicError> {
        if !(12..=24).contains(&word_count) || word_count % 3 != 0 {
            return Err(MnemonicError::InvalidWordCount(word_count));
        }
        // 11 bits per word, one checksum bit per 32 bits of entropy.
        let mut entropy = Zeroizing::new(vec![0u8; word_count * 4 / 3]);
        OsRng
            .try_fill_bytes(&mut entropy)
            .map_err(|e| MnemonicError::RandomnessFailure(e.to_string()))?;

        let inner = Mnemonic::from_entropy(&entropy)
            .map_err(|e| MnemonicError::InvalidPhrase(e.to_string()))?;
        let phrase = SecretString::new(inner.to_string());
        Ok(Self { inner, phrase })
    }

    /// Parse an existing phrase. Case and surrounding whitespace are ignored.
    pub fn from_phrase(phrase: &str) -> Result<Self, MnemonicError> {
        let normalized = Zeroizing::new(
            phrase
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase(),
        );
        let inner = Mnemonic::parse_normalized(&normalized)
            .map_err(|e| MnemonicError::InvalidPhrase(e.to_string()))?;
        Ok(Self {
            inner,
            phrase: SecretString::new((*normalized).clone()),
        })
    }

    /// The phrase. Show it to the user once, then forget it.
    pub fn phrase(&self) -> &str {
        self.phrase.expose_secret()
    }

    pub fn word_count(&self) -> usize {
        self.inner.word_count()
    }

    /// The 64-byte BIP-39 seed for `passphrase` (empty string for none).
    pub fn seed(&self, passphrase: &str) -> Zeroizing<[u8; 64]> {
        Zeroizing::new(self.inner.to_seed_normalized(passphrase))
    }

    /// Derive the account keypair at `index`.
    pub fn derive_keypair(&self, passphrase: &str, index: u32) -> Result<KeyPair, MnemonicError> {
        let seed = self.seed(passphrase);
        let seed_hex = Zeroizing::new(hex::encode(&seed[..32]));
        Ok(KeyPair::derive_from_seed(&seed_hex, index)?)
    }
}

impl fmt::Debug for MnemonicSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MnemonicSeed({} words, <redacted>)", self.word_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon \
                           abandon abandon abandon abandon abandon about";

    #[test]
    fn test_generate_word_counts() {
        for words in [12, 15, 18, 21, 24] {
            let m = MnemonicSeed::generate(words).unwrap();
            assert_eq!(m.word_count(), words);
            assert_eq!(m.phrase().split(' ').count(), words);
        }
    }

    #[test]
    fn test_generate_rejects_bad_counts() {
        for words in [0, 11, 13, 25, 27] {
            assert!(matches!(
                MnemonicSeed::generate(words),
                Err(MnemonicError::InvalidWordCount(_))
            ));
        }
    }

    #[test]
    fn test_generated_phrase_reparses() {
        let m = MnemonicSeed::generate(24).unwrap();
        let again = MnemonicSeed::from_phrase(m.phrase()).unwrap();
        assert_eq!(*m.seed(""), *again.seed(""));
    }

    #[test]
    fn test_known_seed_vector() {
        // BIP-39 reference vector with passphrase "TREZOR".
        let m = MnemonicSeed::from_phrase(ABANDON).unwrap();
        assert_eq!(
            hex::encode(&m.seed("TREZOR")[..]),
            "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e53495531f09a6987599d18264c1e1c92f2cf141630c7a3c4ab7c81b2f001698e7463b04"
        );
    }

    #[test]
    fn test_derive_keypair_uses_first_half_of_seed() {
        let m = MnemonicSeed::from_phrase(ABANDON).unwrap();
        let kp = m.derive_keypair("TREZOR", 0).unwrap();
        let direct = KeyPair::derive_from_seed(
            "c55257c360c07c72029aebc1b53c05ed0362ada38ead3e3e9efa3708e5349553",
            0,
        )
        .unwrap();
        assert_eq!(kp, direct);
        assert_ne!(m.derive_keypair("TREZOR", 1).unwrap(), kp);
    }

    #[test]
    fn test_passphrase_changes_key() {
        let m = MnemonicSeed::from_phrase(ABANDON).unwrap();
        assert_ne!(
            m.derive_keypair("", 0).unwrap(),
            m.derive_keypair("hunter2", 0).unwrap()
        );
    }

    #[test]
    fn test_phrase_normalization() {
        let shouty = format!("  {}  ", ABANDON.to_uppercase().replace(' ', "   "));
        let m = MnemonicSeed::from_phrase(&shouty).unwrap();
        assert_eq!(m.phrase(), MnemonicSeed::from_phrase(ABANDON).unwrap().phrase());
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let bad = ABANDON.replace("about", "abandon");
        assert!(matches!(
            MnemonicSeed::from_phrase(&bad),
            Err(MnemonicError::InvalidPhrase(_))
        ));
    }

    #[test]
    fn test_debug_redacts_phrase() {
        let m = MnemonicSeed::from_phrase(ABANDON).unwrap();
        let debug = format!("{:?}", m);
        assert!(!debug.contains("abandon"));
        assert!(debug.contains("12 words"));
    }
}
