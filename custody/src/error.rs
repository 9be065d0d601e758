//! # Custody Errors
//!
//! Each module keeps its own `thiserror` enum. [`CustodyError`] is what the
//! coordinator hands back: it wraps them all and sorts every failure into
//! one of a handful of [`ErrorKind`]s a caller can actually act on.

use std::time::Duration;

use thiserror::Error;

use crate::crypto::base58::CodecError;
use crate::crypto::encryption::EncryptionError;
use crate::crypto::keys::KeyError;
use crate::crypto::signatures::SignatureError;
use crate::custodian::CustodianError;
use crate::identity::address::AddressError;
use crate::identity::mnemonic::MnemonicError;
use crate::identity::recovery::ShamirError;

/// What went wrong, coarsely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input: bad hex, bad Base58, wrong length, bad policy.
    InvalidInput,
    /// A checksum did not match.
    ChecksumMismatch,
    /// The OS randomness source failed.
    RandomnessFailure,
    /// A scalar outside `[1, n)`.
    OutOfRangeKey,
    /// Not enough shares to recover.
    InsufficientShares,
    /// Shares that do not belong together, or fail their integrity checks.
    ShareMismatch,
    /// Encryption, decryption or signing failed.
    CryptoFailure,
    /// The custodian or registry failed, declined, or timed out.
    Custodian,
}

impl ErrorKind {
    /// Whether retrying the same call is pointless.
    ///
    /// Only a broken randomness source qualifies. Everything else either
    /// depends on the input or on a remote service that may come back.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorKind::RandomnessFailure)
    }
}

/// Top-level error for the custody engine.
#[derive(Debug, Error)]
pub enum CustodyError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Mnemonic(#[from] MnemonicError),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Shamir(#[from] ShamirError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error(transparent)]
    Custodian(#[from] CustodianError),

    /// The custodian answered but did not acknowledge the store.
    #[error("custodian did not acknowledge the upload")]
    NotAcknowledged,

    /// A custodian call ran past its deadline.
    #[error("custodian call timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid coordinator configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CustodyError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CustodyError::Codec(e) => codec_kind(e),
            CustodyError::Key(e) => match e {
                KeyError::InvalidInput(_) => ErrorKind::InvalidInput,
                KeyError::OutOfRangeKey => ErrorKind::OutOfRangeKey,
                KeyError::RandomnessFailure(_) => ErrorKind::RandomnessFailure,
                KeyError::Wif(c) => codec_kind(c),
            },
            CustodyError::Address(e) => match e {
                AddressError::ChecksumMismatch => ErrorKind::ChecksumMismatch,
                _ => ErrorKind::InvalidInput,
            },
            CustodyError::Mnemonic(e) => match e {
                MnemonicError::RandomnessFailure(_) => ErrorKind::RandomnessFailure,
                MnemonicError::Key(KeyError::OutOfRangeKey) => ErrorKind::OutOfRangeKey,
                _ => ErrorKind::InvalidInput,
            },
            CustodyError::Signature(e) => match e {
                SignatureError::OutOfRangeKey => ErrorKind::OutOfRangeKey,
                SignatureError::InvalidSignature(_) => ErrorKind::InvalidInput,
                SignatureError::RecoveryFailed => ErrorKind::CryptoFailure,
            },
            CustodyError::Shamir(e) => match e {
                ShamirError::InvalidThreshold { .. }
                | ShamirError::EmptySecret
                | ShamirError::Malformed(_) => ErrorKind::InvalidInput,
                ShamirError::NoShares | ShamirError::InsufficientShares { .. } => {
                    ErrorKind::InsufficientShares
                }
                ShamirError::ShareMismatch(_) | ShamirError::CorruptShare(_) => {
                    ErrorKind::ShareMismatch
                }
                ShamirError::RandomnessFailure(_) => ErrorKind::RandomnessFailure,
            },
            CustodyError::Encryption(e) => match e {
                EncryptionError::RandomnessFailure(_) => ErrorKind::RandomnessFailure,
                EncryptionError::UnknownCipher(_) | EncryptionError::InvalidKeyLength(_) => {
                    ErrorKind::InvalidInput
                }
                _ => ErrorKind::CryptoFailure,
            },
            CustodyError::Custodian(_) | CustodyError::NotAcknowledged | CustodyError::Timeout(_) => {
                ErrorKind::Custodian
            }
            CustodyError::Config(_) => ErrorKind::InvalidInput,
        }
    }
}

fn codec_kind(e: &CodecError) -> ErrorKind {
    match e {
        CodecError::ChecksumMismatch => ErrorKind::ChecksumMismatch,
        _ => ErrorKind::InvalidInput,
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CustodyError>;
