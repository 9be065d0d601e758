//! # Custody Configuration & Constants
//!
//! Every magic number in the custody engine lives here, next to the small
//! runtime configuration struct the coordinator is built from.
//!
//! The encoding constants are not ours to change: WIF strings and UPCX
//! addresses already exist in the wild, and shares already sit in custodian
//! pools. Bump any of them and yesterday's backups stop opening.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::crypto::encryption::ShareCipher;
use crate::identity::recovery::{ShamirConfig, ShamirError};

// ---------------------------------------------------------------------------
// Key Material
// ---------------------------------------------------------------------------

/// secp256k1 private key length in bytes.
pub const PRIVATE_KEY_LENGTH: usize = 32;

/// Compressed SEC1 public key length: one parity byte plus the x-coordinate.
pub const PUBLIC_KEY_LENGTH: usize = 33;

/// Minimum seed length accepted by seed derivation. Anything shorter and
/// `seed + index` lands in a keyspace small enough to enumerate.
pub const MIN_SEED_LENGTH: usize = 32;

/// Default BIP-39 phrase length for freshly generated mnemonics.
pub const DEFAULT_MNEMONIC_WORDS: usize = 24;

// ---------------------------------------------------------------------------
// Encodings
// ---------------------------------------------------------------------------

/// WIF version byte. Same as Bitcoin mainnet, on purpose.
pub const WIF_VERSION: u8 = 0x80;

/// Length of every checksum we append, WIF and address alike.
pub const CHECKSUM_LENGTH: usize = 4;

/// Textual prefix of a UPCX public-key address.
pub const ADDRESS_PREFIX: &str = "UPCX";

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// Recoverable signature length: header byte plus compact `r || s`.
pub const SIGNATURE_LENGTH: usize = 65;

/// Header offset for recoverable signatures: 27, plus 4 to flag a
/// compressed public key. The recovery id (0..=3) is added on top.
pub const SIGNATURE_HEADER_BASE: u8 = 27 + 4;

// ---------------------------------------------------------------------------
// Share Encryption
// ---------------------------------------------------------------------------

/// AES-256 key length in bytes. SHA-256 output, conveniently.
pub const AES_KEY_LENGTH: usize = 32;

/// AES block length; also the IV length of the CBC suite.
pub const AES_BLOCK_LENGTH: usize = 16;

/// AES-GCM nonce length. Twelve bytes, like everyone else.
pub const AES_GCM_NONCE_LENGTH: usize = 12;

/// AES-GCM authentication tag length.
pub const AES_GCM_TAG_LENGTH: usize = 16;

// ---------------------------------------------------------------------------
// Threshold Shares
// ---------------------------------------------------------------------------

/// Version byte at the front of every serialized share.
pub const SHARE_FORMAT_VERSION: u8 = 0x01;

/// Random identifier tying shares to the split that produced them.
pub const SPLIT_ID_LENGTH: usize = 8;

/// Length of the secret digest appended before splitting.
pub const SECRET_DIGEST_LENGTH: usize = 4;

/// Share indices are non-zero elements of GF(256).
pub const MAX_SHARES: u8 = 255;

/// Default recovery threshold.
pub const DEFAULT_THRESHOLD: u8 = 2;

/// Default number of shares handed to the custodian. 2-of-3 tolerates one
/// lost or corrupted share without giving any single blob the whole key.
pub const DEFAULT_TOTAL_SHARES: u8 = 3;

// ---------------------------------------------------------------------------
// Custodian
// ---------------------------------------------------------------------------

/// How long a single custodian call may take before the coordinator gives up.
pub const DEFAULT_CUSTODIAN_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Runtime knobs for the recovery coordinator.
///
/// Deserializable from JSON with every field optional:
///
/// ```
/// use upcx_custody::config::CoordinatorConfig;
///
/// let cfg: CoordinatorConfig = serde_json::from_str(r#"{ "threshold": 3, "total_shares": 5 }"#).unwrap();
/// assert_eq!(cfg.policy().unwrap().total_shares, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Minimum number of shares needed to recover.
    pub threshold: u8,
    /// Number of shares produced at backup time.
    pub total_shares: u8,
    /// Cipher suite used to seal each share.
    pub cipher: ShareCipher,
    /// Timeout applied to each custodian call, in seconds.
    pub custodian_timeout_secs: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            total_shares: DEFAULT_TOTAL_SHARES,
            cipher: ShareCipher::default(),
            custodian_timeout_secs: DEFAULT_CUSTODIAN_TIMEOUT.as_secs(),
        }
    }
}

impl CoordinatorConfig {
    /// Validate and return the sharing policy.
    pub fn policy(&self) -> Result<ShamirConfig, ShamirError> {
        ShamirConfig::new(self.threshold, self.total_shares)
    }

    /// Custodian call timeout as a [`Duration`].
    pub fn custodian_timeout(&self) -> Duration {
        Duration::from_secs(self.custodian_timeout_secs)
    }
}
