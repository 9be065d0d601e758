// Copyright (c) 2026 UPCX Contributors. MIT License.
// See LICENSE for details.

//! # UPCX Custody: Core Library
//!
//! Non-custodial key custody for UPCX accounts. The user holds the only
//! usable copy of their secp256k1 key. When they lose the device, they get
//! the key back by proving who they are to an identity provider, not by
//! trusting anybody with the key itself.
//!
//! ## Architecture
//!
//! - **crypto**: hashes, Base58Check, keys and WIF, recoverable ECDSA, and
//!   the share ciphers. Nothing clever, nothing custom.
//! - **identity**: UPCX addresses, mnemonic seeds, identity claims, and
//!   Shamir secret sharing over GF(256).
//! - **custodian**: the async seams to the share custodian and the account
//!   registry, plus in-memory and filesystem implementations.
//! - **coordinator**: backup and recovery, end to end.
//! - **config**: constants and the coordinator's runtime knobs.
//! - **error**: one error type with a coarse kind callers can branch on.
//!
//! ## Ground Rules
//!
//! 1. Key material never crosses the custodian seam in the clear.
//! 2. Secrets are zeroized on drop and redacted in `Debug`.
//! 3. Every decode is checked: length, version, checksum, curve.
//! 4. A backup without an acknowledgement is not a backup.

pub mod config;
pub mod coordinator;
pub mod crypto;
pub mod custodian;
pub mod error;
pub mod identity;

pub use config::CoordinatorConfig;
pub use coordinator::{BackupReceipt, BackupState, RecoveryCoordinator, RecoveryState};
pub use crypto::{KeyPair, RecoverableSignature, ShareCipher, ShareKey};
pub use custodian::{
    AccountDetails, AccountRegistry, CustodianError, CustodianSession, EncryptedShare,
    FileCustodian, InMemoryCustodian, InMemoryRegistry, ShareCustodian, ShareDetails,
};
pub use error::{CustodyError, ErrorKind, Result};
pub use identity::{IdentityClaims, MnemonicSeed, ShamirConfig, Share, UpcxAddress};
