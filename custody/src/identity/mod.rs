//! # Identity Module
//!
//! Who owns a key, and how they get it back. The layers:
//!
//! 1. **Address**: `UPCX` + Base58 of the compressed public key with a
//!    RIPEMD-160 checksum. What users see and paste.
//! 2. **Mnemonic**: BIP-39 phrase as the human-writable root of a key.
//! 3. **Claims**: the identity provider's view of the user, from which the
//!    share encryption key is derived.
//! 4. **Recovery**: Shamir's Secret Sharing over GF(256) with enough
//!    metadata on each share to refuse a wrong reconstruction.

pub mod address;
pub mod claims;
pub mod mnemonic;
pub mod recovery;

pub use address::{AddressError, UpcxAddress};
pub use claims::IdentityClaims;
pub use mnemonic::{MnemonicError, MnemonicSeed};
pub use recovery::{recover_secret, split_secret, ShamirConfig, ShamirError, Share};
