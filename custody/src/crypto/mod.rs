//! # Cryptographic Primitives for UPCX Custody
//!
//! Everything below the recovery protocol: digests, checksummed text
//! encodings, secp256k1 keys, recoverable signatures, and the ciphers that
//! seal shares before they leave the device.
//!
//! - **secp256k1** via `k256` for keys and ECDSA. The chain decides the
//!   curve, not us.
//! - **SHA-256 / RIPEMD-160** for checksums and key derivation.
//! - **AES-256** for share encryption, GCM for new backups and CBC for the
//!   blobs older clients already left with custodians.
//!
//! None of it is hand-rolled except the CBC chaining loop around the audited
//! `aes` block cipher, and that one is pinned to the NIST test vectors.

pub mod base58;
pub mod encryption;
pub mod hash;
pub mod keys;
pub mod signatures;

pub use encryption::{decrypt, encrypt, ShareCipher, ShareKey};
pub use hash::{double_sha256, ripemd160, sha256};
pub use keys::KeyPair;
pub use signatures::{recover_public_key, sign, verify, RecoverableSignature};
