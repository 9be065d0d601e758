//! # Hashing Utilities
//!
//! The three digests the custody engine needs, and nothing more:
//!
//! - **SHA-256**: identity-bound share keys and the share integrity digest.
//! - **Double SHA-256**: the Base58Check checksum behind WIF strings and
//!   the per-share wire checksum.
//! - **RIPEMD-160**: the UPCX address checksum. Yes, a *different* checksum
//!   scheme from WIF. The address format predates us and we don't get a vote.
//!
//! Every function returns a fixed-size array; callers slice what they need.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use upcx_custody::crypto::sha256;
///
/// let hash = sha256(b"UPCX");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the double-SHA-256 hash: `SHA-256(SHA-256(data))`.
///
/// This is the Bitcoin-lineage checksum construction. We only ever use the
/// first four bytes of it, but computing the whole thing is the only way
/// to get there.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute the RIPEMD-160 hash of the input data.
///
/// Note this is raw RIPEMD-160, not Hash160 (`RIPEMD160(SHA256(x))`). The
/// UPCX address checksum is computed directly over the public key bytes.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    let mut hasher = Ripemd160::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // NIST test vector for "abc".
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha256_empty_input() {
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn double_sha256_is_sha256_twice() {
        let data = b"double trouble";
        assert_eq!(double_sha256(data), sha256(&sha256(data)));
        assert_ne!(double_sha256(data), sha256(data));
    }

    #[test]
    fn ripemd160_known_vectors() {
        assert_eq!(
            hex::encode(ripemd160(b"")),
            "9c1185a5c5e9fc54612808977ee8f548b2258d31"
        );
        assert_eq!(
            hex::encode(ripemd160(b"abc")),
            "8eb208f7e05d987a9b044a8e98c6b087f15a0bfc"
        );
    }

    #[test]
    fn hashes_are_deterministic() {
        let data = b"same input, same output";
        assert_eq!(sha256(data), sha256(data));
        assert_eq!(ripemd160(data), ripemd160(data));
    }
}
