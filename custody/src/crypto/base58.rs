//! # Base58 and Base58Check
//!
//! Binary-to-text encoding for everything a human might have to copy:
//! WIF private keys, UPCX addresses, and anything else that should survive
//! a trip through a chat window.
//!
//! Base58 uses the Bitcoin alphabet, which drops `0`, `O`, `I` and `l` so a
//! tired user can't confuse them. The input is treated as one big-endian
//! integer; each leading zero byte becomes exactly one leading `'1'`, which
//! is how a length-preserving round trip survives the integer conversion.
//!
//! Base58Check prefixes a version byte and appends a 4-byte checksum:
//!
//! ```text
//! base58( version || payload || double_sha256(version || payload)[0..4] )
//! ```
//!
//! Decoding failures are reported as typed values. A bad character is
//! `None` from [`decode`]; the checked decoder returns a [`CodecError`]
//! saying exactly which check tripped.

use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use super::hash::double_sha256;
use crate::config::CHECKSUM_LENGTH;

/// Errors produced by the checked Base58 decoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A character outside the Base58 alphabet was found.
    #[error("invalid base58 string")]
    InvalidBase58,

    /// The decoded data is shorter than `version + payload + checksum`.
    #[error("decoded data too short: expected at least {expected} bytes, got {got}")]
    TooShort {
        /// Minimum length required.
        expected: usize,
        /// Actual decoded length.
        got: usize,
    },

    /// The leading version byte did not match what the caller asked for.
    #[error("version byte mismatch: expected 0x{expected:02x}, got 0x{got:02x}")]
    VersionMismatch {
        /// The version the caller expected.
        expected: u8,
        /// The version found in the data.
        got: u8,
    },

    /// The trailing checksum does not match the recomputed one.
    #[error("checksum mismatch")]
    ChecksumMismatch,
}

/// Encode bytes as Base58 (Bitcoin alphabet).
///
/// ```
/// use upcx_custody::crypto::base58;
///
/// assert_eq!(base58::encode(&[0, 0, 1]), "112");
/// ```
pub fn encode(data: &[u8]) -> String {
    bs58::encode(data)
        .with_alphabet(bs58::Alphabet::BITCOIN)
        .into_string()
}

/// Decode a Base58 string. Returns `None` on any non-alphabet character.
pub fn decode(s: &str) -> Option<Vec<u8>> {
    bs58::decode(s)
        .with_alphabet(bs58::Alphabet::BITCOIN)
        .into_vec()
        .ok()
}

/// The Base58Check checksum: first four bytes of double SHA-256.
pub fn checksum(data: &[u8]) -> [u8; CHECKSUM_LENGTH] {
    let digest = double_sha256(data);
    let mut out = [0u8; CHECKSUM_LENGTH];
    out.copy_from_slice(&digest[..CHECKSUM_LENGTH]);
    out
}

/// Encode `version || payload || checksum` as Base58.
pub fn encode_checked(version: u8, payload: &[u8]) -> String {
    let mut buf = Vec::with_capacity(1 + payload.len() + CHECKSUM_LENGTH);
    buf.push(version);
    buf.extend_from_slice(payload);
    let check = checksum(&buf);
    buf.extend_from_slice(&check);
    let encoded = encode(&buf);
    buf.zeroize();
    encoded
}

/// Decode a Base58Check string carrying a fixed-length payload.
///
/// Verification order: alphabet, minimum length, version byte, checksum.
/// Bytes beyond `1 + payload_len + 4` are ignored.
pub fn decode_checked(
    s: &str,
    expected_version: u8,
    payload_len: usize,
) -> Result<Vec<u8>, CodecError> {
    let decoded = Zeroizing::new(decode(s).ok_or(CodecError::InvalidBase58)?);

    let body_len = 1 + payload_len;
    let min_len = body_len + CHECKSUM_LENGTH;
    if decoded.len() < min_len {
        return Err(CodecError::TooShort {
            expected: min_len,
            got: decoded.len(),
        });
    }

    if decoded[0] != expected_version {
        return Err(CodecError::VersionMismatch {
            expected: expected_version,
            got: decoded[0],
        });
    }

    let expected = checksum(&decoded[..body_len]);
    if decoded[body_len..min_len] != expected {
        return Err(CodecError::ChecksumMismatch);
    }

    Ok(decoded[1..body_len].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_known_vectors() {
        // From Bitcoin Core's base58_encode_decode.json.
        assert_eq!(encode(b""), "");
        assert_eq!(encode(&hex::decode("61").unwrap()), "2g");
        assert_eq!(encode(&hex::decode("626262").unwrap()), "a3gV");
        assert_eq!(encode(&hex::decode("636363").unwrap()), "aPEr");
        assert_eq!(encode(&hex::decode("00000000287fb4cd").unwrap()), "1111233QC4");
        assert_eq!(encode(b"Hello World!"), "2NEpo7TZRRrLZSi2U");
    }

    #[test]
    fn leading_zero_bytes_map_to_ones() {
        assert_eq!(encode(&[0]), "1");
        assert_eq!(encode(&[0, 0, 0]), "111");
        assert_eq!(decode("111").unwrap(), vec![0, 0, 0]);
    }

    #[test]
    fn roundtrip_with_leading_zeros() {
        let inputs: Vec<Vec<u8>> = vec![
            vec![],
            vec![0],
            vec![0, 0, 0xff],
            vec![0, 1, 2, 3, 4, 5],
            (0..=255u8).collect(),
            vec![0xff; 64],
        ];
        for input in inputs {
            assert_eq!(decode(&encode(&input)).unwrap(), input);
        }
    }

    #[test]
    fn decode_rejects_ambiguous_characters() {
        for bad in ["0", "O", "I", "l", "abc0", "hello world", "+"] {
            assert!(decode(bad).is_none(), "{bad} should not decode");
        }
    }

    #[test]
    fn checked_roundtrip() {
        let payload = [7u8; 32];
        let s = encode_checked(0x80, &payload);
        assert_eq!(decode_checked(&s, 0x80, 32).unwrap(), payload.to_vec());
    }

    #[test]
    fn checked_rejects_wrong_version() {
        let s = encode_checked(0x80, &[1u8; 32]);
        assert_eq!(
            decode_checked(&s, 0xef, 32),
            Err(CodecError::VersionMismatch {
                expected: 0xef,
                got: 0x80
            })
        );
    }

    #[test]
    fn checked_rejects_short_input() {
        let s = encode_checked(0x80, &[1u8; 16]);
        assert!(matches!(
            decode_checked(&s, 0x80, 32),
            Err(CodecError::TooShort { expected: 37, got: 21 })
        ));
    }

    #[test]
    fn checked_rejects_any_checksum_byte_flip() {
        let payload = [0x42u8; 32];
        let mut raw = vec![0x80];
        raw.extend_from_slice(&payload);
        raw.extend_from_slice(&checksum(&raw));

        for i in 33..37 {
            let mut tampered = raw.clone();
            tampered[i] ^= 0x01;
            let s = encode(&tampered);
            assert_eq!(
                decode_checked(&s, 0x80, 32),
                Err(CodecError::ChecksumMismatch),
                "flip at byte {i} went unnoticed"
            );
        }
    }

    #[test]
    fn checked_rejects_payload_flip() {
        let mut raw = vec![0x80];
        raw.extend_from_slice(&[9u8; 32]);
        raw.extend_from_slice(&checksum(&raw));
        raw[10] ^= 0x80;
        assert_eq!(
            decode_checked(&encode(&raw), 0x80, 32),
            Err(CodecError::ChecksumMismatch)
        );
    }

    #[test]
    fn checked_rejects_garbage() {
        assert_eq!(decode_checked("0OIl", 0x80, 32), Err(CodecError::InvalidBase58));
    }
}
