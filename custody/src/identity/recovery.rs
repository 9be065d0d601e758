//! # Social Recovery via Shamir's Secret Sharing
//!
//! Implements Shamir's Secret Sharing Scheme (SSSS) over GF(256) for
//! splitting a serialized private key into `n` shares with a reconstruction
//! threshold of `t`. Any `t` shares recover the original secret; fewer than
//! `t` shares reveal zero information about it.
//!
//! ## Finite Field Arithmetic
//!
//! All operations are performed in GF(2^8) with the irreducible polynomial
//! `x^8 + x^4 + x^3 + x + 1` (0x11B), the same field used by AES.
//! Multiplication uses log/exp tables. The generator element is 3 (0x03),
//! which generates the full multiplicative group of order 255.
//!
//! ## Failing closed
//!
//! Plain Shamir has a nasty property: hand it `t - 1` shares, or one share
//! from a different split, and it cheerfully interpolates garbage. For a key
//! custody system "here is a plausible but wrong private key" is the worst
//! possible answer. So every share carries enough metadata to refuse:
//!
//! ```text
//! version(0x01) || split_id(8) || threshold || total || index || data || checksum(4)
//! ```
//!
//! - `split_id` is random per split. Shares from different splits never mix.
//! - `threshold` is recorded, so too few shares is an error, not garbage.
//! - `checksum` is `double_sha256` of everything before it, checked on parse.
//! - `data` is the split of `secret || SHA256(secret)[0..4]`, so the result
//!   of interpolation is verified before it is returned. The digest is
//!   itself shared and reveals nothing below the threshold.
//!
//! The textual form is lowercase hex of the bytes above.
//!
//! ## Usage
//!
//! ```
//! use upcx_custody::identity::recovery::{split_secret, recover_secret, ShamirConfig};
//!
//! let secret = b"5HueCGU8rMjxEXxiPuD5BDku4MkFqeZyd4dZ1jvhTVqvbTLvyTJ";
//! let config = ShamirConfig::new(2, 3).unwrap();
//! let shares = split_secret(secret, &config).unwrap();
//!
//! // Any 2 of the 3 shares recover the secret
//! let recovered = recover_secret(&shares[1..]).unwrap();
//! assert_eq!(secret.as_slice(), recovered.as_slice());
//!
//! // One share alone is refused
//! assert!(recover_secret(&shares[..1]).is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use crate::config::{
    CHECKSUM_LENGTH, MAX_SHARES, SECRET_DIGEST_LENGTH, SHARE_FORMAT_VERSION, SPLIT_ID_LENGTH,
};
use crate::crypto::base58::checksum;
use crate::crypto::hash::sha256;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during secret sharing operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShamirError {
    /// The policy violates `1 <= threshold <= total <= 255`.
    #[error("invalid sharing policy: threshold {threshold} of {total}")]
    InvalidThreshold {
        /// The configured threshold.
        threshold: u8,
        /// The configured total.
        total: u8,
    },

    /// The secret is empty. Nothing to split.
    #[error("secret must not be empty")]
    EmptySecret,

    /// No shares were supplied at all.
    #[error("no shares supplied")]
    NoShares,

    /// Fewer distinct shares than the recorded threshold.
    #[error("insufficient shares: have {have}, need {need}")]
    InsufficientShares {
        /// Number of distinct shares supplied.
        have: usize,
        /// Threshold recorded in the shares.
        need: usize,
    },

    /// Shares come from different splits or disagree on their parameters.
    #[error("shares do not belong together: {0}")]
    ShareMismatch(String),

    /// A share is internally inconsistent, or the reconstructed secret
    /// failed its digest check.
    #[error("corrupt share: {0}")]
    CorruptShare(String),

    /// The OS randomness source failed.
    #[error("randomness source unavailable: {0}")]
    RandomnessFailure(String),

    /// The share text is not a well-formed share.
    #[error("malformed share: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// GF(256) Arithmetic
// ---------------------------------------------------------------------------

/// GF(256) with irreducible polynomial x^8 + x^4 + x^3 + x + 1 (0x11B).
mod gf256 {
    /// Irreducible polynomial: x^8 + x^4 + x^3 + x + 1.
    const MODULUS: u16 = 0x11B;

    /// EXP[i] = 3^i. Length 512 so a sum of two logs never needs reducing.
    const fn build_exp_table() -> [u8; 512] {
        let mut table = [0u8; 512];
        let mut val: u16 = 1;
        let mut i = 0;
        while i < 255 {
            table[i] = val as u8;
            table[i + 255] = val as u8;
            // val * 3 = val * 2 + val
            val = (val << 1) ^ val;
            if val >= 256 {
                val ^= MODULUS;
            }
            i += 1;
        }
        table[510] = table[0];
        table[511] = table[1];
        table
    }

    /// LOG[EXP[i]] = i.
    const fn build_log_table() -> [u8; 256] {
        let exp = build_exp_table();
        let mut table = [0u8; 256];
        let mut i = 0;
        while i < 255 {
            table[exp[i] as usize] = i as u8;
            i += 1;
        }
        table
    }

    static EXP: [u8; 512] = build_exp_table();
    static LOG: [u8; 256] = build_log_table();

    /// Addition is XOR. So is subtraction.
    #[inline]
    pub fn add(a: u8, b: u8) -> u8 {
        a ^ b
    }

    #[inline]
    pub fn mul(a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        EXP[LOG[a as usize] as usize + LOG[b as usize] as usize]
    }

    /// `a / b`. Callers guarantee `b != 0`; share indices are validated
    /// non-zero and distinct before interpolation.
    #[inline]
    pub fn div(a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        EXP[255 + LOG[a as usize] as usize - LOG[b as usize] as usize]
    }

    /// Horner evaluation; `coefficients[0]` is the constant term.
    pub fn eval_polynomial(coefficients: &[u8], x: u8) -> u8 {
        let mut result = 0u8;
        for &coeff in coefficients.iter().rev() {
            result = add(mul(result, x), coeff);
        }
        result
    }

    /// Lagrange interpolation at x = 0.
    pub fn lagrange_interpolate_at_zero(xs: &[u8], ys: &[u8]) -> u8 {
        let mut secret = 0u8;
        for (i, (&xi, &yi)) in xs.iter().zip(ys).enumerate() {
            let mut numerator = 1u8;
            let mut denominator = 1u8;
            for (j, &xj) in xs.iter().enumerate() {
                if i == j {
                    continue;
                }
                // (0 - x_j) = x_j in characteristic 2
                numerator = mul(numerator, xj);
                denominator = mul(denominator, add(xi, xj));
            }
            secret = add(secret, mul(yi, div(numerator, denominator)));
        }
        secret
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn add_is_xor() {
            assert_eq!(add(0xFF, 0xFF), 0);
            assert_eq!(add(0xAB, 0x00), 0xAB);
        }

        #[test]
        fn mul_identity_and_zero() {
            for i in 0..=255u8 {
                assert_eq!(mul(i, 1), i);
                assert_eq!(mul(i, 0), 0);
            }
        }

        #[test]
        fn mul_matches_aes_field() {
            // FIPS-197 section 4.2: {57} x {83} = {c1}
            assert_eq!(mul(0x57, 0x83), 0xc1);
            assert_eq!(mul(0x57, 0x13), 0xfe);
        }

        #[test]
        fn mul_div_inverse() {
            for a in 1..=255u8 {
                for b in 1..=255u8 {
                    assert_eq!(div(mul(a, b), b), a);
                }
            }
        }

        #[test]
        fn polynomial_eval_constant() {
            assert_eq!(eval_polynomial(&[42], 1), 42);
            assert_eq!(eval_polynomial(&[42], 100), 42);
        }

        #[test]
        fn lagrange_recovers_constant() {
            assert_eq!(lagrange_interpolate_at_zero(&[1, 2, 3], &[42, 42, 42]), 42);
        }

        #[test]
        fn lagrange_recovers_line() {
            // f(x) = 7 + 5x
            let coeffs = [7u8, 5];
            let xs = [3u8, 9];
            let ys = [eval_polynomial(&coeffs, 3), eval_polynomial(&coeffs, 9)];
            assert_eq!(lagrange_interpolate_at_zero(&xs, &ys), 7);
        }
    }
}

// ---------------------------------------------------------------------------
// Public Types
// ---------------------------------------------------------------------------

/// A `(threshold, total_shares)` sharing policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShamirConfig {
    /// Minimum number of shares required to reconstruct the secret.
    pub threshold: u8,
    /// Total number of shares to generate.
    pub total_shares: u8,
}

impl ShamirConfig {
    /// Validate `1 <= threshold <= total_shares <= 255`.
    ///
    /// A threshold of 1 is allowed and means every share is the whole
    /// secret. Useful for a single-custodian pool; dangerous anywhere else.
    pub fn new(threshold: u8, total_shares: u8) -> Result<Self, ShamirError> {
        if threshold == 0 || total_shares < threshold || total_shares > MAX_SHARES {
            return Err(ShamirError::InvalidThreshold {
                threshold,
                total: total_shares,
            });
        }
        Ok(Self {
            threshold,
            total_shares,
        })
    }
}

/// One share of a split secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Share {
    /// Random identifier shared by every share of one split.
    pub split_id: [u8; SPLIT_ID_LENGTH],
    /// Threshold the split was made with.
    pub threshold: u8,
    /// Number of shares the split produced.
    pub total: u8,
    /// The x-coordinate of this share's evaluation point (1-based).
    pub index: u8,
    /// One byte per byte of `secret || digest`.
    pub data: Vec<u8>,
}

impl Share {
    const HEADER_LENGTH: usize = 1 + SPLIT_ID_LENGTH + 3;

    /// Binary wire form, checksum included.
    pub fn to_bytes(&self) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(
            Self::HEADER_LENGTH + self.data.len() + CHECKSUM_LENGTH,
        ));
        out.push(SHARE_FORMAT_VERSION);
        out.extend_from_slice(&self.split_id);
        out.push(self.threshold);
        out.push(self.total);
        out.push(self.index);
        out.extend_from_slice(&self.data);
        let check = checksum(&out);
        out.extend_from_slice(&check);
        out
    }

    /// Parse the binary wire form, verifying version, checksum and the
    /// share's own parameters.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ShamirError> {
        let min = Self::HEADER_LENGTH + SECRET_DIGEST_LENGTH + 1 + CHECKSUM_LENGTH;
        if bytes.len() < min {
            return Err(ShamirError::Malformed(format!(
                "expected at least {min} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[0] != SHARE_FORMAT_VERSION {
            return Err(ShamirError::Malformed(format!(
                "unsupported share format version 0x{:02x}",
                bytes[0]
            )));
        }

        let (body, check) = bytes.split_at(bytes.len() - CHECKSUM_LENGTH);
        if checksum(body)[..] != *check {
            return Err(ShamirError::CorruptShare("checksum mismatch".to_string()));
        }

        let mut split_id = [0u8; SPLIT_ID_LENGTH];
        split_id.copy_from_slice(&body[1..1 + SPLIT_ID_LENGTH]);
        let threshold = body[1 + SPLIT_ID_LENGTH];
        let total = body[2 + SPLIT_ID_LENGTH];
        let index = body[3 + SPLIT_ID_LENGTH];

        if threshold == 0 || total < threshold {
            return Err(ShamirError::Malformed(format!(
                "invalid policy {threshold} of {total}"
            )));
        }
        if index == 0 || index > total {
            return Err(ShamirError::Malformed(format!(
                "index {index} outside 1..={total}"
            )));
        }

        Ok(Self {
            split_id,
            threshold,
            total,
            index,
            data: body[Self::HEADER_LENGTH..].to_vec(),
        })
    }

    /// The split id as hex. Safe to log.
    pub fn split_id_hex(&self) -> String {
        hex::encode(self.split_id)
    }
}

impl Drop for Share {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // With threshold 1 the data *is* the secret, so it never prints.
        write!(
            f,
            "Share(split={}, {}/{} of {}, {} bytes)",
            self.split_id_hex(),
            self.index,
            self.threshold,
            self.total,
            self.data.len()
        )
    }
}

impl fmt::Display for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let encoded = Zeroizing::new(hex::encode(&*self.to_bytes()));
        f.write_str(&encoded)
    }
}

impl FromStr for Share {
    type Err = ShamirError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = Zeroizing::new(
            hex::decode(s.trim()).map_err(|e| ShamirError::Malformed(format!("hex: {e}")))?,
        );
        Self::from_bytes(&bytes)
    }
}

impl Serialize for Share {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Share {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = Zeroizing::new(String::deserialize(deserializer)?);
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Split and Recover
// ---------------------------------------------------------------------------

fn secret_digest(secret: &[u8]) -> [u8; SECRET_DIGEST_LENGTH] {
    let mut out = [0u8; SECRET_DIGEST_LENGTH];
    out.copy_from_slice(&sha256(secret)[..SECRET_DIGEST_LENGTH]);
    out
}

/// Split a secret into `config.total_shares` shares.
///
/// For each byte of `secret || digest`, a random polynomial of degree
/// `threshold - 1` is drawn with that byte as the constant term and
/// evaluated at x = 1, 2, ..., total.
pub fn split_secret(secret: &[u8], config: &ShamirConfig) -> Result<Vec<Share>, ShamirError> {
    if secret.is_empty() {
        return Err(ShamirError::EmptySecret);
    }
    let config = ShamirConfig::new(config.threshold, config.total_shares)?;
    let threshold = config.threshold as usize;

    let mut payload = Zeroizing::new(Vec::with_capacity(secret.len() + SECRET_DIGEST_LENGTH));
    payload.extend_from_slice(secret);
    payload.extend_from_slice(&secret_digest(secret));

    let mut rng = OsRng;
    let mut split_id = [0u8; SPLIT_ID_LENGTH];
    rng.try_fill_bytes(&mut split_id)
        .map_err(|e| ShamirError::RandomnessFailure(e.to_string()))?;

    let mut random = Zeroizing::new(vec![0u8; (threshold - 1) * payload.len()]);
    rng.try_fill_bytes(&mut random)
        .map_err(|e| ShamirError::RandomnessFailure(e.to_string()))?;

    let mut shares: Vec<Share> = (1..=config.total_shares)
        .map(|index| Share {
            split_id,
            threshold: config.threshold,
            total: config.total_shares,
            index,
            data: Vec::with_capacity(payload.len()),
        })
        .collect();

    let mut coefficients = Zeroizing::new(vec![0u8; threshold]);
    for (i, &byte) in payload.iter().enumerate() {
        coefficients[0] = byte;
        coefficients[1..].copy_from_slice(&random[i * (threshold - 1)..(i + 1) * (threshold - 1)]);
        for share in shares.iter_mut() {
            share.data.push(gf256::eval_polynomial(&coefficients, share.index));
        }
    }

    Ok(shares)
}

/// Recover a secret from at least `threshold` shares of one split.
///
/// # Errors
///
/// - [`ShamirError::NoShares`] for an empty slice.
/// - [`ShamirError::ShareMismatch`] if the shares disagree on split id,
///   threshold, total or data length.
/// - [`ShamirError::CorruptShare`] on a zero, out-of-range or duplicated
///   index, or when the reconstructed secret fails its digest check.
/// - [`ShamirError::InsufficientShares`] below the threshold.
///
/// Never returns a plausible-but-wrong secret.
pub fn recover_secret(shares: &[Share]) -> Result<Zeroizing<Vec<u8>>, ShamirError> {
    let first = shares.first().ok_or(ShamirError::NoShares)?;

    for share in &shares[1..] {
        if share.split_id != first.split_id {
            return Err(ShamirError::ShareMismatch(format!(
                "split {} vs {}",
                first.split_id_hex(),
                share.split_id_hex()
            )));
        }
        if share.threshold != first.threshold || share.total != first.total {
            return Err(ShamirError::ShareMismatch(format!(
                "policy {}/{} vs {}/{}",
                first.threshold, first.total, share.threshold, share.total
            )));
        }
        if share.data.len() != first.data.len() {
            return Err(ShamirError::ShareMismatch(format!(
                "data length {} vs {}",
                first.data.len(),
                share.data.len()
            )));
        }
    }

    let mut seen = [false; 256];
    for share in shares {
        if share.index == 0 || share.index > share.total {
            return Err(ShamirError::CorruptShare(format!(
                "index {} outside 1..={}",
                share.index, share.total
            )));
        }
        if seen[share.index as usize] {
            return Err(ShamirError::CorruptShare(format!(
                "duplicate index {}",
                share.index
            )));
        }
        seen[share.index as usize] = true;
    }

    let need = first.threshold as usize;
    if shares.len() < need {
        return Err(ShamirError::InsufficientShares {
            have: shares.len(),
            need,
        });
    }
    if first.data.len() <= SECRET_DIGEST_LENGTH {
        return Err(ShamirError::CorruptShare("share data too short".to_string()));
    }

    let used = &shares[..need];
    let xs: Vec<u8> = used.iter().map(|s| s.index).collect();
    let mut payload = Zeroizing::new(Vec::with_capacity(first.data.len()));
    let mut ys = Zeroizing::new(vec![0u8; need]);
    for byte_idx in 0..first.data.len() {
        for (y, share) in ys.iter_mut().zip(used) {
            *y = share.data[byte_idx];
        }
        payload.push(gf256::lagrange_interpolate_at_zero(&xs, &ys));
    }

    let secret_len = payload.len() - SECRET_DIGEST_LENGTH;
    if secret_digest(&payload[..secret_len])[..] != payload[secret_len..] {
        return Err(ShamirError::CorruptShare(
            "reconstructed secret failed its digest check".to_string(),
        ));
    }

    Ok(Zeroizing::new(payload[..secret_len].to_vec()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
