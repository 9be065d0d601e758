//! # Identity Claims
//!
//! The four claims the identity provider vouches for, and the share key
//! derived from them. The claims arrive from a sign-in flow this crate does
//! not implement; we never persist them.
//!
//! ```text
//! share_key = SHA256( email || subject || issuer || audience )
//! ```
//!
//! UTF-8, that exact order, no separators. Changing any of that re-keys
//! every backup in existence, so don't.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::crypto::encryption::ShareKey;

/// Claims about the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Stable user identifier (`sub`).
    #[serde(rename = "sub")]
    pub subject: String,
    /// Verified email address.
    pub email: String,
    /// Token issuer URL (`iss`).
    #[serde(rename = "iss")]
    pub issuer: String,
    /// Intended audience (`aud`).
    #[serde(rename = "aud")]
    pub audience: String,
}

impl IdentityClaims {
    pub fn new(
        subject: impl Into<String>,
        email: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            email: email.into(),
            issuer: issuer.into(),
            audience: audience.into(),
        }
    }

    /// Derive the AES-256 key that seals this identity's shares.
    ///
    /// ```
    /// use upcx_custody::identity::IdentityClaims;
    ///
    /// let claims = IdentityClaims::new("u1", "a@b.com", "idp", "app");
    /// let again = IdentityClaims::new("u1", "a@b.com", "idp", "app");
    /// assert_eq!(claims.derive_key().as_bytes(), again.derive_key().as_bytes());
    /// ```
    pub fn derive_key(&self) -> ShareKey {
        let mut hasher = Sha256::new();
        hasher.update(self.email.as_bytes());
        hasher.update(self.subject.as_bytes());
        hasher.update(self.issuer.as_bytes());
        hasher.update(self.audience.as_bytes());
        ShareKey::from_bytes(hasher.finalize().into())
    }

    /// The identity pool the custodian files shares under: the last
    /// `/`-separated segment of the issuer.
    pub fn pool_id(&self) -> &str {
        self.issuer
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.issuer)
    }
}
