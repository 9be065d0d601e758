//! # Custodians and Registries
//!
//! The two services the custody engine talks to but does not own:
//!
//! - a **share custodian** that keeps a user's encrypted shares, filed
//!   under an identity pool and gated by an access token. Over HTTPS this is
//!   `POST /auth {poolID, accessToken, shares}` and
//!   `GET /auth?accessToken=..&poolID=..`.
//! - an **account registry** that maps account names to UPCX public-key
//!   addresses.
//!
//! Both are async traits. The HTTPS clients live with the app; this crate
//! ships an in-memory pair for tests and a filesystem custodian for the
//! command-line tool.
//!
//! Nothing crossing this seam is ever plaintext key material. The custodian
//! only sees base64 ciphertext; the registry only sees public keys.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::IdentityClaims;

pub mod file;
pub mod memory;

pub use file::FileCustodian;
pub use memory::{InMemoryCustodian, InMemoryRegistry};

/// Errors reported by a custodian or registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CustodianError {
    /// The access token was rejected.
    #[error("custodian rejected the access token")]
    Unauthorized,

    /// Nothing is filed under this pool.
    #[error("no shares stored for pool '{0}'")]
    NotFound(String),

    /// The service could not be reached or failed its side of the call.
    #[error("custodian unavailable: {0}")]
    Unavailable(String),

    /// The service answered with something we could not understand.
    #[error("malformed custodian response: {0}")]
    Malformed(String),

    /// Account name already registered.
    #[error("account '{0}' already exists")]
    AccountExists(String),
}

// ---------------------------------------------------------------------------
// Wire Types
// ---------------------------------------------------------------------------

/// What the custodian needs to file or release shares. Supplied by the
/// sign-in layer.
#[derive(Clone, PartialEq, Eq)]
pub struct CustodianSession {
    pub access_token: String,
    pub pool_id: String,
}

impl CustodianSession {
    pub fn new(access_token: impl Into<String>, pool_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            pool_id: pool_id.into(),
        }
    }

    /// Session for `claims`, filed under the pool named by the issuer.
    pub fn for_claims(access_token: impl Into<String>, claims: &IdentityClaims) -> Self {
        Self::new(access_token, claims.pool_id())
    }
}

impl fmt::Debug for CustodianSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustodianSession")
            .field("access_token", &"<redacted>")
            .field("pool_id", &self.pool_id)
            .finish()
    }
}

/// One sealed share: `base64(iv || ciphertext)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedShare(String);

impl EncryptedShare {
    pub fn new(blob: impl Into<String>) -> Self {
        Self(blob.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for EncryptedShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The custodian's answer to a fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareDetails {
    pub shares: Vec<String>,
}

impl ShareDetails {
    pub fn from_encrypted(shares: &[EncryptedShare]) -> Self {
        Self {
            shares: shares.iter().map(|s| s.as_str().to_string()).collect(),
        }
    }

    pub fn into_encrypted(self) -> Vec<EncryptedShare> {
        self.shares.into_iter().map(EncryptedShare).collect()
    }
}

/// A registry account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetails {
    pub id: i64,
    pub account_id: String,
    pub account_name: String,
    /// UPCX address of the account's public key.
    pub pub_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pri_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_phrase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shard_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub del_flag: Option<bool>,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Keeps encrypted shares on the user's behalf.
#[async_trait]
pub trait ShareCustodian: Send + Sync {
    /// File `shares` under the session's pool, replacing whatever was there.
    /// `Ok(true)` is the acknowledgement; `Ok(false)` means the custodian
    /// answered but declined.
    async fn store_shares(
        &self,
        session: &CustodianSession,
        shares: &[EncryptedShare],
    ) -> Result<bool, CustodianError>;

    /// Release the shares filed under the session's pool.
    async fn fetch_shares(&self, session: &CustodianSession) -> Result<ShareDetails, CustodianError>;
}

/// Maps account names to public keys.
#[async_trait]
pub trait AccountRegistry: Send + Sync {
    async fn create_account(
        &self,
        shard_id: &str,
        account_name: &str,
        pub_key: &str,
    ) -> Result<AccountDetails, CustodianError>;

    async fn account_by_name(&self, account_name: &str) -> Result<Option<AccountDetails>, CustodianError>;

    async fn accounts_by_pubkey(&self, pub_key: &str) -> Result<Vec<AccountDetails>, CustodianError>;
}

#[async_trait]
impl<T: ShareCustodian + ?Sized> ShareCustodian for Arc<T> {
    async fn store_shares(
        &self,
        session: &CustodianSession,
        shares: &[EncryptedShare],
    ) -> Result<bool, CustodianError> {
        (**self).store_shares(session, shares).await
    }

    async fn fetch_shares(&self, session: &CustodianSession) -> Result<ShareDetails, CustodianError> {
        (**self).fetch_shares(session).await
    }
}

#[async_trait]
impl<T: AccountRegistry + ?Sized> AccountRegistry for Arc<T> {
    async fn create_account(
        &self,
        shard_id: &str,
        account_name: &str,
        pub_key: &str,
    ) -> Result<AccountDetails, CustodianError> {
        (**self).create_account(shard_id, account_name, pub_key).await
    }

    async fn account_by_name(&self, account_name: &str) -> Result<Option<AccountDetails>, CustodianError> {
        (**self).account_by_name(account_name).await
    }

    async fn accounts_by_pubkey(&self, pub_key: &str) -> Result<Vec<AccountDetails>, CustodianError> {
        (**self).accounts_by_pubkey(pub_key).await
    }
}
