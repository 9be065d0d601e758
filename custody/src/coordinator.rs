//! # Recovery Coordinator
//!
//! Glues the pieces into the two operations a wallet actually performs.
//!
//! **Backup**
//!
//! ```text
//! GeneratedKey -> Serialized (WIF) -> Split -> EncryptedEachShare
//!              -> HandedToCustodian -> Acknowledged
//! ```
//!
//! Every share is encrypted before anything leaves the process, and the
//! upload is one `store_shares` call. A backup counts only once the
//! custodian says `true` inside the timeout; no acknowledgement, no
//! [`BackupReceipt`]. Drop the future halfway and you get nothing, which is
//! the correct amount to get.
//!
//! **Recovery**
//!
//! ```text
//! Fetched -> DecryptedEachShare -> Combined -> Restored
//! ```
//!
//! Shares that fail to decrypt or parse are logged and skipped, not fatal:
//! the whole point of a threshold is surviving a few bad ones. Surviving
//! shares are grouped by split id (a pool may hold leftovers from an older
//! backup). Only groups holding at least their own threshold are combined.
//! If none does, that is
//! [`ErrorKind::InsufficientShares`](crate::error::ErrorKind), never a
//! guessed key. If several do and they disagree, that is
//! [`ErrorKind::ShareMismatch`](crate::error::ErrorKind).

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::{CoordinatorConfig, SPLIT_ID_LENGTH};
use crate::crypto::encryption::{decrypt_with, encrypt_with};
use crate::crypto::keys::KeyPair;
use crate::custodian::{
    AccountDetails, AccountRegistry, CustodianError, CustodianSession, EncryptedShare,
    ShareCustodian,
};
use crate::error::{CustodyError, Result};
use crate::identity::address::UpcxAddress;
use crate::identity::claims::IdentityClaims;
use crate::identity::recovery::{recover_secret, split_secret, ShamirConfig, ShamirError, Share};

/// Backup progress, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupState {
    /// A fresh keypair was drawn from OS randomness.
    GeneratedKey,
    /// The private key was encoded as WIF.
    Serialized,
    /// The WIF was split into threshold shares.
    Split,
    /// Every share was sealed under the identity's share key.
    EncryptedEachShare,
    /// The sealed shares were sent to the custodian.
    HandedToCustodian,
    /// The custodian confirmed it stored them.
    Acknowledged,
}

impl fmt::Display for BackupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackupState::GeneratedKey => "generated_key",
            BackupState::Serialized => "serialized",
            BackupState::Split => "split",
            BackupState::EncryptedEachShare => "encrypted_each_share",
            BackupState::HandedToCustodian => "handed_to_custodian",
            BackupState::Acknowledged => "acknowledged",
        };
        f.write_str(name)
    }
}

/// Recovery progress, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryState {
    /// Sealed shares came back from the custodian.
    Fetched,
    /// Every readable share was decrypted and parsed.
    DecryptedEachShare,
    /// A complete share group was combined into the WIF.
    Combined,
    /// The WIF decoded into a keypair.
    Restored,
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryState::Fetched => "fetched",
            RecoveryState::DecryptedEachShare => "decrypted_each_share",
            RecoveryState::Combined => "combined",
            RecoveryState::Restored => "restored",
        };
        f.write_str(name)
    }
}

/// Proof that a custodian acknowledged a backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupReceipt {
    /// Identifier of this backup, as it appears in the logs.
    pub operation_id: Uuid,
    /// Custodian pool the shares were filed under.
    pub pool_id: String,
    /// Number of shares stored.
    pub share_count: usize,
    /// Shares needed to recover the key.
    pub threshold: u8,
    /// Address of the key that was backed up.
    pub public_address: UpcxAddress,
    /// When the custodian acknowledged the upload.
    pub stored_at: DateTime<Utc>,
}

/// Runs backups and recoveries against one custodian.
pub struct RecoveryCoordinator<C> {
    custodian: C,
    config: CoordinatorConfig,
    policy: ShamirConfig,
}

impl<C: ShareCustodian> RecoveryCoordinator<C> {
    /// Build a coordinator, validating the sharing policy up front.
    pub fn new(custodian: C, config: CoordinatorConfig) -> Result<Self> {
        let policy = config
            .policy()
            .map_err(|e| CustodyError::Config(e.to_string()))?;
        if config.custodian_timeout_secs == 0 {
            return Err(CustodyError::Config(
                "custodian timeout must be at least one second".to_string(),
            ));
        }
        Ok(Self {
            custodian,
            config,
            policy,
        })
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn custodian(&self) -> &C {
        &self.custodian
    }

    /// Serialize, split and encrypt `keypair` for `claims`. Nothing leaves
    /// the process here.
    pub fn seal_shares(
        &self,
        keypair: &KeyPair,
        claims: &IdentityClaims,
    ) -> Result<Vec<EncryptedShare>> {
        let wif = Zeroizing::new(keypair.to_wif());
        debug!(state = %BackupState::Serialized, "backup progress");

        let shares = split_secret(wif.as_bytes(), &self.policy)?;
        debug!(state = %BackupState::Split, count = shares.len(), "backup progress");

        let key = claims.derive_key();
        let sealed = shares
            .iter()
            .map(|share| {
                let text = Zeroizing::new(share.to_string());
                encrypt_with(self.config.cipher, &key, text.as_bytes()).map(EncryptedShare::new)
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        debug!(state = %BackupState::EncryptedEachShare, cipher = %self.config.cipher, "backup progress");
        Ok(sealed)
    }

    /// Back up an existing key.
    pub async fn backup(
        &self,
        keypair: &KeyPair,
        claims: &IdentityClaims,
        session: &CustodianSession,
    ) -> Result<BackupReceipt> {
        let operation_id = Uuid::new_v4();
        let address = keypair.upcx_address();
        info!(%operation_id, pool = %session.pool_id, %address, "starting backup");

        let sealed = self.seal_shares(keypair, claims)?;

        debug!(%operation_id, state = %BackupState::HandedToCustodian, "backup progress");
        let acknowledged = self
            .with_timeout(self.custodian.store_shares(session, &sealed))
            .await?;
        if !acknowledged {
            warn!(%operation_id, pool = %session.pool_id, "custodian declined backup");
            return Err(CustodyError::NotAcknowledged);
        }

        info!(
            %operation_id,
            state = %BackupState::Acknowledged,
            shares = sealed.len(),
            threshold = self.policy.threshold,
            "backup stored"
        );
        Ok(BackupReceipt {
            operation_id,
            pool_id: session.pool_id.clone(),
            share_count: sealed.len(),
            threshold: self.policy.threshold,
            public_address: address,
            stored_at: Utc::now(),
        })
    }

    /// Generate a fresh key and back it up.
    pub async fn backup_new_key(
        &self,
        claims: &IdentityClaims,
        session: &CustodianSession,
    ) -> Result<(KeyPair, BackupReceipt)> {
        let keypair = KeyPair::generate_random()?;
        debug!(state = %BackupState::GeneratedKey, "backup progress");
        let receipt = self.backup(&keypair, claims, session).await?;
        Ok((keypair, receipt))
    }

    /// Create a new account: generate a key, back it up, then register its
    /// address under `account_name`.
    ///
    /// The name is checked before anything is stored, so a taken name never
    /// overwrites the pool. Registration runs last: if it fails the key is
    /// already recoverable and registration can simply be retried.
    pub async fn enroll<R: AccountRegistry + ?Sized>(
        &self,
        registry: &R,
        shard_id: &str,
        account_name: &str,
        claims: &IdentityClaims,
        session: &CustodianSession,
    ) -> Result<(KeyPair, AccountDetails, BackupReceipt)> {
        if self
            .with_timeout(registry.account_by_name(account_name))
            .await?
            .is_some()
        {
            return Err(CustodianError::AccountExists(account_name.to_string()).into());
        }

        let (keypair, receipt) = self.backup_new_key(claims, session).await?;
        let address = receipt.public_address.to_string();
        let account = self
            .with_timeout(registry.create_account(shard_id, account_name, &address))
            .await?;
        info!(account = %account_name, %address, "account enrolled");
        Ok((keypair, account, receipt))
    }

    /// Decrypt and combine shares already in hand.
    pub fn open_shares(&self, claims: &IdentityClaims, blobs: &[EncryptedShare]) -> Result<KeyPair> {
        let key = claims.derive_key();

        let mut groups: BTreeMap<[u8; SPLIT_ID_LENGTH], Vec<Share>> = BTreeMap::new();
        let mut opened = 0usize;
        for (position, blob) in blobs.iter().enumerate() {
            let share = match open_one(self.config.cipher, &key, blob) {
                Ok(share) => share,
                Err(e) => {
                    warn!(position, error = %e, "skipping unreadable share");
                    continue;
                }
            };
            let group = groups.entry(share.split_id).or_default();
            if let Some(existing) = group.iter().find(|s| s.index == share.index) {
                if existing != &share {
                    warn!(position, index = share.index, "skipping conflicting duplicate share");
                }
                continue;
            }
            group.push(share);
            opened += 1;
        }
        debug!(state = %RecoveryState::DecryptedEachShare, opened, total = blobs.len(), "recovery progress");

        let secret = combine_groups(&groups, self.policy.threshold)?;

        let wif = std::str::from_utf8(&secret).map_err(|_| {
            ShamirError::CorruptShare("recovered secret is not a WIF string".to_string())
        })?;
        let keypair = KeyPair::from_wif(wif)?;
        Ok(keypair)
    }

    /// Fetch, decrypt and combine the shares filed for `session`.
    pub async fn recover(
        &self,
        claims: &IdentityClaims,
        session: &CustodianSession,
    ) -> Result<KeyPair> {
        info!(pool = %session.pool_id, "starting recovery");
        let details = self
            .with_timeout(self.custodian.fetch_shares(session))
            .await?;
        debug!(state = %RecoveryState::Fetched, count = details.shares.len(), "recovery progress");

        let keypair = self.open_shares(claims, &details.into_encrypted())?;
        info!(
            state = %RecoveryState::Restored,
            address = %keypair.upcx_address(),
            "key recovered"
        );
        Ok(keypair)
    }

    async fn with_timeout<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, CustodianError>>,
    {
        let limit = self.config.custodian_timeout();
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(timeout = ?limit, "custodian call timed out");
                Err(CustodyError::Timeout(limit))
            }
        }
    }
}

/// Combine every group that reaches its own threshold. Complete groups must
/// agree on the secret; a pool holding two different keys is a mismatch,
/// not a coin toss.
fn combine_groups(
    groups: &BTreeMap<[u8; SPLIT_ID_LENGTH], Vec<Share>>,
    policy_threshold: u8,
) -> Result<Zeroizing<Vec<u8>>> {
    let complete: Vec<&Vec<Share>> = groups
        .values()
        .filter(|group| group.len() >= usize::from(group[0].threshold))
        .collect();

    if complete.is_empty() {
        return Err(match groups.values().max_by_key(|group| group.len()) {
            Some(largest) => ShamirError::InsufficientShares {
                have: largest.len(),
                need: usize::from(largest[0].threshold),
            },
            None => ShamirError::InsufficientShares {
                have: 0,
                need: usize::from(policy_threshold),
            },
        }
        .into());
    }

    let mut recovered: Option<Zeroizing<Vec<u8>>> = None;
    let mut first_error = None;
    for group in complete {
        match recover_secret(group) {
            Ok(secret) => match &recovered {
                Some(previous) if previous.as_slice() != secret.as_slice() => {
                    warn!(groups = groups.len(), "pool holds complete shares of different keys");
                    return Err(ShamirError::ShareMismatch(
                        "shares from more than one backup recover different keys".to_string(),
                    )
                    .into());
                }
                Some(_) => {}
                None => {
                    debug!(state = %RecoveryState::Combined, used = group.len(), "recovery progress");
                    recovered = Some(secret);
                }
            },
            Err(e) => {
                warn!(error = %e, "skipping share group that failed to combine");
                first_error.get_or_insert(e);
            }
        }
    }

    match (recovered, first_error) {
        (Some(secret), _) => Ok(secret),
        (None, Some(e)) => Err(e.into()),
        (None, None) => Err(ShamirError::InsufficientShares {
            have: 0,
            need: usize::from(policy_threshold),
        }
        .into()),
    }
}

fn open_one(
    cipher: crate::crypto::ShareCipher,
    key: &crate::crypto::ShareKey,
    blob: &EncryptedShare,
) -> Result<Share> {
    let plain = Zeroizing::new(decrypt_with(cipher, key, blob.as_str())?);
    let text = std::str::from_utf8(&plain)
        .map_err(|_| ShamirError::Malformed("share is not UTF-8".to_string()))?;
    Ok(text.parse::<Share>()?)
}
