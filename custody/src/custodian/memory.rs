//! In-memory custodian and registry, for tests and local drills.
//!
//! The custodian can be told to misbehave: fail the next call, decline to
//! acknowledge, answer slowly, or hand back tampered shares. That is most of
//! what the coordinator tests need.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::{
    AccountDetails, AccountRegistry, CustodianError, CustodianSession, EncryptedShare,
    ShareCustodian, ShareDetails,
};

#[derive(Debug, Default)]
struct Faults {
    next_store: Option<CustodianError>,
    next_fetch: Option<CustodianError>,
    decline_store: bool,
    delay: Option<Duration>,
}

/// A share custodian backed by a `HashMap` keyed by pool id.
#[derive(Debug, Default)]
pub struct InMemoryCustodian {
    pools: RwLock<HashMap<String, Vec<EncryptedShare>>>,
    required_token: Option<String>,
    faults: Mutex<Faults>,
    stores: Mutex<usize>,
}

impl InMemoryCustodian {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept sessions carrying exactly `token`.
    pub fn with_access_token(token: impl Into<String>) -> Self {
        Self {
            required_token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Make the next `store_shares` call fail with `err`.
    pub fn fail_next_store(&self, err: CustodianError) {
        self.faults.lock().next_store = Some(err);
    }

    /// Make the next `fetch_shares` call fail with `err`.
    pub fn fail_next_fetch(&self, err: CustodianError) {
        self.faults.lock().next_fetch = Some(err);
    }

    /// Answer `Ok(false)` to stores, without keeping anything.
    pub fn set_decline_store(&self, decline: bool) {
        self.faults.lock().decline_store = decline;
    }

    /// Sleep this long before answering any call.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.faults.lock().delay = delay;
    }

    /// Number of store calls that reached the pool map.
    pub fn store_count(&self) -> usize {
        *self.stores.lock()
    }

    /// What is filed under `pool_id`, if anything.
    pub fn stored(&self, pool_id: &str) -> Option<Vec<EncryptedShare>> {
        self.pools.read().get(pool_id).cloned()
    }

    /// Overwrite a pool directly, bypassing the session check.
    pub fn insert_raw(&self, pool_id: &str, shares: Vec<EncryptedShare>) {
        self.pools.write().insert(pool_id.to_string(), shares);
    }

    /// Rewrite the share at `index` in `pool_id`. Returns `false` when
    /// there is no such share.
    pub fn tamper<F>(&self, pool_id: &str, index: usize, f: F) -> bool
    where
        F: FnOnce(&str) -> String,
    {
        let mut pools = self.pools.write();
        match pools.get_mut(pool_id).and_then(|shares| shares.get_mut(index)) {
            Some(share) => {
                *share = EncryptedShare::new(f(share.as_str()));
                true
            }
            None => false,
        }
    }

    /// Remove the share at `index` from `pool_id`.
    pub fn drop_share(&self, pool_id: &str, index: usize) -> Option<EncryptedShare> {
        let mut pools = self.pools.write();
        let shares = pools.get_mut(pool_id)?;
        (index < shares.len()).then(|| shares.remove(index))
    }

    fn authorize(&self, session: &CustodianSession) -> Result<(), CustodianError> {
        if session.access_token.is_empty() {
            return Err(CustodianError::Unauthorized);
        }
        match &self.required_token {
            Some(token) if token != &session.access_token => Err(CustodianError::Unauthorized),
            _ => Ok(()),
        }
    }

    async fn pause(&self) {
        let delay = self.faults.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ShareCustodian for InMemoryCustodian {
    async fn store_shares(
        &self,
        session: &CustodianSession,
        shares: &[EncryptedShare],
    ) -> Result<bool, CustodianError> {
        self.pause().await;
        self.authorize(session)?;

        let decline = {
            let mut faults = self.faults.lock();
            if let Some(err) = faults.next_store.take() {
                return Err(err);
            }
            faults.decline_store
        };
        if decline {
            debug!(pool = %session.pool_id, "in-memory custodian declining store");
            return Ok(false);
        }

        self.pools
            .write()
            .insert(session.pool_id.clone(), shares.to_vec());
        *self.stores.lock() += 1;
        debug!(pool = %session.pool_id, count = shares.len(), "in-memory custodian stored shares");
        Ok(true)
    }

    async fn fetch_shares(&self, session: &CustodianSession) -> Result<ShareDetails, CustodianError> {
        self.pause().await;
        self.authorize(session)?;

        if let Some(err) = self.faults.lock().next_fetch.take() {
            return Err(err);
        }

        let pools = self.pools.read();
        let shares = pools
            .get(&session.pool_id)
            .ok_or_else(|| CustodianError::NotFound(session.pool_id.clone()))?;
        Ok(ShareDetails::from_encrypted(shares))
    }
}

/// An account registry backed by a `Vec`.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    accounts: RwLock<Vec<AccountDetails>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

#[async_trait]
impl AccountRegistry for InMemoryRegistry {
    async fn create_account(
        &self,
        shard_id: &str,
        account_name: &str,
        pub_key: &str,
    ) -> Result<AccountDetails, CustodianError> {
        let mut accounts = self.accounts.write();
        if accounts.iter().any(|a| a.account_name == account_name) {
            return Err(CustodianError::AccountExists(account_name.to_string()));
        }
        let id = accounts.len() as i64 + 1;
        let account = AccountDetails {
            id,
            account_id: format!("1.2.{id}"),
            account_name: account_name.to_string(),
            pub_key: pub_key.to_string(),
            pri_key: None,
            seed_phrase: None,
            shard_id: Some(shard_id.to_string()),
            del_flag: Some(false),
        };
        accounts.push(account.clone());
        debug!(account = %account_name, id, "registered account");
        Ok(account)
    }

    async fn account_by_name(&self, account_name: &str) -> Result<Option<AccountDetails>, CustodianError> {
        Ok(self
            .accounts
            .read()
            .iter()
            .find(|a| a.account_name == account_name)
            .cloned())
    }

    async fn accounts_by_pubkey(&self, pub_key: &str) -> Result<Vec<AccountDetails>, CustodianError> {
        Ok(self
            .accounts
            .read()
            .iter()
            .filter(|a| a.pub_key == pub_key)
            .cloned()
            .collect())
    }
}
