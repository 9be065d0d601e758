//! Filesystem-backed share custodian.
//!
//! One JSON file per pool, `<root>/<pool_id>.json`, holding exactly the
//! `ShareDetails` body a remote custodian would return. Writes go to a
//! temporary sibling first and are renamed into place, so a crash or a
//! cancelled store leaves either the old pool or the new one, never half of
//! each.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{CustodianError, CustodianSession, EncryptedShare, ShareCustodian, ShareDetails};

/// Keeps each pool's encrypted shares in a JSON file under `root`.
#[derive(Debug, Clone)]
pub struct FileCustodian {
    root: PathBuf,
}

impl FileCustodian {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `pool_id`.
    pub fn pool_path(&self, pool_id: &str) -> Result<PathBuf, CustodianError> {
        let valid = !pool_id.is_empty()
            && !pool_id.starts_with('.')
            && pool_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(CustodianError::Malformed(format!("invalid pool id '{pool_id}'")));
        }
        Ok(self.root.join(format!("{pool_id}.json")))
    }

    fn check_session(session: &CustodianSession) -> Result<(), CustodianError> {
        if session.access_token.is_empty() {
            return Err(CustodianError::Unauthorized);
        }
        Ok(())
    }
}

fn io_error(e: std::io::Error) -> CustodianError {
    CustodianError::Unavailable(e.to_string())
}

#[async_trait]
impl ShareCustodian for FileCustodian {
    async fn store_shares(
        &self,
        session: &CustodianSession,
        shares: &[EncryptedShare],
    ) -> Result<bool, CustodianError> {
        Self::check_session(session)?;
        let path = self.pool_path(&session.pool_id)?;

        let body = serde_json::to_vec_pretty(&ShareDetails::from_encrypted(shares))
            .map_err(|e| CustodianError::Malformed(e.to_string()))?;

        tokio::fs::create_dir_all(&self.root).await.map_err(io_error)?;
        let tmp = self
            .root
            .join(format!(".{}.{}.tmp", session.pool_id, Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::write(&tmp, &body).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            warn!(path = %path.display(), error = %e, "failed to move pool file into place");
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_error(e));
        }

        debug!(path = %path.display(), count = shares.len(), "file custodian stored shares");
        Ok(true)
    }

    async fn fetch_shares(&self, session: &CustodianSession) -> Result<ShareDetails, CustodianError> {
        Self::check_session(session)?;
        let path = self.pool_path(&session.pool_id)?;

        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CustodianError::NotFound(session.pool_id.clone()))
            }
            Err(e) => return Err(io_error(e)),
        };
        serde_json::from_slice(&body).map_err(|e| CustodianError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(pool: &str) -> CustodianSession {
        CustodianSession::new("token", pool)
    }

    #[tokio::test]
    async fn store_then_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let custodian = FileCustodian::new(dir.path().join("pools"));
        let shares = vec![EncryptedShare::new("AAAA"), EncryptedShare::new("BBBB")];

        assert!(custodian.store_shares(&session("pool-1"), &shares).await.unwrap());
        let details = custodian.fetch_shares(&session("pool-1")).await.unwrap();
        assert_eq!(details.into_encrypted(), shares);

        let on_disk = std::fs::read_to_string(dir.path().join("pools/pool-1.json")).unwrap();
        assert!(on_disk.contains("\"shares\""));
    }

    #[tokio::test]
    async fn store_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let custodian = FileCustodian::new(dir.path());
        custodian
            .store_shares(&session("p"), &[EncryptedShare::new("x")])
            .await
            .unwrap();
        custodian
            .store_shares(&session("p"), &[EncryptedShare::new("y")])
            .await
            .unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["p.json".to_string()]);
        let details = custodian.fetch_shares(&session("p")).await.unwrap();
        assert_eq!(details.shares, vec!["y".to_string()]);
    }

    #[tokio::test]
    async fn missing_pool_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let custodian = FileCustodian::new(dir.path());
        assert_eq!(
            custodian.fetch_shares(&session("nobody")).await,
            Err(CustodianError::NotFound("nobody".to_string()))
        );
    }

    #[tokio::test]
    async fn corrupt_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let custodian = FileCustodian::new(dir.path());
        std::fs::write(dir.path().join("bad.json"), b"{not json").unwrap();
        assert!(matches!(
            custodian.fetch_shares(&session("bad")).await,
            Err(CustodianError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn path_traversal_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let custodian = FileCustodian::new(dir.path());
        for pool in ["../etc", "a/b", "", ".hidden"] {
            assert!(matches!(
                custodian.store_shares(&session(pool), &[]).await,
                Err(CustodianError::Malformed(_))
            ));
        }
    }

    #[tokio::test]
    async fn empty_token_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let custodian = FileCustodian::new(dir.path());
        let anonymous = CustodianSession::new("", "pool");
        assert_eq!(
            custodian.fetch_shares(&anonymous).await,
            Err(CustodianError::Unauthorized)
        );
    }
}
