//! Snapshot store: content-addressed capture of the daemon's running
//! configuration, with provenance tracking for restores.

pub mod provenance;

use std::sync::Arc;

use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use flintroute_db::snapshots;
use flintroute_schemas::ConfigVersion;
use flintroute_sbc::SouthboundClient;
use provenance::{ProvenanceEvent, ProvenanceLog};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("config version not found")]
    NotFound,
    #[error("downstream southbound failure: {0}")]
    Downstream(String),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct SnapshotStore {
    pool: PgPool,
    sbc: Arc<dyn SouthboundClient>,
    provenance: AsyncMutex<ProvenanceLog>,
}

impl SnapshotStore {
    pub fn new(
        pool: PgPool,
        sbc: Arc<dyn SouthboundClient>,
        provenance_path: impl AsRef<std::path::Path>,
    ) -> anyhow::Result<Self> {
        Ok(SnapshotStore {
            pool,
            sbc,
            provenance: AsyncMutex::new(ProvenanceLog::new(provenance_path)?),
        })
    }

    /// Idempotent by content hash: a repeat capture of an unchanged
    /// running-config returns the existing row rather than inserting a
    /// duplicate.
    pub async fn capture(
        &self,
        description: Option<&str>,
        actor: Uuid,
    ) -> Result<ConfigVersion, SnapshotError> {
        let blob = self
            .sbc
            .get_running_config()
            .await
            .map_err(|err| SnapshotError::Downstream(err.to_string()))?;

        let hash = hex::encode(Sha256::digest(blob.as_bytes()));

        if let Some(existing) = snapshots::find_by_hash(&self.pool, &hash).await? {
            return Ok(existing);
        }

        let id = Uuid::new_v4();
        let version = snapshots::insert(&self.pool, id, description, &blob, &hash, actor).await?;

        self.provenance
            .lock()
            .await
            .append(ProvenanceEvent::Captured {
                version_id: version.id,
                hash: version.hash.clone(),
                actor,
            })?;

        Ok(version)
    }

    pub async fn list(&self) -> Result<Vec<ConfigVersion>, SnapshotError> {
        Ok(snapshots::list(&self.pool).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<ConfigVersion, SnapshotError> {
        snapshots::get(&self.pool, id).await?.ok_or(SnapshotError::NotFound)
    }

    /// Advisory restore: the version is fetched and the intent is
    /// durably recorded in the provenance trail, but re-applying
    /// `config_blob` to the daemon is left to an operator-triggered
    /// follow-up rather than performed here — the blob format is
    /// whatever the daemon's `get-running-config` returned, and the
    /// southbound client exposes no "load full config" capability to
    /// push it back (only per-peer add/update/remove).
    pub async fn restore(&self, id: Uuid, actor: Uuid) -> Result<ConfigVersion, SnapshotError> {
        let version = self.get(id).await?;

        self.provenance
            .lock()
            .await
            .append(ProvenanceEvent::RestoreRequested {
                version_id: version.id,
                actor,
            })?;

        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flintroute_sbc::mock::MockSbc;

    #[tokio::test]
    async fn capture_hashes_running_config() {
        let sbc = Arc::new(MockSbc::new());
        sbc.set_running_config("router bgp 65000\n");
        let blob = sbc.get_running_config().await.unwrap();
        let hash = hex::encode(Sha256::digest(blob.as_bytes()));
        assert_eq!(hash.len(), 64);
    }
}
