use crate::{RegistryError, RegistrySnapshot, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Where registry snapshots come from (a chain client, a file, a fixture)
#[async_trait]
pub trait RegistrySource: Send + Sync {
    /// Read a fresh snapshot of all registered peers
    async fn fetch(&self) -> Result<RegistrySnapshot>;
}

/// Reads a JSON-encoded [`RegistrySnapshot`] from disk on every fetch.
///
/// Lets an external chain indexer drop snapshots into a file without the
/// validator linking a chain client.
pub struct FileRegistrySource {
    path: PathBuf,
}

impl FileRegistrySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RegistrySource for FileRegistrySource {
    async fn fetch(&self) -> Result<RegistrySnapshot> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let mut snapshot: RegistrySnapshot = serde_json::from_str(&content)?;
        snapshot.validate()?;
        snapshot.synced_at = Utc::now();
        debug!(
            path = %self.path.display(),
            peers = snapshot.peer_count(),
            block = snapshot.block,
            "Read registry snapshot from file"
        );
        Ok(snapshot)
    }
}

/// In-memory source; swap the snapshot or make it fail to simulate outages
#[derive(Clone, Default)]
pub struct StaticRegistrySource {
    snapshot: Arc<RwLock<Option<RegistrySnapshot>>>,
}

impl StaticRegistrySource {
    pub fn new(snapshot: RegistrySnapshot) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(Some(snapshot))),
        }
    }

    /// A source whose every fetch fails
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub async fn set(&self, snapshot: Option<RegistrySnapshot>) {
        *self.snapshot.write().await = snapshot;
    }
}

#[async_trait]
impl RegistrySource for StaticRegistrySource {
    async fn fetch(&self) -> Result<RegistrySnapshot> {
        let guard = self.snapshot.read().await;
        match guard.as_ref() {
            Some(snapshot) => {
                let mut snapshot = snapshot.clone();
                snapshot.synced_at = Utc::now();
                Ok(snapshot)
            }
            None => Err(RegistryError::Unavailable(
                "static registry has no snapshot".to_string(),
            )),
        }
    }
}
