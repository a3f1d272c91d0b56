use crate::{RegistryError, RegistrySnapshot, RegistrySource, Result};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RegistryControllerConfig {
    /// Pause between successful syncs
    pub rest: Duration,
    /// Extra pause after a failed sync, on top of `rest`
    pub extra_fail_rest: Duration,
    /// Snapshots older than this are reported as unavailable
    pub max_staleness: Option<Duration>,
}

impl Default for RegistryControllerConfig {
    fn default() -> Self {
        Self {
            rest: Duration::from_secs(60),
            extra_fail_rest: Duration::from_secs(60),
            max_staleness: Some(Duration::from_secs(600)),
        }
    }
}

/// Keeps the latest registry snapshot fresh from a background task.
///
/// Readers never wait on a fetch: the network round-trip happens outside
/// the lock and only the install takes the write lock.
pub struct RegistryController {
    source: Arc<dyn RegistrySource>,
    config: RegistryControllerConfig,
    current: RwLock<Option<Arc<RegistrySnapshot>>>,
    last_sync_success: RwLock<Option<DateTime<Utc>>>,
    is_syncing: AtomicBool,
    failed_syncs: AtomicU64,
}

impl RegistryController {
    pub fn new(source: Arc<dyn RegistrySource>, config: RegistryControllerConfig) -> Self {
        Self {
            source,
            config,
            current: RwLock::new(None),
            last_sync_success: RwLock::new(None),
            is_syncing: AtomicBool::new(false),
            failed_syncs: AtomicU64::new(0),
        }
    }

    /// Fetch and install one snapshot. The previous snapshot survives a failure.
    pub async fn sync(&self) -> Result<Arc<RegistrySnapshot>> {
        self.is_syncing.store(true, Ordering::SeqCst);
        let start = Instant::now();
        let fetched = self.source.fetch().await;
        self.is_syncing.store(false, Ordering::SeqCst);

        match fetched {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                *self.current.write().await = Some(snapshot.clone());
                *self.last_sync_success.write().await = Some(Utc::now());
                info!(
                    peers = snapshot.peer_count(),
                    block = snapshot.block,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "🔄 Registry synced"
                );
                Ok(snapshot)
            }
            Err(e) => {
                self.failed_syncs.fetch_add(1, Ordering::Relaxed);
                warn!(
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "⚠️ Could not sync registry"
                );
                Err(e)
            }
        }
    }

    /// Install a snapshot directly, bypassing the source
    pub async fn install(&self, snapshot: RegistrySnapshot) {
        *self.current.write().await = Some(Arc::new(snapshot));
        *self.last_sync_success.write().await = Some(Utc::now());
    }

    /// Latest snapshot, or `Unavailable` if there is none or it went stale
    pub async fn snapshot(&self) -> Result<Arc<RegistrySnapshot>> {
        let current = self.current.read().await.clone();
        let snapshot = current.ok_or_else(|| {
            RegistryError::Unavailable("no registry snapshot synced yet".to_string())
        })?;

        if let Some(max_staleness) = self.config.max_staleness {
            let age = snapshot.age_secs().max(0) as u64;
            if age > max_staleness.as_secs() {
                return Err(RegistryError::Unavailable(format!(
                    "registry snapshot is {}s old (max {}s)",
                    age,
                    max_staleness.as_secs()
                )));
            }
        }

        Ok(snapshot)
    }

    pub async fn last_sync_success(&self) -> Option<DateTime<Utc>> {
        *self.last_sync_success.read().await
    }

    pub fn is_syncing(&self) -> bool {
        self.is_syncing.load(Ordering::SeqCst)
    }

    pub fn failed_syncs(&self) -> u64 {
        self.failed_syncs.load(Ordering::Relaxed)
    }

    /// Spawn the refresh loop. Abort the handle to stop it.
    pub fn start_sync_task(self: Arc<Self>) -> JoinHandle<()> {
        info!(
            rest_secs = self.config.rest.as_secs(),
            extra_fail_rest_secs = self.config.extra_fail_rest.as_secs(),
            "🚀 Started registry sync task"
        );
        tokio::spawn(async move {
            loop {
                if self.sync().await.is_err() {
                    debug!(
                        extra_rest_secs = self.config.extra_fail_rest.as_secs(),
                        "Backing off after failed registry sync"
                    );
                    tokio::time::sleep(self.config.extra_fail_rest).await;
                }
                tokio::time::sleep(self.config.rest).await;
            }
        })
    }
}
