use crate::config::NodeConfig;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tessera_dispatch::HttpPeerClient;
use tessera_registry::{FileRegistrySource, RegistryController};
use tessera_rewards::RewardAggregator;
use tessera_validator::{
    DatasetPool, HashingEmbedder, JsonlSubmissionSink, Validator, ValidatorMetrics,
    ValidatorState,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// A validator wired to its registry, peers, datasets, and sinks
pub struct ValidatorNode {
    validator: Validator,
    registry: Arc<RegistryController>,
    metrics: Option<Arc<ValidatorMetrics>>,
    config: NodeConfig,
}

impl ValidatorNode {
    pub async fn new(config: NodeConfig) -> Result<Self> {
        config.validate().context("invalid configuration")?;

        std::fs::create_dir_all(&config.node.data_dir).with_context(|| {
            format!(
                "failed to create data directory {}",
                config.node.data_dir.display()
            )
        })?;

        let source = Arc::new(FileRegistrySource::new(&config.registry.peers_file));
        let registry = Arc::new(RegistryController::new(source, config.registry_config()));
        if let Err(e) = registry.sync().await {
            // The background sync keeps retrying; cycles abort until it succeeds
            warn!(
                error = %e,
                peers_file = %config.registry.peers_file.display(),
                "⚠️ Initial registry sync failed"
            );
        }

        let client = HttpPeerClient::new().context("failed to build peer HTTP client")?;
        let aggregator = RewardAggregator::from_config(&config.rewards)
            .context("failed to build reward functions")?;
        let tasks = DatasetPool::from_paths(config.datasets.paths.as_slice())
            .context("failed to load challenge datasets")?;

        let state_path = ValidatorState::path_in(&config.node.data_dir);
        let mut validator = Validator::new(
            config.validator_config(),
            config.eligibility_policy(),
            registry.clone(),
            Arc::new(client),
            aggregator,
            Box::new(tasks),
        )
        .with_state_path(&state_path);

        if let Some(state) = ValidatorState::load_if_exists(&state_path)
            .with_context(|| format!("failed to read {}", state_path.display()))?
        {
            validator = validator.with_state(state);
        }

        if let Some(path) = &config.submission.path {
            let sink = JsonlSubmissionSink::open(path)
                .await
                .with_context(|| format!("failed to open submission log {}", path.display()))?;
            info!(path = %path.display(), "📝 Publishing probe submissions");
            validator = validator.with_submission(
                Arc::new(HashingEmbedder::new(config.submission.embedding_dimensions)),
                Arc::new(sink),
            );
        }

        let metrics = if config.metrics.enabled {
            let metrics =
                Arc::new(ValidatorMetrics::new().context("failed to register metrics")?);
            validator = validator.with_metrics(metrics.clone());
            Some(metrics)
        } else {
            None
        };

        Ok(Self {
            validator,
            registry,
            metrics,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.node.name
    }

    /// Run cycles until `shutdown` flips to true
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        let Self {
            mut validator,
            registry,
            metrics,
            config,
        } = self;

        let sync_handle = registry.start_sync_task();
        let export_handle = match (&metrics, &config.metrics.export_path) {
            (Some(metrics), Some(path)) => Some(spawn_metrics_export(
                metrics.clone(),
                path.clone(),
                Duration::from_secs(config.metrics.export_interval_secs.max(1)),
            )),
            _ => None,
        };

        validator.run(shutdown).await;

        sync_handle.abort();
        if let Some(handle) = export_handle {
            handle.abort();
        }
        info!(
            cycles = validator.cycles_completed(),
            "🛑 Validator node stopped"
        );
    }
}

/// Periodically rewrite the Prometheus text exposition to `path`
fn spawn_metrics_export(
    metrics: Arc<ValidatorMetrics>,
    path: PathBuf,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = tokio::fs::write(&path, metrics.gather()).await {
                warn!(
                    error = %e,
                    path = %path.display(),
                    "⚠️ Failed to export metrics"
                );
            }
        }
    })
}
