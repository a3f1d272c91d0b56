use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tessera_registry::{EligibilityPolicy, RegistryControllerConfig};
use tessera_rewards::RewardConfig;
use tessera_validator::ValidatorConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node: NodeSettings,
    pub validator: ValidatorSettings,
    pub registry: RegistrySettings,
    pub rewards: RewardConfig,
    pub datasets: DatasetSettings,
    pub submission: SubmissionSettings,
    pub logging: LoggingConfig,
    pub metrics: MetricsSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub data_dir: PathBuf,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorSettings {
    pub sample_size: usize,
    pub probe_timeout_secs: u64,
    pub scored_timeout_secs: u64,
    pub alpha: f64,
    pub max_concurrency: usize,
    pub cycle_rest_secs: u64,
    pub max_sources: usize,
    pub seed_urls: Vec<String>,
    pub permit_stake_limit: f64,
    pub blacklist: HashSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// JSON registry snapshot, refreshed by an external indexer
    pub peers_file: PathBuf,
    pub rest_secs: u64,
    pub extra_fail_rest_secs: u64,
    /// 0 disables the staleness check
    pub max_staleness_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetSettings {
    /// JSONL challenge files, one dataset per file
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionSettings {
    /// Accepted probes are appended here as JSON lines; unset disables submission
    pub path: Option<PathBuf>,
    pub embedding_dimensions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty`, `compact` or `json`
    pub format: String,
    pub file_output: Option<PathBuf>,
    pub module_filters: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    pub enabled: bool,
    /// Prometheus text exposition is rewritten here every `export_interval_secs`
    pub export_path: Option<PathBuf>,
    pub export_interval_secs: u64,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            name: "tessera-validator".to_string(),
        }
    }
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        let defaults = ValidatorConfig::default();
        let policy = EligibilityPolicy::default();
        Self {
            sample_size: defaults.sample_size,
            probe_timeout_secs: defaults.probe_timeout.as_secs(),
            scored_timeout_secs: defaults.scored_timeout.as_secs(),
            alpha: defaults.alpha,
            max_concurrency: defaults.max_concurrency,
            cycle_rest_secs: defaults.cycle_rest.as_secs(),
            max_sources: defaults.max_sources,
            seed_urls: defaults.seed_urls,
            permit_stake_limit: policy.permit_stake_limit,
            blacklist: policy.blacklist,
        }
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            peers_file: PathBuf::from("./registry.json"),
            rest_secs: 60,
            extra_fail_rest_secs: 60,
            max_staleness_secs: 600,
        }
    }
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self {
            path: None,
            embedding_dimensions: 256,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_output: None,
            module_filters: HashMap::new(),
        }
    }
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            export_path: None,
            export_interval_secs: 15,
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        // Env overrides are applied by main.rs to keep the precedence order in one place
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(data_dir) = env::var("TESSERA_DATA_DIR") {
            self.node.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(sample_size) = env::var("TESSERA_SAMPLE_SIZE") {
            if let Ok(k) = sample_size.parse() {
                self.validator.sample_size = k;
            }
        }
        if let Ok(timeout) = env::var("TESSERA_PROBE_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.validator.probe_timeout_secs = secs;
            }
        }
        if let Ok(timeout) = env::var("TESSERA_SCORED_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.validator.scored_timeout_secs = secs;
            }
        }
        if let Ok(alpha) = env::var("TESSERA_ALPHA") {
            if let Ok(a) = alpha.parse() {
                self.validator.alpha = a;
            }
        }
        if let Ok(limit) = env::var("TESSERA_PERMIT_STAKE_LIMIT") {
            if let Ok(l) = limit.parse() {
                self.validator.permit_stake_limit = l;
            }
        }
        if let Ok(blacklist) = env::var("TESSERA_BLACKLIST") {
            self.validator.blacklist = blacklist
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(peers_file) = env::var("TESSERA_PEERS_FILE") {
            if !peers_file.is_empty() {
                self.registry.peers_file = PathBuf::from(peers_file);
            }
        }
        if let Ok(path) = env::var("TESSERA_SUBMISSION_PATH") {
            self.submission.path = if path.is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }
        if let Ok(level) = env::var("TESSERA_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let v = &self.validator;
        if !(v.alpha > 0.0 && v.alpha <= 1.0) {
            bail!("validator.alpha must be in (0, 1], got {}", v.alpha);
        }
        if v.sample_size == 0 {
            bail!("validator.sample_size must be at least 1");
        }
        if v.probe_timeout_secs == 0 || v.scored_timeout_secs == 0 {
            bail!("validator timeouts must be non-zero");
        }
        if !v.permit_stake_limit.is_finite() {
            bail!("validator.permit_stake_limit must be finite");
        }
        if self.rewards.functions.is_empty() {
            bail!("rewards.functions must name at least one reward function");
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "compact" | "json") {
            bail!("unknown logging.format '{}'", self.logging.format);
        }
        Ok(())
    }

    pub fn validator_config(&self) -> ValidatorConfig {
        let v = &self.validator;
        ValidatorConfig {
            sample_size: v.sample_size,
            probe_timeout: Duration::from_secs(v.probe_timeout_secs),
            scored_timeout: Duration::from_secs(v.scored_timeout_secs),
            alpha: v.alpha,
            max_concurrency: v.max_concurrency,
            cycle_rest: Duration::from_secs(v.cycle_rest_secs),
            max_sources: v.max_sources,
            seed_urls: v.seed_urls.clone(),
        }
    }

    pub fn eligibility_policy(&self) -> EligibilityPolicy {
        EligibilityPolicy::new(
            self.validator.permit_stake_limit,
            self.validator.blacklist.iter().cloned(),
        )
    }

    pub fn registry_config(&self) -> RegistryControllerConfig {
        let r = &self.registry;
        RegistryControllerConfig {
            rest: Duration::from_secs(r.rest_secs),
            extra_fail_rest: Duration::from_secs(r.extra_fail_rest_secs),
            max_staleness: (r.max_staleness_secs > 0)
                .then(|| Duration::from_secs(r.max_staleness_secs)),
        }
    }
}
