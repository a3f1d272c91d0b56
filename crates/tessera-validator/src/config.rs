use std::time::Duration;
use tessera_types::WorkItem;

/// Tunables of the forward cycle
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Peers queried per cycle
    pub sample_size: usize,
    /// Deadline for each link-prediction probe
    pub probe_timeout: Duration,
    /// Deadline for the scored task, shared by all sampled peers
    pub scored_timeout: Duration,
    /// Moving-average smoothing factor, in (0, 1]
    pub alpha: f64,
    /// Upper bound on peer calls in flight
    pub max_concurrency: usize,
    /// Pause between cycles in [`Validator::run`](crate::Validator::run)
    pub cycle_rest: Duration,
    /// Accepted probe documents attached to the scored task as sources
    pub max_sources: usize,
    /// URLs the crawl frontier starts from
    pub seed_urls: Vec<WorkItem>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            sample_size: 20,
            probe_timeout: Duration::from_secs(12),
            scored_timeout: Duration::from_secs(20),
            alpha: 0.05,
            max_concurrency: 64,
            cycle_rest: Duration::from_secs(10),
            max_sources: 0,
            seed_urls: Vec::new(),
        }
    }
}
