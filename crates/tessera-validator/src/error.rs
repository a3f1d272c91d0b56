use tessera_registry::RegistryError;
use tessera_rewards::RewardError;
use tessera_sampling::SamplingError;
use tessera_scores::ScoreError;
use thiserror::Error;

/// Why a cycle was abandoned. An aborted cycle changes neither the scores
/// nor the crawl frontier.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(#[from] RegistryError),

    #[error("Cannot sample peers: {0}")]
    InsufficientPeers(#[from] SamplingError),

    #[error("No challenge available: {0}")]
    NoChallenge(#[from] TaskError),

    #[error("Reward computation failed: {0}")]
    Reward(#[from] RewardError),

    #[error("Score update failed: {0}")]
    ScoreUpdate(#[from] ScoreError),
}

impl CycleError {
    /// Short label for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            CycleError::RegistryUnavailable(_) => "registry_unavailable",
            CycleError::InsufficientPeers(SamplingError::InvalidSampleSize(_)) => {
                "invalid_sample_size"
            }
            CycleError::InsufficientPeers(_) => "insufficient_peers",
            CycleError::NoChallenge(_) => "no_challenge",
            CycleError::Reward(_) => "reward",
            CycleError::ScoreUpdate(_) => "score_update",
        }
    }
}

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{path}:{line}: {reason}")]
    Parse {
        path: String,
        line: usize,
        reason: String,
    },

    #[error("Dataset {0} has no challenges")]
    EmptyDataset(String),

    #[error("No datasets configured")]
    NoDatasets,
}

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
