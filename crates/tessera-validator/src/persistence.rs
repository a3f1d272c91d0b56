use crate::PersistenceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tessera_frontier::CrawlFrontier;
use tessera_scores::ScoreState;
use tracing::info;

pub const STATE_FILE: &str = "validator_state.json";

/// Everything a validator needs to resume after a restart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorState {
    pub scores: ScoreState,
    pub frontier: CrawlFrontier,
    pub saved_at: DateTime<Utc>,
}

impl ValidatorState {
    pub fn new(scores: ScoreState, frontier: CrawlFrontier) -> Self {
        Self {
            scores,
            frontier,
            saved_at: Utc::now(),
        }
    }

    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join(STATE_FILE)
    }

    /// Write through a temporary file so a crash never leaves half a state
    pub fn save(&self, path: &Path) -> Result<(), PersistenceError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `None` when no state was saved yet
    pub fn load_if_exists(path: &Path) -> Result<Option<Self>, PersistenceError> {
        if !path.exists() {
            return Ok(None);
        }
        let state = Self::load(path)?;
        info!(
            path = %path.display(),
            peers = state.scores.len(),
            version = state.scores.version(),
            queued = state.frontier.queue_len(),
            "💾 Restored validator state"
        );
        Ok(Some(state))
    }
}
