use crate::{Result, ScoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tessera_types::PeerIndex;
use tracing::{debug, info};

/// Per-peer moving-average scores, one slot per registry peer.
///
/// Every mutation validates first and replaces the whole vector, so a failed
/// update leaves the previous scores in place.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreState {
    scores: Vec<f64>,
    version: u64,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

/// Read-only copy handed to consumers of the score vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub version: u64,
    pub scores: Vec<f64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ScoreSnapshot {
    /// Peers ordered by score, highest first
    pub fn ranked(&self) -> Vec<(PeerIndex, f64)> {
        let mut ranked: Vec<(PeerIndex, f64)> = self.scores.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }
}

impl ScoreState {
    /// All-zero scores for `peers` slots
    pub fn new(peers: usize) -> Self {
        Self {
            scores: vec![0.0; peers],
            version: 0,
            updated_at: None,
        }
    }

    pub fn from_scores(scores: Vec<f64>) -> Self {
        Self {
            scores,
            version: 0,
            updated_at: None,
        }
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn get(&self, index: PeerIndex) -> Option<f64> {
        self.scores.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn snapshot(&self) -> ScoreSnapshot {
        ScoreSnapshot {
            version: self.version,
            scores: self.scores.clone(),
            updated_at: self.updated_at,
        }
    }

    /// Match the registry size. New slots start at 0.0; a shrink truncates.
    /// Returns whether the length changed.
    pub fn resize(&mut self, peers: usize) -> bool {
        if peers == self.scores.len() {
            return false;
        }
        let previous = self.scores.len();
        let mut resized = self.scores.clone();
        resized.resize(peers, 0.0);
        self.install(resized);
        info!(previous, peers, "📏 Resized score vector");
        true
    }

    /// Fold one cycle's rewards into the moving average.
    ///
    /// `scattered` is the current vector with each sampled slot overwritten
    /// by its reward (a repeated index keeps its last reward). Every slot then
    /// becomes `alpha * scattered + (1 - alpha) * old`, so unsampled peers keep
    /// their score.
    pub fn update(&mut self, sampled: &[PeerIndex], rewards: &[f64], alpha: f64) -> Result<()> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(ScoreError::InvalidAlpha(alpha));
        }
        if sampled.len() != rewards.len() {
            return Err(ScoreError::LengthMismatch {
                sampled: sampled.len(),
                rewards: rewards.len(),
            });
        }
        if let Some(&index) = sampled.iter().find(|&&i| i >= self.scores.len()) {
            return Err(ScoreError::IndexOutOfRange {
                index,
                len: self.scores.len(),
            });
        }

        let mut scattered = self.scores.clone();
        for (&index, &reward) in sampled.iter().zip(rewards) {
            scattered[index] = reward;
        }

        let next: Vec<f64> = scattered
            .iter()
            .zip(&self.scores)
            .map(|(s, old)| alpha * s + (1.0 - alpha) * old)
            .collect();

        self.install(next);
        debug!(
            sampled = sampled.len(),
            alpha,
            version = self.version,
            "📈 Scores updated"
        );
        Ok(())
    }

    fn install(&mut self, scores: Vec<f64>) {
        self.scores = scores;
        self.version += 1;
        self.updated_at = Some(Utc::now());
    }
}
