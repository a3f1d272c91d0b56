use crate::{RegistryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tessera_types::{PeerEndpoint, PeerIndex, PeerInfo};

/// Point-in-time view of every registered peer.
///
/// Peers are stored densely: `peers[i].index == i` for every `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Chain height the snapshot was read at
    #[serde(default)]
    pub block: u64,
    pub peers: Vec<PeerInfo>,
    #[serde(default = "Utc::now")]
    pub synced_at: DateTime<Utc>,
}

impl RegistrySnapshot {
    pub fn new(block: u64, peers: Vec<PeerInfo>) -> Result<Self> {
        let snapshot = Self {
            block,
            peers,
            synced_at: Utc::now(),
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check that peer indices are dense and in order
    pub fn validate(&self) -> Result<()> {
        for (position, peer) in self.peers.iter().enumerate() {
            if peer.index != position {
                return Err(RegistryError::InvalidSnapshot(format!(
                    "peer at position {} carries index {}",
                    position, peer.index
                )));
            }
        }
        Ok(())
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    pub fn peer(&self, index: PeerIndex) -> Option<&PeerInfo> {
        self.peers.get(index)
    }

    pub fn endpoint(&self, index: PeerIndex) -> Option<&PeerEndpoint> {
        self.peers.get(index).and_then(|p| p.endpoint.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerInfo> {
        self.peers.iter()
    }

    /// Seconds elapsed since the snapshot was taken
    pub fn age_secs(&self) -> i64 {
        (Utc::now() - self.synced_at).num_seconds()
    }
}
