use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tessera_types::PeerInfo;
use tracing::trace;

/// Why a peer is kept out of sampling this cycle
#[derive(Debug, Clone, PartialEq)]
pub enum Ineligibility {
    /// No dialable endpoint announced
    NotServing,
    /// Permitted validator whose stake exceeds the permit limit
    StakeAboveLimit { stake: f64, limit: f64 },
    /// Owning identity is blacklisted
    Blacklisted { coldkey: String },
}

impl fmt::Display for Ineligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ineligibility::NotServing => write!(f, "not serving"),
            Ineligibility::StakeAboveLimit { stake, limit } => {
                write!(f, "stake {} above permit limit {}", stake, limit)
            }
            Ineligibility::Blacklisted { coldkey } => write!(f, "coldkey {} blacklisted", coldkey),
        }
    }
}

/// Per-cycle eligibility rules applied to every registry peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityPolicy {
    /// Permitted peers staked above this are treated as validators, not workers
    pub permit_stake_limit: f64,
    /// Coldkeys never sampled
    #[serde(default)]
    pub blacklist: HashSet<String>,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            permit_stake_limit: 4096.0,
            blacklist: HashSet::new(),
        }
    }
}

impl EligibilityPolicy {
    pub fn new(permit_stake_limit: f64, blacklist: impl IntoIterator<Item = String>) -> Self {
        Self {
            permit_stake_limit,
            blacklist: blacklist.into_iter().collect(),
        }
    }

    pub fn assess(&self, peer: &PeerInfo) -> Result<(), Ineligibility> {
        if !peer.is_serving() {
            return Err(Ineligibility::NotServing);
        }

        if peer.validator_permit && peer.stake > self.permit_stake_limit {
            return Err(Ineligibility::StakeAboveLimit {
                stake: peer.stake,
                limit: self.permit_stake_limit,
            });
        }

        if self.blacklist.contains(&peer.coldkey) {
            return Err(Ineligibility::Blacklisted {
                coldkey: peer.coldkey.clone(),
            });
        }

        Ok(())
    }

    pub fn is_eligible(&self, peer: &PeerInfo) -> bool {
        match self.assess(peer) {
            Ok(()) => true,
            Err(reason) => {
                trace!(peer = peer.index, %reason, "Peer not available");
                false
            }
        }
    }
}
