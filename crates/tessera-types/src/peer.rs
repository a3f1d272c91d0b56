use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a peer inside one registry snapshot.
///
/// Stable for the lifetime of the snapshot it was read from; the same
/// index may name a different peer after the registry is refreshed.
pub type PeerIndex = usize;

/// Opaque network address a peer serves requests on
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerEndpoint(String);

impl PeerEndpoint {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the endpoint names an address that can actually be dialed.
    ///
    /// Peers that have not announced themselves publish a blank address or
    /// the unspecified address `0.0.0.0`.
    pub fn is_serving(&self) -> bool {
        let address = self.0.trim();
        if address.is_empty() {
            return false;
        }
        let host = address
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(address);
        !(host == "0.0.0.0" || host.starts_with("0.0.0.0:") || host.starts_with("0.0.0.0/"))
    }
}

impl fmt::Debug for PeerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerEndpoint({})", self.0)
    }
}

impl fmt::Display for PeerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry metadata for a single peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub index: PeerIndex,
    /// Operational identity of the peer
    pub hotkey: String,
    /// Owning identity; the blacklist is keyed on this
    pub coldkey: String,
    /// Total stake bonded to the peer
    pub stake: f64,
    /// Whether the peer holds a validator permit
    #[serde(default)]
    pub validator_permit: bool,
    #[serde(default)]
    pub endpoint: Option<PeerEndpoint>,
}

impl PeerInfo {
    pub fn is_serving(&self) -> bool {
        self.endpoint.as_ref().map_or(false, PeerEndpoint::is_serving)
    }
}
