pub mod client;
pub mod engine;
pub mod error;

pub use client::{HttpPeerClient, PeerClient};
pub use engine::{DispatchEngine, DispatchOutcome};
pub use error::{DispatchError, Result};
