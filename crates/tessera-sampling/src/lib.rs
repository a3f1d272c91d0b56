pub mod error;
pub mod selection;

pub use error::{Result, SamplingError};
pub use selection::{PeerSampler, SamplingPools};
