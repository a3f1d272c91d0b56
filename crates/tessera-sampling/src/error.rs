use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SamplingError {
    #[error("Insufficient eligible peers: need {needed}, found {available}")]
    InsufficientPeers { needed: usize, available: usize },

    #[error("Invalid sample size: {0}")]
    InvalidSampleSize(usize),
}

pub type Result<T> = std::result::Result<T, SamplingError>;
