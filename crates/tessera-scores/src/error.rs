use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("{sampled} sampled peers but {rewards} rewards")]
    LengthMismatch { sampled: usize, rewards: usize },

    #[error("Peer index {index} out of range for {len} scores")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Smoothing factor {0} outside (0, 1]")]
    InvalidAlpha(f64),
}

pub type Result<T> = std::result::Result<T, ScoreError>;
