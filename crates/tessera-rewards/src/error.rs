use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RewardError {
    #[error("{function} returned {got} scores for {expected} completions")]
    LengthMismatch {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("{function} produced a non-finite score at position {position}")]
    NonFinite { function: String, position: usize },

    #[error("Invalid weight {weight} for {function}")]
    InvalidWeight { function: String, weight: f64 },

    #[error("{function} failed: {reason}")]
    Function { function: String, reason: String },
}

pub type Result<T> = std::result::Result<T, RewardError>;
