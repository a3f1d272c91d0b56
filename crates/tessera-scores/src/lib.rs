pub mod error;
pub mod state;

pub use error::{Result, ScoreError};
pub use state::{ScoreSnapshot, ScoreState};
