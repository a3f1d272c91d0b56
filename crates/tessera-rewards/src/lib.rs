pub mod aggregator;
pub mod config;
pub mod error;
pub mod function;
pub mod functions;
mod text;

pub use aggregator::RewardAggregator;
pub use config::{RewardConfig, RewardFunctionConfig, WeightedRewardConfig};
pub use error::{Result, RewardError};
pub use function::{RewardEvaluation, RewardFunction};
pub use functions::{
    DiversityMask, LengthReward, NonEmptyMask, QuestionRelevanceReward, ReferenceOverlapReward,
};
