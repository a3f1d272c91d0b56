use crate::{
    DiversityMask, LengthReward, NonEmptyMask, QuestionRelevanceReward, ReferenceOverlapReward,
    Result, RewardFunction,
};
use serde::{Deserialize, Serialize};

fn default_min_term_len() -> usize {
    3
}

fn default_target_words() -> usize {
    50
}

/// One shipped reward or mask function and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardFunctionConfig {
    ReferenceOverlap,
    QuestionRelevance {
        #[serde(default = "default_min_term_len")]
        min_term_len: usize,
    },
    Length {
        #[serde(default = "default_target_words")]
        target_words: usize,
    },
    NonEmpty,
    Diversity,
}

impl RewardFunctionConfig {
    pub fn build(&self) -> Result<Box<dyn RewardFunction>> {
        Ok(match self {
            RewardFunctionConfig::ReferenceOverlap => Box::new(ReferenceOverlapReward),
            RewardFunctionConfig::QuestionRelevance { min_term_len } => {
                Box::new(QuestionRelevanceReward::new(*min_term_len))
            }
            RewardFunctionConfig::Length { target_words } => {
                Box::new(LengthReward::new(*target_words)?)
            }
            RewardFunctionConfig::NonEmpty => Box::new(NonEmptyMask),
            RewardFunctionConfig::Diversity => Box::new(DiversityMask),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedRewardConfig {
    pub weight: f64,
    #[serde(flatten)]
    pub function: RewardFunctionConfig,
}

/// Reward functions with their weights, then masks, applied in order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    pub functions: Vec<WeightedRewardConfig>,
    #[serde(default)]
    pub masks: Vec<RewardFunctionConfig>,
    /// Clamp every final reward into [0, 1]
    #[serde(default)]
    pub clamp_output: bool,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            functions: vec![
                WeightedRewardConfig {
                    weight: 0.4,
                    function: RewardFunctionConfig::ReferenceOverlap,
                },
                WeightedRewardConfig {
                    weight: 0.4,
                    function: RewardFunctionConfig::QuestionRelevance {
                        min_term_len: default_min_term_len(),
                    },
                },
                WeightedRewardConfig {
                    weight: 0.2,
                    function: RewardFunctionConfig::Length {
                        target_words: default_target_words(),
                    },
                },
            ],
            masks: vec![RewardFunctionConfig::NonEmpty, RewardFunctionConfig::Diversity],
            clamp_output: false,
        }
    }
}
