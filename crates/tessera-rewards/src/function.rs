use crate::Result;

/// Scores for one batch of completions, one entry per completion
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RewardEvaluation {
    /// Function-native values, for tracing
    pub raw: Vec<f64>,
    /// Values combined by the aggregator
    pub normalized: Vec<f64>,
}

impl RewardEvaluation {
    pub fn new(raw: Vec<f64>, normalized: Vec<f64>) -> Self {
        Self { raw, normalized }
    }

    /// Evaluation whose raw values are already normalized
    pub fn normalized(values: Vec<f64>) -> Self {
        Self {
            raw: values.clone(),
            normalized: values,
        }
    }
}

/// A reward or mask over a batch of completions to the same question.
///
/// `metadata` is the task category of the challenge; `reference` is its
/// reference solution when the dataset carries one.
pub trait RewardFunction: Send + Sync {
    fn name(&self) -> &str;

    fn apply(
        &self,
        question: &str,
        completions: &[String],
        metadata: &str,
        reference: Option<&str>,
    ) -> Result<RewardEvaluation>;
}
