use crate::{Result, RewardConfig, RewardError, RewardEvaluation, RewardFunction};
use tracing::{debug, trace};

/// Combines weighted reward functions, then multiplies in every mask.
///
/// `reward[i] = Π_m mask_m[i] · Σ_f w_f · normalized_f[i]`
pub struct RewardAggregator {
    rewards: Vec<(f64, Box<dyn RewardFunction>)>,
    masks: Vec<Box<dyn RewardFunction>>,
    clamp_output: bool,
}

impl Default for RewardAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl RewardAggregator {
    pub fn new() -> Self {
        Self {
            rewards: Vec::new(),
            masks: Vec::new(),
            clamp_output: false,
        }
    }

    pub fn from_config(config: &RewardConfig) -> Result<Self> {
        let mut aggregator = Self::new().with_clamp(config.clamp_output);
        for weighted in &config.functions {
            aggregator = aggregator.with_reward(weighted.weight, weighted.function.build()?)?;
        }
        for mask in &config.masks {
            aggregator = aggregator.with_mask(mask.build()?);
        }
        Ok(aggregator)
    }

    pub fn with_reward(mut self, weight: f64, function: Box<dyn RewardFunction>) -> Result<Self> {
        if !weight.is_finite() {
            return Err(RewardError::InvalidWeight {
                function: function.name().to_string(),
                weight,
            });
        }
        self.rewards.push((weight, function));
        Ok(self)
    }

    pub fn with_mask(mut self, mask: Box<dyn RewardFunction>) -> Self {
        self.masks.push(mask);
        self
    }

    pub fn with_clamp(mut self, clamp_output: bool) -> Self {
        self.clamp_output = clamp_output;
        self
    }

    pub fn reward_count(&self) -> usize {
        self.rewards.len()
    }

    pub fn mask_count(&self) -> usize {
        self.masks.len()
    }

    /// Reward vector for `completions`, in completion order.
    ///
    /// Any function returning the wrong length or a non-finite value fails
    /// the whole evaluation.
    pub fn score(
        &self,
        question: &str,
        completions: &[String],
        metadata: &str,
        reference: Option<&str>,
    ) -> Result<Vec<f64>> {
        let mut reward = vec![0.0; completions.len()];

        for (weight, function) in &self.rewards {
            let eval = function.apply(question, completions, metadata, reference)?;
            Self::check(function.name(), &eval, completions.len())?;
            trace!(function = function.name(), raw = ?eval.raw, "Reward raw");
            trace!(function = function.name(), normalized = ?eval.normalized, "Reward normalized");

            for (r, value) in reward.iter_mut().zip(&eval.normalized) {
                *r += weight * value;
            }
        }

        for mask in &self.masks {
            let eval = mask.apply(question, completions, metadata, reference)?;
            Self::check(mask.name(), &eval, completions.len())?;
            trace!(function = mask.name(), normalized = ?eval.normalized, "Mask");

            for (r, value) in reward.iter_mut().zip(&eval.normalized) {
                *r *= value;
            }
        }

        if let Some(position) = reward.iter().position(|r| !r.is_finite()) {
            return Err(RewardError::NonFinite {
                function: "aggregate".to_string(),
                position,
            });
        }

        if self.clamp_output {
            for r in reward.iter_mut() {
                *r = r.clamp(0.0, 1.0);
            }
        }

        debug!(
            completions = completions.len(),
            rewards = self.rewards.len(),
            masks = self.masks.len(),
            "🏆 Rewards computed"
        );

        Ok(reward)
    }

    fn check(name: &str, eval: &RewardEvaluation, expected: usize) -> Result<()> {
        for len in [eval.normalized.len(), eval.raw.len()] {
            if len != expected {
                return Err(RewardError::LengthMismatch {
                    function: name.to_string(),
                    expected,
                    got: len,
                });
            }
        }
        if let Some(position) = eval.normalized.iter().position(|v| !v.is_finite()) {
            return Err(RewardError::NonFinite {
                function: name.to_string(),
                position,
            });
        }
        Ok(())
    }
}
