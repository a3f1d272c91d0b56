use crate::text::{normalize, tokens};
use crate::{RewardError, RewardEvaluation, RewardFunction, Result};
use std::collections::{HashMap, HashSet};

/// Token-level F1 between a completion and the reference solution.
///
/// Scores 0 for every completion when the challenge has no reference.
#[derive(Debug, Clone, Default)]
pub struct ReferenceOverlapReward;

impl ReferenceOverlapReward {
    fn f1(completion: &[String], reference: &[String]) -> f64 {
        if completion.is_empty() || reference.is_empty() {
            return 0.0;
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for token in reference {
            *counts.entry(token.as_str()).or_default() += 1;
        }

        let mut common = 0usize;
        for token in completion {
            if let Some(count) = counts.get_mut(token.as_str()) {
                if *count > 0 {
                    *count -= 1;
                    common += 1;
                }
            }
        }

        if common == 0 {
            return 0.0;
        }
        let precision = common as f64 / completion.len() as f64;
        let recall = common as f64 / reference.len() as f64;
        2.0 * precision * recall / (precision + recall)
    }
}

impl RewardFunction for ReferenceOverlapReward {
    fn name(&self) -> &str {
        "reference_overlap"
    }

    fn apply(
        &self,
        _question: &str,
        completions: &[String],
        _metadata: &str,
        reference: Option<&str>,
    ) -> Result<RewardEvaluation> {
        let reference = match reference {
            Some(r) => tokens(r),
            None => return Ok(RewardEvaluation::normalized(vec![0.0; completions.len()])),
        };

        let scores = completions
            .iter()
            .map(|c| Self::f1(&tokens(c), &reference))
            .collect();
        Ok(RewardEvaluation::normalized(scores))
    }
}

/// Fraction of the question's distinct terms that the completion mentions.
///
/// Raw values are matched term counts.
#[derive(Debug, Clone)]
pub struct QuestionRelevanceReward {
    min_term_len: usize,
}

impl Default for QuestionRelevanceReward {
    fn default() -> Self {
        Self { min_term_len: 3 }
    }
}

impl QuestionRelevanceReward {
    pub fn new(min_term_len: usize) -> Self {
        Self { min_term_len }
    }
}

impl RewardFunction for QuestionRelevanceReward {
    fn name(&self) -> &str {
        "question_relevance"
    }

    fn apply(
        &self,
        question: &str,
        completions: &[String],
        _metadata: &str,
        _reference: Option<&str>,
    ) -> Result<RewardEvaluation> {
        let terms: HashSet<String> = tokens(question)
            .into_iter()
            .filter(|t| t.chars().count() >= self.min_term_len)
            .collect();

        let mut raw = Vec::with_capacity(completions.len());
        let mut normalized = Vec::with_capacity(completions.len());
        for completion in completions {
            let present: HashSet<String> = tokens(completion).into_iter().collect();
            let matched = terms.intersection(&present).count();
            raw.push(matched as f64);
            normalized.push(if terms.is_empty() {
                0.0
            } else {
                matched as f64 / terms.len() as f64
            });
        }
        Ok(RewardEvaluation::new(raw, normalized))
    }
}

/// `min(1, words / target_words)`. Raw values are word counts.
#[derive(Debug, Clone)]
pub struct LengthReward {
    target_words: usize,
}

impl LengthReward {
    pub fn new(target_words: usize) -> Result<Self> {
        if target_words == 0 {
            return Err(RewardError::Function {
                function: "length".to_string(),
                reason: "target_words must be positive".to_string(),
            });
        }
        Ok(Self { target_words })
    }
}

impl RewardFunction for LengthReward {
    fn name(&self) -> &str {
        "length"
    }

    fn apply(
        &self,
        _question: &str,
        completions: &[String],
        _metadata: &str,
        _reference: Option<&str>,
    ) -> Result<RewardEvaluation> {
        let raw: Vec<f64> = completions
            .iter()
            .map(|c| c.split_whitespace().count() as f64)
            .collect();
        let normalized = raw
            .iter()
            .map(|words| (words / self.target_words as f64).min(1.0))
            .collect();
        Ok(RewardEvaluation::new(raw, normalized))
    }
}

/// Zeroes blank completions, including absent ones
#[derive(Debug, Clone, Default)]
pub struct NonEmptyMask;

impl RewardFunction for NonEmptyMask {
    fn name(&self) -> &str {
        "non_empty"
    }

    fn apply(
        &self,
        _question: &str,
        completions: &[String],
        _metadata: &str,
        _reference: Option<&str>,
    ) -> Result<RewardEvaluation> {
        let mask = completions
            .iter()
            .map(|c| if c.trim().is_empty() { 0.0 } else { 1.0 })
            .collect();
        Ok(RewardEvaluation::normalized(mask))
    }
}

/// Zeroes every completion whose normalized text appears more than once in
/// the batch, so copied answers earn nothing.
#[derive(Debug, Clone, Default)]
pub struct DiversityMask;

impl RewardFunction for DiversityMask {
    fn name(&self) -> &str {
        "diversity"
    }

    fn apply(
        &self,
        _question: &str,
        completions: &[String],
        _metadata: &str,
        _reference: Option<&str>,
    ) -> Result<RewardEvaluation> {
        let normalized: Vec<String> = completions.iter().map(|c| normalize(c)).collect();
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for text in &normalized {
            *counts.entry(text.as_str()).or_default() += 1;
        }

        let mask = normalized
            .iter()
            .map(|text| {
                if text.is_empty() || counts[text.as_str()] > 1 {
                    0.0
                } else {
                    1.0
                }
            })
            .collect();
        Ok(RewardEvaluation::normalized(mask))
    }
}
