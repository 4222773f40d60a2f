use crate::error::ScoringError;
use std::fmt;

/// Index of the alarm class in the classifier output.
pub const FIRE_CLASS_INDEX: usize = 0;
/// Index of the background class in the classifier output.
pub const NO_FIRE_CLASS_INDEX: usize = 1;

pub const DEFAULT_FIRE_CONFIDENCE_THRESHOLD: f32 = 0.80;

pub type ScoreVector = Vec<f32>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionLabel {
    Fire,
    NoFire,
}

impl fmt::Display for DetectionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionLabel::Fire => f.write_str("FIRE"),
            DetectionLabel::NoFire => f.write_str("NO FIRE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionResult {
    pub is_positive: bool,
    /// Softmax probability of the fire class, in `[0, 1]`
    pub confidence: f32,
}

impl DetectionResult {
    pub fn label(&self) -> DetectionLabel {
        if self.is_positive {
            DetectionLabel::Fire
        } else {
            DetectionLabel::NoFire
        }
    }
}

/// Probability of `a` under a softmax over the pair `(a, b)`.
///
/// Shifts both logits by their maximum so neither exponent can overflow.
pub fn softmax2(a: f32, b: f32) -> f32 {
    let m = a.max(b);
    let ea = (a - m).exp();
    let eb = (b - m).exp();
    ea / (ea + eb)
}

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceScorer {
    threshold: f32,
}

impl ConfidenceScorer {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn score(&self, scores: &[f32]) -> Result<DetectionResult, ScoringError> {
        if scores.len() < 2 {
            return Err(ScoringError::TooFewScores(scores.len()));
        }

        let confidence = softmax2(scores[FIRE_CLASS_INDEX], scores[NO_FIRE_CLASS_INDEX]);
        if !confidence.is_finite() {
            return Err(ScoringError::NonFinite);
        }

        Ok(DetectionResult {
            is_positive: confidence >= self.threshold,
            confidence,
        })
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(DEFAULT_FIRE_CONFIDENCE_THRESHOLD)
    }
}
