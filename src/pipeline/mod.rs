pub mod classifier;
pub mod cooldown;
pub mod debounce;
pub mod preprocessing;
pub mod scoring;

pub use classifier::{Classifier, ExternalCommandClassifier};
pub use cooldown::CooldownGate;
pub use debounce::DebounceGate;
pub use preprocessing::{ImagePreprocessor, PreprocessedImage};
pub use scoring::{ConfidenceScorer, DetectionLabel, DetectionResult, ScoreVector};
