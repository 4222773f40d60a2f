use thiserror::Error;

// Main Application Error Type

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Monitor error: {0}")]
    Monitor(String),
    #[error("Frame source error: {0}")]
    FrameSource(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreprocessingError {
    #[error("Frame has zero area ({width}x{height})")]
    EmptyFrame { width: u32, height: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScoringError {
    #[error("Classifier returned {0} scores, at least 2 are required")]
    TooFewScores(usize),
    #[error("Classifier returned non-finite scores")]
    NonFinite,
}

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Failed to run classifier: {0}")]
    Io(#[from] std::io::Error),
    #[error("Classifier exited with {0}")]
    Failed(std::process::ExitStatus),
    #[error("Malformed classifier output: {0}")]
    MalformedOutput(String),
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),
    #[error("Classifier did not answer within {0:?}")]
    TimedOut(std::time::Duration),
}

/// Reasons a single monitoring tick forfeits its contribution.
///
/// None of these stop the loop; the tick is skipped and the next one is scheduled.
#[derive(Error, Debug)]
pub enum TickError {
    #[error("No frame available")]
    FrameUnavailable,
    #[error("Preprocessing failed: {0}")]
    Preprocessing(#[from] PreprocessingError),
    #[error("Classification failed: {0}")]
    Classification(#[from] ClassifierError),
    #[error("Invalid score vector: {0}")]
    InvalidScoreVector(#[from] ScoringError),
    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Alert has no evidence image")]
    MissingEvidence,
    #[error("Failed to encode evidence image: {0}")]
    Encoding(#[from] image::ImageError),
    #[error("Transport error: {0}")]
    Transport(Box<ureq::Error>),
    #[error("Server rejected alert with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Failed to read response: {0}")]
    Io(#[from] std::io::Error),
}
