use crate::error::ClassifierError;
use crate::pipeline::preprocessing::PreprocessedImage;
use crate::pipeline::scoring::ScoreVector;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

pub const DEFAULT_CLASSIFY_TIMEOUT: Duration = Duration::from_secs(30);

/// Binary image classifier consumed as an opaque call.
///
/// Implementations return raw class scores; index 0 is the fire class and index 1 the
/// background class.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image: &PreprocessedImage) -> Result<ScoreVector, ClassifierError>;
    fn name(&self) -> &'static str;
}

/// Runs an external program once per image.
///
/// The CHW tensor is written to the program's stdin as little-endian `f32` values and the
/// scores are read back from stdout, separated by whitespace or commas. A program that does
/// not finish within the timeout is killed.
#[derive(Debug, Clone)]
pub struct ExternalCommandClassifier {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ExternalCommandClassifier {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: DEFAULT_CLASSIFY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds a classifier from a `[program, args...]` list; `None` when the list is empty.
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self::new(program.clone(), args.to_vec()))
    }
}

#[async_trait]
impl Classifier for ExternalCommandClassifier {
    async fn classify(&self, image: &PreprocessedImage) -> Result<ScoreVector, ClassifierError> {
        // Dropping the run on timeout kills the child.
        tokio::time::timeout(self.timeout, self.run(image))
            .await
            .map_err(|_| ClassifierError::TimedOut(self.timeout))?
    }

    fn name(&self) -> &'static str {
        "ExternalCommandClassifier"
    }
}

impl ExternalCommandClassifier {
    async fn run(&self, image: &PreprocessedImage) -> Result<ScoreVector, ClassifierError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let payload: Vec<u8> = image
            .tensor()
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect();
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(ClassifierError::Failed(output.status));
        }

        let scores = parse_scores(&String::from_utf8_lossy(&output.stdout))?;
        debug!("{} returned scores {:?}", self.program, scores);
        Ok(scores)
    }
}

pub fn parse_scores(text: &str) -> Result<ScoreVector, ClassifierError> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f32>()
                .map_err(|_| ClassifierError::MalformedOutput(format!("'{token}' is not a score")))
        })
        .collect()
}
