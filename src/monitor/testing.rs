//! In-memory collaborators for driving the monitor in tests.

use crate::alert::{AlertDispatcher, AlertPayload};
use crate::common::{Clock, Frame};
use crate::error::ClassifierError;
use crate::intake::FrameSource;
use crate::pipeline::classifier::Classifier;
use crate::pipeline::preprocessing::PreprocessedImage;
use crate::pipeline::scoring::ScoreVector;
use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, Rgb};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Logit pair whose fire-class softmax equals `p`.
pub fn scores_for(p: f32) -> ScoreVector {
    vec![(p / (1.0 - p)).ln(), 0.0]
}

pub struct StaticFrameSource {
    available: AtomicBool,
    empty_frames: AtomicBool,
    pub captures: AtomicUsize,
}

impl StaticFrameSource {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            empty_frames: AtomicBool::new(false),
            captures: AtomicUsize::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_empty_frames(&self, empty: bool) {
        self.empty_frames.store(empty, Ordering::SeqCst);
    }
}

#[async_trait]
impl FrameSource for StaticFrameSource {
    async fn capture_frame(&self) -> Option<Frame> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if !self.available.load(Ordering::SeqCst) {
            return None;
        }
        let image = if self.empty_frames.load(Ordering::SeqCst) {
            DynamicImage::new_rgb8(0, 0)
        } else {
            DynamicImage::ImageRgb8(ImageBuffer::from_pixel(320, 240, Rgb([200, 90, 20])))
        };
        Some(Frame::captured_now(image))
    }
}

/// What a [`ScriptedClassifier`] does once its script runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhenExhausted {
    Fail,
    Hang,
    Panic,
}

/// Returns queued score vectors in order, then behaves as `when_exhausted` says.
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<ScoreVector>>,
    cancel_on_call: Option<CancellationToken>,
    when_exhausted: WhenExhausted,
}

impl ScriptedClassifier {
    pub fn new(script: Vec<ScoreVector>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            cancel_on_call: None,
            when_exhausted: WhenExhausted::Fail,
        }
    }

    /// Cancels `token` while "classifying", as if `stop()` landed mid-tick.
    pub fn cancelling(script: Vec<ScoreVector>, token: CancellationToken) -> Self {
        Self {
            cancel_on_call: Some(token),
            ..Self::new(script)
        }
    }

    pub fn when_exhausted(mut self, when_exhausted: WhenExhausted) -> Self {
        self.when_exhausted = when_exhausted;
        self
    }

    pub fn push(&self, scores: ScoreVector) {
        self.script.lock().unwrap().push_back(scores);
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, _image: &PreprocessedImage) -> Result<ScoreVector, ClassifierError> {
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }
        let next = self.script.lock().unwrap().pop_front();
        match (next, self.when_exhausted) {
            (Some(scores), _) => Ok(scores),
            (None, WhenExhausted::Fail) => {
                Err(ClassifierError::Unavailable("script exhausted".to_string()))
            }
            (None, WhenExhausted::Hang) => std::future::pending().await,
            (None, WhenExhausted::Panic) => panic!("classifier crashed"),
        }
    }

    fn name(&self) -> &'static str {
        "ScriptedClassifier"
    }
}

#[derive(Default)]
pub struct RecordingDispatcher {
    pub alerts: Mutex<Vec<AlertPayload>>,
}

impl RecordingDispatcher {
    pub fn count(&self) -> usize {
        self.alerts.lock().unwrap().len()
    }
}

impl AlertDispatcher for RecordingDispatcher {
    fn dispatch(&self, payload: AlertPayload) {
        self.alerts.lock().unwrap().push(payload);
    }
}

pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Arc<Self> {
        Arc::new(Self {
            now_ms: AtomicI64::new(now_ms),
        })
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
