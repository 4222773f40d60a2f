use image::RgbImage;
use std::sync::Arc;

/// A confirmed alert, handed to an [`AlertDispatcher`](super::AlertDispatcher) by value.
///
/// Fields are read-only once constructed.
#[derive(Debug, Clone)]
pub struct AlertPayload {
    device_id: String,
    timestamp_ms: i64,
    confidence: f32,
    consecutive_hits: u32,
    evidence_image: Option<Arc<RgbImage>>,
}

impl AlertPayload {
    pub fn new(
        device_id: impl Into<String>,
        timestamp_ms: i64,
        confidence: f32,
        consecutive_hits: u32,
        evidence_image: Option<Arc<RgbImage>>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp_ms,
            confidence,
            consecutive_hits,
            evidence_image,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn consecutive_hits(&self) -> u32 {
        self.consecutive_hits
    }

    pub fn evidence_image(&self) -> Option<&RgbImage> {
        self.evidence_image.as_deref()
    }

    /// File name the evidence image is uploaded under.
    pub fn image_filename(&self) -> String {
        format!("{}.jpg", self.timestamp_ms)
    }
}
