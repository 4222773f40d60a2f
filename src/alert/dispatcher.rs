use super::multipart::MultipartForm;
use super::payload::AlertPayload;
use crate::config::{normalize_base_url, AlertSettings};
use crate::error::UploadError;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const ALERTS_PATH: &str = "/api/v1/alerts";
pub const JPEG_QUALITY: u8 = 80;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(20);
const WRITE_TIMEOUT: Duration = Duration::from_secs(20);

/// Accepts confirmed alerts from the monitoring loop.
///
/// `dispatch` must return without waiting on the network and must not fail: every error
/// is terminal for that one alert and is only logged. There is no retry.
pub trait AlertDispatcher: Send + Sync {
    fn dispatch(&self, payload: AlertPayload);
}

/// Uploads alerts as `multipart/form-data` to `{base_url}/api/v1/alerts`.
#[derive(Clone)]
pub struct HttpAlertDispatcher {
    base_url: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

/// Subset of the server's reply worth logging.
#[derive(Debug, Deserialize)]
struct AlertReceipt {
    id: Option<i64>,
}

impl HttpAlertDispatcher {
    pub fn new(settings: &AlertSettings) -> Self {
        let api_key = settings.api_key.trim();
        Self {
            base_url: normalize_base_url(&settings.base_url),
            api_key: (!api_key.is_empty()).then(|| api_key.to_string()),
            agent: ureq::AgentBuilder::new()
                .timeout_connect(CONNECT_TIMEOUT)
                .timeout_read(READ_TIMEOUT)
                .timeout_write(WRITE_TIMEOUT)
                .build(),
        }
    }

    pub fn alerts_url(&self) -> String {
        format!("{}{}", self.base_url, ALERTS_PATH)
    }

    /// Reason the payload cannot be uploaded at all, if any.
    ///
    /// These are configuration-level no-ops rather than failures.
    pub fn skip_reason(&self, payload: &AlertPayload) -> Option<&'static str> {
        if self.base_url.is_empty() {
            Some("server base URL is empty")
        } else if payload.device_id().trim().is_empty() {
            Some("device id is empty")
        } else if payload.evidence_image().is_none() {
            Some("evidence image is missing")
        } else {
            None
        }
    }

    /// Performs one blocking upload and returns the response status.
    pub fn upload(&self, payload: &AlertPayload) -> Result<u16, UploadError> {
        let image = payload
            .evidence_image()
            .ok_or(UploadError::MissingEvidence)?;
        let jpeg = encode_jpeg(image, JPEG_QUALITY)?;

        let (content_type, body) = MultipartForm::new()
            .text("device_id", payload.device_id())
            .text("timestamp_ms", &payload.timestamp_ms().to_string())
            .text("confidence", &format_confidence(payload.confidence()))
            .text("consecutive_hits", &payload.consecutive_hits().to_string())
            .file("image", &payload.image_filename(), "image/jpeg", &jpeg)
            .finish();

        let mut request = self
            .agent
            .post(&self.alerts_url())
            .set("Content-Type", &content_type);
        if let Some(api_key) = &self.api_key {
            request = request.set("X-API-Key", api_key);
        }

        debug!(
            "Uploading alert {} ({} bytes of evidence)",
            payload.timestamp_ms(),
            jpeg.len()
        );

        match request.send_bytes(&body) {
            Ok(response) => {
                let status = response.status();
                let body = response.into_string()?;
                match serde_json::from_str::<AlertReceipt>(&body) {
                    Ok(AlertReceipt { id: Some(id) }) => {
                        info!("Alert upload response: {} (alert id {})", status, id)
                    }
                    _ => info!("Alert upload response: {} {}", status, body),
                }
                Ok(status)
            }
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                Err(UploadError::Rejected { status, body })
            }
            Err(e) => Err(UploadError::Transport(Box::new(e))),
        }
    }
}

impl AlertDispatcher for HttpAlertDispatcher {
    fn dispatch(&self, payload: AlertPayload) {
        if let Some(reason) = self.skip_reason(&payload) {
            warn!("{}; skipping alert upload", reason);
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("No async runtime available; dropping alert");
                return;
            }
        };

        let uploader = self.clone();
        runtime.spawn_blocking(move || {
            if let Err(e) = uploader.upload(&payload) {
                warn!("Alert upload failed: {}", e);
            }
        });
    }
}

/// Renders a confidence the way the alert server expects, always with a fractional part
/// (`1.0`, not `1`).
pub fn format_confidence(confidence: f32) -> String {
    format!("{confidence:?}")
}

pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut buffer = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        encoder.encode_image(image)?;
    }
    Ok(buffer)
}
