use crate::common::Frame;
use crate::error::AppError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Camera boundary: yields the current frame, or `None` when no frame can be captured.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture_frame(&self) -> Option<Frame>;
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

/// Replays the images of a directory in file-name order, wrapping around at the end.
pub struct DirectoryFrameSource {
    files: Vec<PathBuf>,
    cursor: AtomicUsize,
}

impl DirectoryFrameSource {
    pub fn open(dir: &Path) -> Result<Self, AppError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                files.push(path);
            }
        }
        files.sort();

        if files.is_empty() {
            return Err(AppError::FrameSource(format!(
                "no images found in {}",
                dir.display()
            )));
        }

        info!("Replaying {} frames from {}", files.len(), dir.display());
        Ok(Self {
            files,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait]
impl FrameSource for DirectoryFrameSource {
    async fn capture_frame(&self) -> Option<Frame> {
        if self.files.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.files.len();
        let path = self.files[index].clone();

        let decoded = tokio::task::spawn_blocking(move || {
            let result = image::open(&path);
            (path, result)
        })
        .await;

        match decoded {
            Ok((path, Ok(image))) => {
                debug!("Captured frame from {}", path.display());
                Some(Frame::captured_now(image))
            }
            Ok((path, Err(e))) => {
                warn!("Failed to decode {}: {}", path.display(), e);
                None
            }
            Err(e) => {
                warn!("Frame decode task failed: {}", e);
                None
            }
        }
    }
}
