use crate::common::Frame;
use crate::error::PreprocessingError;
use image::imageops::FilterType;
use image::RgbImage;
use std::sync::Arc;
use tracing::debug;

/// Side length the frame is scaled to before cropping.
pub const RESIZE_SIZE: u32 = 256;
/// Side length of the classifier input.
pub const INPUT_SIZE: u32 = 224;
/// Offset of the center crop on both axes.
pub const CROP_OFFSET: u32 = (RESIZE_SIZE - INPUT_SIZE) / 2;

/// Torchvision normalization constants the classifier was trained with.
pub const NORM_MEAN_RGB: [f32; 3] = [0.485, 0.456, 0.406];
pub const NORM_STD_RGB: [f32; 3] = [0.229, 0.224, 0.225];

/// Classifier input derived from a single frame.
///
/// `tensor` is laid out CHW (all red values, then green, then blue), row-major within a
/// channel. `evidence` is the cropped RGB image, shared with any alert raised for this tick.
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    tensor: Vec<f32>,
    evidence: Arc<RgbImage>,
}

impl PreprocessedImage {
    pub fn tensor(&self) -> &[f32] {
        &self.tensor
    }

    pub fn shape(&self) -> [usize; 4] {
        [1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize]
    }

    pub fn evidence(&self) -> Arc<RgbImage> {
        Arc::clone(&self.evidence)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    pub fn new() -> Self {
        Self
    }

    pub fn preprocess(&self, frame: &Frame) -> Result<PreprocessedImage, PreprocessingError> {
        if frame.is_empty() {
            return Err(PreprocessingError::EmptyFrame {
                width: frame.width(),
                height: frame.height(),
            });
        }

        let resized = frame
            .image()
            .resize_exact(RESIZE_SIZE, RESIZE_SIZE, FilterType::Triangle);
        let cropped = resized
            .crop_imm(CROP_OFFSET, CROP_OFFSET, INPUT_SIZE, INPUT_SIZE)
            .to_rgb8();

        debug!(
            "Preprocessed frame {} ({}x{}) into {}x{} input",
            frame.frame_id(),
            frame.width(),
            frame.height(),
            INPUT_SIZE,
            INPUT_SIZE
        );

        Ok(PreprocessedImage {
            tensor: normalize(&cropped),
            evidence: Arc::new(cropped),
        })
    }
}

fn normalize(image: &RgbImage) -> Vec<f32> {
    let plane = (image.width() * image.height()) as usize;
    let mut tensor = vec![0.0f32; plane * 3];
    for (idx, pixel) in image.pixels().enumerate() {
        for channel in 0..3 {
            let value = f32::from(pixel.0[channel]) / 255.0;
            tensor[channel * plane + idx] =
                (value - NORM_MEAN_RGB[channel]) / NORM_STD_RGB[channel];
        }
    }
    tensor
}
