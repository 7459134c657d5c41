//! Photo re-encoding before upload.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;

use super::files::VisitorFile;
use crate::errors::VisitorflowError;

/// Shrinks or re-encodes an image before it is uploaded.
pub trait ImageOptimizer: Send + Sync {
    /// Returns the optimised file.
    fn optimize(&self, file: &VisitorFile) -> Result<VisitorFile, VisitorflowError>;
}

/// Uploads images untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughOptimizer;

impl ImageOptimizer for PassthroughOptimizer {
    fn optimize(&self, file: &VisitorFile) -> Result<VisitorFile, VisitorflowError> {
        Ok(file.clone())
    }
}

/// Fits images inside a square box and re-encodes them as JPEG.
#[derive(Debug, Clone, Copy)]
pub struct ResizingOptimizer {
    max_dimension: u32,
    quality: u8,
}

impl Default for ResizingOptimizer {
    fn default() -> Self {
        Self {
            max_dimension: 800,
            quality: 85,
        }
    }
}

impl ResizingOptimizer {
    /// Creates an optimizer with the given bounds.
    #[must_use]
    pub fn new(max_dimension: u32, quality: u8) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    fn decode(bytes: &[u8]) -> Result<DynamicImage, VisitorflowError> {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| VisitorflowError::Upload(format!("Failed to guess image format: {e}")))?
            .decode()
            .map_err(|e| VisitorflowError::Upload(format!("Failed to decode image: {e}")))
    }
}

impl ImageOptimizer for ResizingOptimizer {
    fn optimize(&self, file: &VisitorFile) -> Result<VisitorFile, VisitorflowError> {
        let img = Self::decode(&file.bytes)?;

        // Smaller images keep their size.
        let img = if img.width() > self.max_dimension || img.height() > self.max_dimension {
            img.resize(self.max_dimension, self.max_dimension, FilterType::Lanczos3)
        } else {
            img
        };

        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, self.quality))
            .map_err(|e| VisitorflowError::Upload(format!("Failed to encode JPEG: {e}")))?;

        Ok(VisitorFile {
            bytes,
            mime_type: "image/jpeg".to_string(),
            filename: file.filename.clone(),
            column_id: file.column_id.clone(),
        })
    }
}
