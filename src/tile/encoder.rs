//! Image encoding for tiles and regions written to disk or stdout.
//!
//! The output format is chosen from the file extension the caller writes to.
//! JPEG and PNG are supported; JPEG quality is configurable.

use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};

use crate::error::SlideError;

/// Default JPEG quality (1-100).
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Minimum allowed JPEG quality.
pub const MIN_JPEG_QUALITY: u8 = 1;

/// Maximum allowed JPEG quality.
pub const MAX_JPEG_QUALITY: u8 = 100;

/// Raster format of an encoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    /// Infer the format from a path's extension (case-insensitive).
    ///
    /// Only `jpg`, `jpeg` and `png` are recognized.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            _ => None,
        }
    }

    const fn image_format(self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
        }
    }
}

// =============================================================================
// Encoder
// =============================================================================

/// Encodes RGB images as JPEG or PNG.
///
/// # Example
///
/// ```
/// use eozin::tile::{ImageEncoder, OutputFormat};
/// use image::RgbImage;
///
/// let encoder = ImageEncoder::with_quality(85);
/// let png = encoder.encode(&RgbImage::new(4, 4), OutputFormat::Png).unwrap();
/// assert_eq!(&png[1..4], b"PNG");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ImageEncoder {
    quality: u8,
}

impl ImageEncoder {
    pub fn new() -> Self {
        Self::with_quality(DEFAULT_JPEG_QUALITY)
    }

    /// Encoder writing JPEG at `quality`, clamped to 1-100.
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: clamp_quality(quality),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode an image in the given format.
    pub fn encode(&self, image: &RgbImage, format: OutputFormat) -> Result<Bytes, SlideError> {
        let mut output = Vec::new();
        match format {
            OutputFormat::Jpeg => {
                let mut encoder = JpegEncoder::new_with_quality(&mut output, self.quality);
                encoder
                    .encode_image(image)
                    .map_err(|e| SlideError::Encode {
                        message: e.to_string(),
                    })?;
            }
            OutputFormat::Png => {
                image
                    .write_to(&mut Cursor::new(&mut output), format.image_format())
                    .map_err(|e| SlideError::Encode {
                        message: e.to_string(),
                    })?;
            }
        }
        Ok(Bytes::from(output))
    }

    /// Encode an image and write it to `path`, choosing the format from the
    /// extension.
    pub async fn save(&self, image: &RgbImage, path: impl AsRef<Path>) -> Result<(), SlideError> {
        let path = path.as_ref();
        let format =
            OutputFormat::from_path(path).ok_or_else(|| SlideError::UnsupportedOutputFormat {
                path: path.display().to_string(),
            })?;

        let encoded = self.encode(image, format)?;
        tokio::fs::write(path, &encoded)
            .await
            .map_err(|e| SlideError::Output {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }
}

impl Default for ImageEncoder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Validate JPEG quality parameter.
///
/// Returns `true` if quality is in the valid range (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_JPEG_QUALITY..=MAX_JPEG_QUALITY).contains(&quality)
}

/// Clamp quality to valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_JPEG_QUALITY, MAX_JPEG_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
