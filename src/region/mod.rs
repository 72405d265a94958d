//! Pixel regions assembled from tiles.
//!
//! A region read goes through three steps:
//!
//! 1. [`RegionPlan`] maps the rectangle onto the level's tile grid
//! 2. Each tile in the plan is read and decoded (see [`crate::tile`])
//! 3. [`compose`] pastes the used part of every tile onto a white canvas
//!
//! The result is a [`Region`], which can be saved to a file whose extension
//! picks the output format.

mod plan;

use std::path::Path;

use bytes::Bytes;
use image::{imageops, RgbImage};

use crate::error::SlideError;
use crate::tile::{ImageEncoder, OutputFormat, BACKGROUND};

pub use plan::{RegionPlan, TilePatch};

/// Paste decoded tiles onto a background canvas following `plan`.
///
/// `tiles` pairs each patch with its decoded tile. Tiles smaller than the
/// nominal tile size only contribute the pixels they have.
pub fn compose<T: AsRef<RgbImage>>(plan: &RegionPlan, tiles: &[(TilePatch, T)]) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(plan.width, plan.height, BACKGROUND);

    for (patch, tile) in tiles {
        let tile = tile.as_ref();
        let piece = imageops::crop_imm(
            tile,
            patch.crop_x,
            patch.crop_y,
            patch.width,
            patch.height,
        )
        .to_image();
        imageops::replace(
            &mut canvas,
            &piece,
            patch.dest_x as i64,
            patch.dest_y as i64,
        );
    }

    canvas
}

// =============================================================================
// Region
// =============================================================================

/// RGB pixels read from one pyramid level.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    image: RgbImage,
    level: usize,
    origin: (u64, u64),
}

impl Region {
    pub fn new(image: RgbImage, level: usize, origin: (u64, u64)) -> Self {
        Self {
            image,
            level,
            origin,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Level the pixels were read from.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Top-left corner in the level's coordinates.
    pub fn origin(&self) -> (u64, u64) {
        self.origin
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Encode in memory.
    pub fn encode(&self, format: OutputFormat) -> Result<Bytes, SlideError> {
        ImageEncoder::new().encode(&self.image, format)
    }

    /// Write to `path`; `.jpg`/`.jpeg` and `.png` are supported.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SlideError> {
        ImageEncoder::new().save(&self.image, path).await
    }

    /// Write to `path`, with `quality` applying to JPEG output.
    pub async fn save_with_quality(
        &self,
        path: impl AsRef<Path>,
        quality: u8,
    ) -> Result<(), SlideError> {
        ImageEncoder::with_quality(quality)
            .save(&self.image, path)
            .await
    }
}
