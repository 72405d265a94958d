//! Generic pyramidal TIFF reader.
//!
//! # Supported Files
//!
//! This reader supports TIFF files that:
//! - Use tiled organization for the pyramid (strips only for associated images)
//! - Use JPEG compression, or JPEG 2000 with the `jpeg2000` feature
//! - Store resolution levels as separate IFDs in the main chain
//!
//! # Unsupported Files
//!
//! Files that don't meet these requirements are rejected on open:
//! - Strip-based TIFFs
//! - Other compressions (LZW, Deflate, uncompressed)

use async_trait::async_trait;
use tracing::debug;

use crate::error::TiffError;
use crate::io::RangeReader;
use crate::slide::SlideReader;

use super::level::{LevelData, Tile};
use super::properties::{read_tiff_properties, SlideProperties, PROPERTY_VENDOR};
use super::tiff::{validate_pyramid, TiffHeader, TiffPyramid, ValidationResult};

/// Reader for generic pyramidal TIFF files.
///
/// It validates the file structure on open and rejects unsupported configurations.
#[derive(Debug)]
pub struct GenericTiffReader {
    pyramid: TiffPyramid,
    levels: Vec<LevelData>,
    properties: SlideProperties,

    /// Validation warnings (non-fatal issues)
    warnings: Vec<String>,
}

impl GenericTiffReader {
    /// Open a generic pyramidal TIFF file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file is not a valid TIFF
    /// - The file uses strip organization (not tiles)
    /// - A level uses unsupported compression
    pub async fn open<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let (reader, _) = Self::open_with_validation(reader).await?;
        Ok(reader)
    }

    /// Like `open()` but also returns the full validation result.
    pub async fn open_with_validation<R: RangeReader>(
        reader: &R,
    ) -> Result<(Self, ValidationResult), TiffError> {
        let pyramid = TiffPyramid::parse(reader).await?;
        Self::from_pyramid(reader, pyramid).await
    }

    /// Build the reader from an already-parsed pyramid.
    pub async fn from_pyramid<R: RangeReader>(
        reader: &R,
        pyramid: TiffPyramid,
    ) -> Result<(Self, ValidationResult), TiffError> {
        let validation = validate_pyramid(&pyramid);
        validation.clone().into_result()?;

        let levels = LevelData::load_all(reader, &pyramid).await?;

        let mut properties = read_tiff_properties(reader, &pyramid).await?;
        properties.insert(PROPERTY_VENDOR, "generic-tiff");
        properties.add_levels(&pyramid.levels);

        debug!(
            file = reader.identifier(),
            levels = levels.len(),
            warnings = validation.warnings.len(),
            "opened generic TIFF slide"
        );

        let generic = GenericTiffReader {
            pyramid,
            levels,
            properties,
            warnings: validation.warnings.clone(),
        };
        Ok((generic, validation))
    }

    pub fn header(&self) -> &TiffHeader {
        &self.pyramid.header
    }

    pub fn pyramid(&self) -> &TiffPyramid {
        &self.pyramid
    }

    pub fn properties(&self) -> &SlideProperties {
        &self.properties
    }

    /// Get validation warnings from file open.
    ///
    /// Warnings indicate non-fatal issues like unusual tile dimensions.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn get_level(&self, level: usize) -> Option<&LevelData> {
        self.levels.get(level)
    }
}

#[async_trait]
impl SlideReader for GenericTiffReader {
    fn level_count(&self) -> usize {
        self.levels.len()
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.levels.first().map(|l| (l.level.width, l.level.height))
    }

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.levels.get(level).map(|l| (l.level.width, l.level.height))
    }

    fn level_downsample(&self, level: usize) -> Option<f64> {
        self.levels.get(level).map(|l| l.level.downsample)
    }

    fn tile_size(&self, level: usize) -> Option<(u32, u32)> {
        self.levels
            .get(level)
            .map(|l| (l.level.tile_width, l.level.tile_height))
    }

    fn tile_count(&self, level: usize) -> Option<(u32, u32)> {
        self.levels
            .get(level)
            .map(|l| (l.level.tiles_x, l.level.tiles_y))
    }

    fn best_level_for_downsample(&self, downsample: f64) -> Option<usize> {
        self.pyramid
            .best_level_for_downsample(downsample)
            .map(|l| l.level_index)
    }

    async fn read_tile<R: RangeReader>(
        &self,
        reader: &R,
        level: usize,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Tile, TiffError> {
        let level_data = self.levels.get(level).ok_or(TiffError::InvalidTagValue {
            tag: "level",
            message: format!("level {} out of range (max {})", level, self.levels.len()),
        })?;
        level_data.read_tile(reader, tile_x, tile_y).await
    }
}

// =============================================================================
// Tests
// =============================================================================
