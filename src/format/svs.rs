//! Aperio SVS format reader.
//!
//! This module provides support for reading Aperio SVS files, a TIFF-based
//! format commonly used for whole slide imaging.
//!
//! # SVS File Structure
//!
//! SVS files are TIFF files containing:
//! - **Pyramid levels**: Full resolution image and progressively smaller versions
//! - **Thumbnail**: Small stripped preview image, second in the IFD chain
//! - **Label and macro**: Stripped images at the end of the chain
//!
//! # Tile Encoding
//!
//! Tiles are abbreviated JPEG streams whose tables live in `JPEGTables`, or
//! JPEG 2000 codestreams (compression 33003/33005). Some scanners write JPEG
//! with RGB components, signalled by PhotometricInterpretation = RGB.
//!
//! # Metadata
//!
//! SVS files store metadata in the ImageDescription tag, including:
//! - Microns per pixel (MPP)
//! - Objective magnification (AppMag)
//! - Scanner information

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use crate::error::TiffError;
use crate::io::RangeReader;
use crate::slide::SlideReader;

use super::level::{LevelData, Tile};
use super::properties::{
    read_tiff_properties, SlideProperties, PROPERTY_MPP_X, PROPERTY_MPP_Y,
    PROPERTY_OBJECTIVE_POWER, PROPERTY_VENDOR,
};
use super::tiff::{validate_pyramid, TiffHeader, TiffPyramid, ValidationResult};

// =============================================================================
// SVS Metadata
// =============================================================================

/// Parsed metadata from an SVS file.
///
/// SVS files store metadata in the ImageDescription tag as a pipe-separated
/// string with key=value pairs.
#[derive(Debug, Clone, Default)]
pub struct SvsMetadata {
    /// Microns per pixel (resolution)
    pub mpp: Option<f64>,

    /// Objective magnification (e.g., 20, 40)
    pub magnification: Option<f64>,

    /// Scanner vendor name
    pub vendor: Option<String>,

    /// First segment of the description (library version and geometry)
    pub header: Option<String>,

    /// Key-value pairs from ImageDescription
    pub properties: HashMap<String, String>,
}

impl SvsMetadata {
    /// Parse metadata from an ImageDescription string.
    ///
    /// SVS ImageDescription format:
    /// ```text
    /// Aperio Image Library vXX.X.X
    /// 46920x33600 [0,100 46000x32914] (256x256) JPEG/RGB Q=70|AppMag = 20|MPP = 0.5|...
    /// ```
    ///
    /// The first segment is free text (it may itself contain `=`); the
    /// remaining pipe-separated segments are `key = value` pairs.
    pub fn parse(description: &str) -> Self {
        let mut metadata = SvsMetadata::default();

        if description.contains("Aperio") {
            metadata.vendor = Some("Aperio".to_string());
        }

        let mut parts = description.split('|');
        metadata.header = parts
            .next()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string);

        for part in parts {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() {
                continue;
            }

            match key {
                "MPP" => metadata.mpp = value.parse::<f64>().ok(),
                "AppMag" => metadata.magnification = value.parse::<f64>().ok(),
                _ => {}
            }

            metadata
                .properties
                .insert(key.to_string(), value.to_string());
        }

        metadata
    }

    /// Copy the metadata into slide properties.
    fn apply_to(&self, properties: &mut SlideProperties) {
        properties.insert(PROPERTY_VENDOR, "aperio");
        for (key, value) in &self.properties {
            properties.insert(format!("aperio.{}", key), value.as_str());
        }
        if let Some(mpp) = self.mpp {
            properties.insert(PROPERTY_MPP_X, mpp.to_string());
            properties.insert(PROPERTY_MPP_Y, mpp.to_string());
        }
        if let Some(magnification) = self.magnification {
            properties.insert(PROPERTY_OBJECTIVE_POWER, magnification.to_string());
        }
    }
}

// =============================================================================
// SVS Reader
// =============================================================================

/// Reader for Aperio SVS files.
///
/// This provides access to the image pyramid and hands out tiles ready for
/// decoding.
#[derive(Debug)]
pub struct SvsReader {
    /// Parsed TIFF pyramid structure
    pyramid: TiffPyramid,

    /// Level data including tile offsets and JPEGTables
    levels: Vec<LevelData>,

    /// Parsed SVS metadata
    metadata: SvsMetadata,

    properties: SlideProperties,

    warnings: Vec<String>,
}

impl SvsReader {
    /// Open an SVS file and parse its structure.
    ///
    /// This reads the TIFF structure, identifies pyramid levels,
    /// loads tile offset arrays, and caches JPEGTables for each level.
    pub async fn open<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let pyramid = TiffPyramid::parse(reader).await?;
        Self::from_pyramid(reader, pyramid).await
    }

    /// Build the reader from an already-parsed pyramid.
    pub async fn from_pyramid<R: RangeReader>(
        reader: &R,
        pyramid: TiffPyramid,
    ) -> Result<Self, TiffError> {
        let validation: ValidationResult = validate_pyramid(&pyramid);
        let warnings = validation.warnings.clone();
        validation.into_result()?;

        let levels = LevelData::load_all(reader, &pyramid).await?;

        let mut properties = read_tiff_properties(reader, &pyramid).await?;
        let metadata = properties
            .get("tiff.ImageDescription")
            .map(SvsMetadata::parse)
            .unwrap_or_default();
        metadata.apply_to(&mut properties);
        properties.add_levels(&pyramid.levels);

        debug!(
            file = reader.identifier(),
            levels = levels.len(),
            mpp = ?metadata.mpp,
            "opened Aperio slide"
        );

        Ok(SvsReader {
            pyramid,
            levels,
            metadata,
            properties,
            warnings,
        })
    }

    /// Get the TIFF header.
    pub fn header(&self) -> &TiffHeader {
        &self.pyramid.header
    }

    pub fn pyramid(&self) -> &TiffPyramid {
        &self.pyramid
    }

    /// Get the parsed SVS metadata.
    pub fn metadata(&self) -> &SvsMetadata {
        &self.metadata
    }

    pub fn properties(&self) -> &SlideProperties {
        &self.properties
    }

    /// Non-fatal problems found while validating the pyramid.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Get data for a specific pyramid level.
    pub fn get_level(&self, level: usize) -> Option<&LevelData> {
        self.levels.get(level)
    }
}

// =============================================================================
// SlideReader Implementation
// =============================================================================

#[async_trait]
impl SlideReader for SvsReader {
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
