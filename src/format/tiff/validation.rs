//! Checks that a parsed pyramid can be read by this crate.
//!
//! Supported subset:
//! - **Organization**: tiled levels only (associated images may be stripped)
//! - **Compression**: JPEG, plus JPEG 2000 with the `jpeg2000` feature
//! - **Structure**: every level has TileOffsets and TileByteCounts
//!
//! Problems are collected rather than returned one at a time so the `info`
//! command can list everything wrong with a file.

use crate::error::TiffError;

use super::pyramid::{PyramidLevel, TiffPyramid};
use super::tags::{compression_name, Compression};

/// Largest tile edge accepted without a warning
const LARGE_TILE_DIMENSION: u32 = 4096;

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// The first error as a TiffError, or Ok(()) if valid.
    pub fn into_result(self) -> Result<(), TiffError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    UnsupportedCompression {
        ifd_index: usize,
        compression: u16,
        compression_name: String,
    },

    MissingTileTags {
        ifd_index: usize,
        missing_tags: Vec<&'static str>,
    },

    /// No tiled IFD qualified as a pyramid level
    NoPyramidLevels {
        /// Whether any IFD used strips, which explains the absence of levels
        has_strips: bool,
    },
}

impl From<ValidationError> for TiffError {
    fn from(error: ValidationError) -> Self {
        match error {
            ValidationError::UnsupportedCompression {
                compression_name, ..
            } => TiffError::UnsupportedCompression(compression_name),
            ValidationError::MissingTileTags { missing_tags, .. } => {
                TiffError::MissingTag(missing_tags.first().copied().unwrap_or("TileOffsets"))
            }
            ValidationError::NoPyramidLevels { has_strips: true } => TiffError::StripOrganization,
            ValidationError::NoPyramidLevels { has_strips: false } => {
                TiffError::MissingTag("TileWidth")
            }
        }
    }
}

/// Validate one pyramid level.
pub fn validate_level(level: &PyramidLevel) -> ValidationResult {
    let mut result = ValidationResult::default();

    let supported = Compression::from_u16(level.compression)
        .map(Compression::is_supported)
        .unwrap_or(false);
    if !supported {
        result.add_error(ValidationError::UnsupportedCompression {
            ifd_index: level.ifd_index,
            compression: level.compression,
            compression_name: compression_name(level.compression),
        });
    }

    let mut missing = Vec::new();
    if level.tile_offsets_entry.is_none() {
        missing.push("TileOffsets");
    }
    if level.tile_byte_counts_entry.is_none() {
        missing.push("TileByteCounts");
    }
    if !missing.is_empty() {
        result.add_error(ValidationError::MissingTileTags {
            ifd_index: level.ifd_index,
            missing_tags: missing,
        });
    }

    if level.tile_width > LARGE_TILE_DIMENSION || level.tile_height > LARGE_TILE_DIMENSION {
        result.add_warning(format!(
            "Level {}: large tiles ({}x{}) are decoded whole for every region read",
            level.level_index, level.tile_width, level.tile_height
        ));
    }

    if level.tile_width % 16 != 0 || level.tile_height % 16 != 0 {
        result.add_warning(format!(
            "Level {}: tile size {}x{} is not a multiple of 16",
            level.level_index, level.tile_width, level.tile_height
        ));
    }

    if level.compression == Compression::Jpeg as u16 && level.jpeg_tables_entry.is_none() {
        result.add_warning(format!(
            "Level {}: no JPEGTables tag, tiles must carry their own tables",
            level.level_index
        ));
    }

    result
}

/// Validate every level of a pyramid.
pub fn validate_pyramid(pyramid: &TiffPyramid) -> ValidationResult {
    let mut result = ValidationResult::default();

    if pyramid.levels.is_empty() {
        let has_strips = pyramid.ifds.iter().any(|ifd| ifd.is_stripped());
        result.add_error(ValidationError::NoPyramidLevels { has_strips });
        return result;
    }

    for level in &pyramid.levels {
        result.merge(validate_level(level));
    }

    result
}

// =============================================================================
// Tests
// =============================================================================
