//! Per-level tile access shared by the TIFF-based readers.
//!
//! A [`LevelData`] couples a [`PyramidLevel`] with its loaded tile arrays and
//! turns raw tile bytes into a [`Tile`] a decoder can consume.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::jpeg::prepare_tile_jpeg;
use super::tiff::{compression_name, Compression, Photometric, PyramidLevel, TiffPyramid, TileData};

// =============================================================================
// Tile
// =============================================================================

/// Encoded tile as stored in the file, ready for a decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tile {
    /// Complete JPEG stream (tables merged in)
    Jpeg(Bytes),

    /// JPEG 2000 codestream
    Jp2k {
        data: Bytes,
        /// Components are YCbCr and need conversion to RGB
        ycbcr: bool,
    },

    /// Tile with no stored data (byte count 0)
    Missing,
}

impl Tile {
    /// The encoded bytes, empty for a missing tile.
    pub fn data(&self) -> &[u8] {
        match self {
            Tile::Jpeg(data) | Tile::Jp2k { data, .. } => data,
            Tile::Missing => &[],
        }
    }

    pub fn codec_name(&self) -> &'static str {
        match self {
            Tile::Jpeg(_) => "JPEG",
            Tile::Jp2k { .. } => "JPEG 2000",
            Tile::Missing => "none",
        }
    }
}

// =============================================================================
// LevelData
// =============================================================================

/// A pyramid level together with its tile offsets and JPEG tables.
#[derive(Debug, Clone)]
pub struct LevelData {
    pub level: PyramidLevel,
    pub tile_data: TileData,
}

impl LevelData {
    /// Load tile arrays for every level of a pyramid.
    pub async fn load_all<R: RangeReader>(
        reader: &R,
        pyramid: &TiffPyramid,
    ) -> Result<Vec<Self>, TiffError> {
        let mut levels = Vec::with_capacity(pyramid.levels.len());
        for level in &pyramid.levels {
            let tile_data = TileData::load(reader, level, &pyramid.header).await?;
            levels.push(LevelData {
                level: level.clone(),
                tile_data,
            });
        }
        Ok(levels)
    }

    /// Get the offset and size for a specific tile.
    pub fn get_tile_location(&self, tile_x: u32, tile_y: u32) -> Option<(u64, u64)> {
        let tile_index = self.level.tile_index(tile_x, tile_y)?;
        self.tile_data.get_tile_location(tile_index)
    }

    pub fn jpeg_tables(&self) -> Option<&Bytes> {
        self.tile_data.jpeg_tables.as_ref()
    }

    /// JPEG tiles whose components are stored as RGB rather than YCbCr.
    pub fn is_rgb_coded(&self) -> bool {
        self.level.compression == Compression::Jpeg as u16
            && self.level.photometric.map(Photometric::from_u16) == Some(Photometric::Rgb)
    }

    /// Read the raw bytes of a tile.
    pub async fn read_raw_tile<R: RangeReader>(
        &self,
        reader: &R,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Bytes, TiffError> {
        let (offset, size) =
            self.get_tile_location(tile_x, tile_y)
                .ok_or_else(|| TiffError::InvalidTagValue {
                    tag: "TileOffsets",
                    message: format!(
                        "tile ({}, {}) out of range for level {}",
                        tile_x, tile_y, self.level.level_index
                    ),
                })?;

        if size == 0 {
            return Ok(Bytes::new());
        }
        let size = usize::try_from(size).map_err(|_| TiffError::InvalidTagValue {
            tag: "TileByteCounts",
            message: format!("tile of {} bytes is too large", size),
        })?;

        Ok(reader.read_exact_at(offset, size).await?)
    }

    /// Read a tile and prepare it for decoding.
    pub async fn read_tile<R: RangeReader>(
        &self,
        reader: &R,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Tile, TiffError> {
        let raw = self.read_raw_tile(reader, tile_x, tile_y).await?;
        if raw.is_empty() {
            return Ok(Tile::Missing);
        }
        self.wrap_tile(raw)
    }

    fn wrap_tile(&self, raw: Bytes) -> Result<Tile, TiffError> {
        match Compression::from_u16(self.level.compression) {
            Some(Compression::Jpeg) => {
                let tables = self.jpeg_tables().map(|t| t.as_ref());
                Ok(Tile::Jpeg(prepare_tile_jpeg(
                    tables,
                    &raw,
                    self.is_rgb_coded(),
                )))
            }
            Some(Compression::Jpeg2000YCbCr) => Ok(Tile::Jp2k {
                data: raw,
                ycbcr: true,
            }),
            Some(Compression::Jpeg2000Rgb) => Ok(Tile::Jp2k {
                data: raw,
                ycbcr: false,
            }),
            _ => Err(TiffError::UnsupportedCompression(compression_name(
                self.level.compression,
            ))),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
