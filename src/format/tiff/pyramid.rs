//! TIFF pyramid level identification.
//!
//! A slide file holds several IFDs. The tiled ones are the resolution
//! levels of the image pyramid; stripped ones are associated images
//! (thumbnail, label, macro) and are kept aside.
//!
//! # Level Rules
//!
//! 1. The IFD is tiled and has TileOffsets/TileByteCounts plus dimensions
//! 2. Levels are ordered by area, largest first, so level 0 is full resolution
//! 3. A level whose X and Y downsample disagree by more than 20% belongs
//!    to a different image (e.g. a tiled macro) and is skipped

use std::collections::HashSet;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::tags::{Compression, TiffTag};
use super::values::ValueReader;

// =============================================================================
// Constants
// =============================================================================

/// Maximum number of IFDs to follow in the chain
const MAX_IFDS: usize = 256;

/// Allowed disagreement between X and Y downsample
const DOWNSAMPLE_AXIS_TOLERANCE: f64 = 0.2;

/// Below this size rounding dominates the downsample ratio
const MIN_CHECKED_DIMENSION: u32 = 64;

// =============================================================================
// PyramidLevel
// =============================================================================

/// A single level in the image pyramid.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    /// Index of this level in the pyramid (0 = highest resolution)
    pub level_index: usize,

    /// Index of the IFD in the file's IFD chain
    pub ifd_index: usize,

    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,

    /// Number of tiles in X direction
    pub tiles_x: u32,

    /// Number of tiles in Y direction
    pub tiles_y: u32,

    pub tile_count: u32,

    /// Downsample factor relative to level 0 (1.0 for level 0)
    pub downsample: f64,

    /// Raw compression value (7 = JPEG, 33003/33005 = JPEG 2000)
    pub compression: u16,

    /// Raw PhotometricInterpretation value, if present
    pub photometric: Option<u16>,

    pub tile_offsets_entry: Option<IfdEntry>,
    pub tile_byte_counts_entry: Option<IfdEntry>,
    pub jpeg_tables_entry: Option<IfdEntry>,
}

impl PyramidLevel {
    /// Build a level from a tiled IFD.
    ///
    /// Returns None if the IFD lacks dimensions or has zero-sized tiles.
    pub fn from_ifd(ifd: &Ifd, ifd_index: usize, byte_order: ByteOrder) -> Option<Self> {
        let tile_width = ifd.tile_width(byte_order).filter(|&w| w > 0)?;
        let tile_height = ifd.tile_height(byte_order).filter(|&h| h > 0)?;
        let width = ifd.image_width(byte_order).filter(|&w| w > 0)?;
        let height = ifd.image_height(byte_order).filter(|&h| h > 0)?;

        // TIFF default is no compression; slides always carry the tag
        let compression = ifd
            .compression(byte_order)
            .unwrap_or(Compression::None as u16);

        let tiles_x = width.div_ceil(tile_width);
        let tiles_y = height.div_ceil(tile_height);

        Some(PyramidLevel {
            level_index: 0,
            ifd_index,
            width,
            height,
            tile_width,
            tile_height,
            tiles_x,
            tiles_y,
            tile_count: tiles_x.saturating_mul(tiles_y),
            downsample: 1.0,
            compression,
            photometric: ifd.photometric(byte_order),
            tile_offsets_entry: ifd.get_entry_by_tag(TiffTag::TileOffsets).cloned(),
            tile_byte_counts_entry: ifd.get_entry_by_tag(TiffTag::TileByteCounts).cloned(),
            jpeg_tables_entry: ifd.get_entry_by_tag(TiffTag::JpegTables).cloned(),
        })
    }

    pub fn has_tile_data(&self) -> bool {
        self.tile_offsets_entry.is_some() && self.tile_byte_counts_entry.is_some()
    }

    /// Row-major tile index, None when out of the grid.
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> Option<u32> {
        if tile_x >= self.tiles_x || tile_y >= self.tiles_y {
            return None;
        }
        Some(tile_y * self.tiles_x + tile_x)
    }

    /// Pixel size of the image area a tile covers.
    ///
    /// Stored tiles are always full size; in the last column and row only
    /// this much of the tile lies inside the image.
    pub fn tile_dimensions(&self, tile_x: u32, tile_y: u32) -> Option<(u32, u32)> {
        self.tile_index(tile_x, tile_y)?;
        let w = (self.width - tile_x * self.tile_width).min(self.tile_width);
        let h = (self.height - tile_y * self.tile_height).min(self.tile_height);
        Some((w, h))
    }
}

// =============================================================================
// TiffPyramid
// =============================================================================

/// All IFDs of a TIFF file, with the pyramid levels identified.
#[derive(Debug, Clone)]
pub struct TiffPyramid {
    pub header: TiffHeader,

    /// Every IFD in chain order
    pub ifds: Vec<Ifd>,

    /// Pyramid levels, sorted by resolution (0 = highest)
    pub levels: Vec<PyramidLevel>,

    /// Indices into `ifds` of images that are not pyramid levels
    pub other_ifds: Vec<usize>,
}

impl TiffPyramid {
    /// Read the header and every IFD, then identify the pyramid levels.
    pub async fn parse<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let header_len = (BIGTIFF_HEADER_SIZE as u64).min(reader.size()) as usize;
        let header_bytes = reader.read_exact_at(0, header_len).await?;
        let header = TiffHeader::parse(&header_bytes, reader.size())?;

        let ifds = parse_all_ifds(reader, &header).await?;
        Ok(Self::from_ifds(header, ifds))
    }

    /// Identify pyramid levels among already-parsed IFDs.
    pub fn from_ifds(header: TiffHeader, ifds: Vec<Ifd>) -> Self {
        let byte_order = header.byte_order;

        let mut candidates = Vec::new();
        let mut other_ifds = Vec::new();

        for (ifd_index, ifd) in ifds.iter().enumerate() {
            match PyramidLevel::from_ifd(ifd, ifd_index, byte_order) {
                Some(level) if ifd.is_tiled() && level.has_tile_data() => candidates.push(level),
                _ => other_ifds.push(ifd_index),
            }
        }

        // Stable: equal areas keep file order
        candidates.sort_by_key(|l| std::cmp::Reverse(l.width as u64 * l.height as u64));

        let mut levels: Vec<PyramidLevel> = Vec::with_capacity(candidates.len());
        for mut level in candidates {
            let Some(base) = levels.first() else {
                levels.push(level);
                continue;
            };

            let downsample_x = base.width as f64 / level.width as f64;
            let downsample_y = base.height as f64 / level.height as f64;

            let checked = level.width.min(level.height) >= MIN_CHECKED_DIMENSION;
            if checked && (downsample_x / downsample_y - 1.0).abs() > DOWNSAMPLE_AXIS_TOLERANCE {
                debug!(
                    ifd = level.ifd_index,
                    width = level.width,
                    height = level.height,
                    "tiled IFD does not match pyramid aspect ratio, skipping"
                );
                other_ifds.push(level.ifd_index);
                continue;
            }

            level.level_index = levels.len();
            level.downsample = (downsample_x + downsample_y) / 2.0;
            levels.push(level);
        }
        other_ifds.sort_unstable();

        TiffPyramid {
            header,
            ifds,
            levels,
            other_ifds,
        }
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn get_level(&self, level: usize) -> Option<&PyramidLevel> {
        self.levels.get(level)
    }

    /// The full-resolution level.
    pub fn base_level(&self) -> Option<&PyramidLevel> {
        self.levels.first()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.base_level().map(|l| (l.width, l.height))
    }

    /// First IFD of the file, where slide-wide metadata lives.
    pub fn first_ifd(&self) -> Option<&Ifd> {
        self.ifds.first()
    }

    /// Find the level to read from for a target downsample.
    ///
    /// This is the lowest-resolution level that is still at least as
    /// detailed as requested, i.e. the largest downsample not above the
    /// target. Targets below 1.0 map to level 0.
    pub fn best_level_for_downsample(&self, downsample: f64) -> Option<&PyramidLevel> {
        let base = self.base_level()?;
        if downsample.is_nan() {
            return Some(base);
        }
        // Small tolerance for levels like 3.999 vs 4.0
        let limit = downsample * 1.001;
        Some(
            self.levels
                .iter()
                .rev()
                .find(|l| l.downsample <= limit)
                .unwrap_or(base),
        )
    }
}

/// Follow the IFD chain from the header's first offset.
///
/// Stops at a zero offset, after `MAX_IFDS`, or when an offset repeats.
async fn parse_all_ifds<R: RangeReader>(
    reader: &R,
    header: &TiffHeader,
) -> Result<Vec<Ifd>, TiffError> {
    let mut ifds = Vec::new();
    let mut seen = HashSet::new();
    let mut offset = header.first_ifd_offset;

    while offset != 0 {
        if ifds.len() >= MAX_IFDS {
            warn!(
                file = reader.identifier(),
                "IFD chain longer than {} entries, ignoring the rest", MAX_IFDS
            );
            break;
        }
        if !seen.insert(offset) {
            warn!(file = reader.identifier(), offset, "IFD chain loops, stopping");
            break;
        }
        if offset >= reader.size() {
            return Err(TiffError::InvalidIfdOffset(offset));
        }

        let count_bytes = reader.read_exact_at(offset, header.ifd_count_size()).await?;
        let entry_count = header.read_entry_count(&count_bytes);
        if entry_count > super::parser::MAX_IFD_ENTRIES {
            return Err(TiffError::InvalidTagValue {
                tag: "IFD",
                message: format!("IFD at offset {} declares {} entries", offset, entry_count),
            });
        }

        let ifd_size = Ifd::calculate_size(entry_count, header);
        let ifd_bytes = reader.read_exact_at(offset, ifd_size).await?;
        let ifd = Ifd::parse(&ifd_bytes, header)?;

        offset = ifd.next_ifd_offset;
        ifds.push(ifd);
    }

    debug!(file = reader.identifier(), count = ifds.len(), "parsed IFD chain");
    Ok(ifds)
}

// =============================================================================
// Tile Data Loading
// =============================================================================

/// Tile locations and shared JPEG tables of one pyramid level.
#[derive(Debug, Clone)]
pub struct TileData {
    /// Byte offset of each tile in the file
    pub offsets: Vec<u64>,

    /// Byte count (size) of each tile
    pub byte_counts: Vec<u64>,

    /// JPEGTables data (if present)
    pub jpeg_tables: Option<Bytes>,
}

impl TileData {
    /// Load the TileOffsets, TileByteCounts and JPEGTables arrays of a level.
    pub async fn load<R: RangeReader>(
        reader: &R,
        level: &PyramidLevel,
        header: &TiffHeader,
    ) -> Result<Self, TiffError> {
        let values = ValueReader::new(reader, header);

        let offsets_entry = level
            .tile_offsets_entry
            .as_ref()
            .ok_or(TiffError::MissingTag("TileOffsets"))?;
        let counts_entry = level
            .tile_byte_counts_entry
            .as_ref()
            .ok_or(TiffError::MissingTag("TileByteCounts"))?;

        let offsets = values.read_u64_array(offsets_entry).await?;
        let byte_counts = values.read_u64_array(counts_entry).await?;

        // PlanarConfiguration=2 stores more entries than tiles; only the first plane is read
        let expected = level.tile_count as usize;
        if offsets.len() < expected || byte_counts.len() < expected {
            return Err(TiffError::InvalidTagValue {
                tag: "TileOffsets",
                message: format!(
                    "level {} needs {} tiles, found {} offsets and {} byte counts",
                    level.level_index,
                    expected,
                    offsets.len(),
                    byte_counts.len()
                ),
            });
        }

        let jpeg_tables = match level.jpeg_tables_entry {
            Some(ref entry) => Some(values.read_bytes(entry).await?),
            None => None,
        };

        Ok(TileData {
            offsets,
            byte_counts,
            jpeg_tables,
        })
    }

    /// Offset and size of a tile.
    pub fn get_tile_location(&self, tile_index: u32) -> Option<(u64, u64)> {
        let idx = tile_index as usize;
        Some((*self.offsets.get(idx)?, *self.byte_counts.get(idx)?))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::tiff::tags::FieldType;

    const LE: ByteOrder = ByteOrder::LittleEndian;

    fn header() -> TiffHeader {
        TiffHeader {
            byte_order: LE,
            is_bigtiff: false,
            first_ifd_offset: 8,
        }
    }

    fn long(tag: TiffTag, value: u32) -> IfdEntry {
        IfdEntry {
            tag_id: tag.as_u16(),
            field_type: Some(FieldType::Long),
            field_type_raw: 4,
            count: 1,
            value_offset_bytes: value.to_le_bytes().to_vec(),
            is_inline: true,
        }
    }

    fn array(tag: TiffTag, count: u64) -> IfdEntry {
        IfdEntry {
            count,
            is_inline: count == 1,
            ..long(tag, 0)
        }
    }

    fn tiled_ifd(width: u32, height: u32, tile: u32) -> Ifd {
        let tiles = (width.div_ceil(tile) * height.div_ceil(tile)) as u64;
        Ifd::from_entries(
            vec![
                long(TiffTag::ImageWidth, width),
                long(TiffTag::ImageLength, height),
                long(TiffTag::TileWidth, tile),
                long(TiffTag::TileLength, tile),
                long(TiffTag::Compression, 7),
                array(TiffTag::TileOffsets, tiles),
                array(TiffTag::TileByteCounts, tiles),
            ],
            0,
        )
    }

    fn stripped_ifd(width: u32, height: u32) -> Ifd {
        Ifd::from_entries(
            vec![
                long(TiffTag::ImageWidth, width),
                long(TiffTag::ImageLength, height),
                array(TiffTag::StripOffsets, 4),
            ],
            0,
        )
    }

    #[test]
    fn test_level_geometry() {
        let level = PyramidLevel::from_ifd(&tiled_ifd(1000, 700, 256), 0, LE).unwrap();

        assert_eq!((level.tiles_x, level.tiles_y, level.tile_count), (4, 3, 12));
        assert_eq!(level.tile_index(3, 2), Some(11));
        assert_eq!(level.tile_index(4, 0), None);
        assert_eq!(level.tile_dimensions(0, 0), Some((256, 256)));
        assert_eq!(level.tile_dimensions(3, 2), Some((232, 188)));
        assert_eq!(level.tile_dimensions(0, 3), None);
        assert_eq!(level.compression, 7);
        assert!(level.has_tile_data());
    }

    #[test]
    fn test_level_requires_dimensions() {
        let ifd = Ifd::from_entries(vec![long(TiffTag::TileWidth, 256)], 0);
        assert!(PyramidLevel::from_ifd(&ifd, 0, LE).is_none());

        let zero_tiles = Ifd::from_entries(
            vec![
                long(TiffTag::ImageWidth, 512),
                long(TiffTag::ImageLength, 512),
                long(TiffTag::TileWidth, 0),
                long(TiffTag::TileLength, 0),
                long(TiffTag::Compression, 7),
            ],
            0,
        );
        assert!(PyramidLevel::from_ifd(&zero_tiles, 0, LE).is_none());

        let zero_width = tiled_ifd(0, 512, 256);
        assert!(PyramidLevel::from_ifd(&zero_width, 0, LE).is_none());
    }

    #[test]
    fn test_svs_layout() {
        // Aperio order: base, thumbnail (stripped), reduced levels, label, macro
        let ifds = vec![
            tiled_ifd(46000, 32914, 240),
            stripped_ifd(1024, 732),
            tiled_ifd(11500, 8228, 240),
            tiled_ifd(2875, 2057, 240),
            stripped_ifd(387, 463),
            stripped_ifd(1280, 431),
        ];

        let pyramid = TiffPyramid::from_ifds(header(), ifds);

        assert_eq!(pyramid.level_count(), 3);
        assert_eq!(pyramid.dimensions(), Some((46000, 32914)));
        assert_eq!(pyramid.other_ifds, vec![1, 4, 5]);

        let ifd_indices: Vec<usize> = pyramid.levels.iter().map(|l| l.ifd_index).collect();
        assert_eq!(ifd_indices, vec![0, 2, 3]);

        let downsample = pyramid.get_level(1).unwrap().downsample;
        assert!((downsample - 4.0).abs() < 0.01);
        assert!((pyramid.get_level(2).unwrap().downsample - 16.0).abs() < 0.05);
    }

    #[test]
    fn test_levels_sorted_by_area() {
        let ifds = vec![
            tiled_ifd(1024, 1024, 256),
            tiled_ifd(4096, 4096, 256),
            tiled_ifd(2048, 2048, 256),
        ];
        let pyramid = TiffPyramid::from_ifds(header(), ifds);

        let widths: Vec<u32> = pyramid.levels.iter().map(|l| l.width).collect();
        assert_eq!(widths, vec![4096, 2048, 1024]);
        assert_eq!(pyramid.levels[2].level_index, 2);
        assert_eq!(pyramid.levels[2].ifd_index, 0);
    }

    #[test]
    fn test_mismatched_aspect_is_not_a_level() {
        let ifds = vec![tiled_ifd(8000, 8000, 256), tiled_ifd(2000, 600, 256)];
        let pyramid = TiffPyramid::from_ifds(header(), ifds);

        assert_eq!(pyramid.level_count(), 1);
        assert_eq!(pyramid.other_ifds, vec![1]);
    }

    #[test]
    fn test_tiny_levels_are_kept() {
        let ifds = vec![tiled_ifd(1000, 300, 256), tiled_ifd(125, 37, 256)];
        let pyramid = TiffPyramid::from_ifds(header(), ifds);
        assert_eq!(pyramid.level_count(), 2);
    }

    #[test]
    fn test_best_level_for_downsample() {
        let ifds = vec![
            tiled_ifd(8192, 8192, 256),
            tiled_ifd(2048, 2048, 256),
            tiled_ifd(512, 512, 256),
        ];
        let pyramid = TiffPyramid::from_ifds(header(), ifds);
        let best = |d: f64| pyramid.best_level_for_downsample(d).unwrap().level_index;

        assert_eq!(best(0.5), 0);
        assert_eq!(best(1.0), 0);
        assert_eq!(best(3.9), 0);
        assert_eq!(best(4.0), 1);
        assert_eq!(best(15.0), 1);
        assert_eq!(best(16.0), 2);
        assert_eq!(best(1000.0), 2);
        assert_eq!(best(f64::NAN), 0);
    }

    #[test]
    fn test_empty_pyramid() {
        let pyramid = TiffPyramid::from_ifds(header(), vec![stripped_ifd(100, 100)]);
        assert_eq!(pyramid.level_count(), 0);
        assert!(pyramid.dimensions().is_none());
        assert!(pyramid.best_level_for_downsample(1.0).is_none());
    }

    #[test]
    fn test_tile_location() {
        let data = TileData {
            offsets: vec![100, 200],
            byte_counts: vec![50, 60],
            jpeg_tables: None,
        };
        assert_eq!(data.get_tile_location(1), Some((200, 60)));
        assert_eq!(data.get_tile_location(2), None);
    }
}
