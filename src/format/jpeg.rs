//! JPEG stream handling for tiles stored in TIFF files.
//!
//! # Abbreviated JPEG Streams
//!
//! Aperio SVS (and many tiled TIFF writers) store each tile as an
//! "abbreviated" JPEG: the quantization (DQT) and Huffman (DHT) tables are
//! stored once in the `JPEGTables` tag and left out of the tiles. Before a
//! tile can be decoded the two have to be spliced:
//!
//! ```text
//! tables: SOI DQT DHT ... EOI
//! tile:   SOI SOF SOS <scan> EOI
//! result: SOI DQT DHT ... SOF SOS <scan> EOI
//! ```
//!
//! # RGB-coded JPEG
//!
//! Decoders assume three-component JPEG is YCbCr. Aperio writes some slides
//! with RGB components (PhotometricInterpretation = RGB). An Adobe APP14
//! segment with transform 0 tells the decoder not to convert colors.

use bytes::{Bytes, BytesMut};

// =============================================================================
// JPEG Markers
// =============================================================================

/// Start Of Image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];

/// End Of Image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

const MARKER_SOI: u8 = 0xD8;
const MARKER_EOI: u8 = 0xD9;
const MARKER_SOS: u8 = 0xDA;
const MARKER_DQT: u8 = 0xDB;
const MARKER_DHT: u8 = 0xC4;
const MARKER_APP14: u8 = 0xEE;

/// Adobe APP14 segment declaring transform 0 (no color conversion)
const APP14_TRANSFORM_UNKNOWN: [u8; 16] = [
    0xFF, MARKER_APP14, 0x00, 0x0E, b'A', b'd', b'o', b'b', b'e', 0x00, 0x64, 0x00, 0x00, 0x00,
    0x00, 0x00,
];

/// Position of the transform flag inside an Adobe APP14 segment
const APP14_TRANSFORM_OFFSET: usize = 15;

// =============================================================================
// Segment Walking
// =============================================================================

/// A marker segment in the JPEG header area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    marker: u8,
    /// Offset of the 0xFF byte
    start: usize,
    /// Offset one past the end of the segment
    end: usize,
}

/// Walk marker segments after SOI, stopping after SOS or EOI.
///
/// Returns None if the data does not start with SOI or a segment runs past
/// the end of the data.
fn header_segments(data: &[u8]) -> Option<Vec<Segment>> {
    if data.len() < 2 || data[..2] != SOI {
        return None;
    }

    let mut segments = Vec::new();
    let mut pos = 2;

    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];

        // Fill bytes
        if marker == 0xFF {
            pos += 1;
            continue;
        }

        // Standalone markers carry no length
        if marker == MARKER_EOI || marker == MARKER_SOI || (0xD0..=0xD7).contains(&marker) {
            segments.push(Segment {
                marker,
                start: pos,
                end: pos + 2,
            });
            if marker == MARKER_EOI {
                break;
            }
            pos += 2;
            continue;
        }

        if pos + 3 >= data.len() {
            return None;
        }
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let end = pos + 2 + length;
        if length < 2 || end > data.len() {
            return None;
        }

        segments.push(Segment {
            marker,
            start: pos,
            end,
        });
        if marker == MARKER_SOS {
            break;
        }
        pos = end;
    }

    Some(segments)
}

// =============================================================================
// JPEG Stream Analysis
// =============================================================================

/// Check if JPEG data is an abbreviated stream (missing tables).
///
/// True when the stream reaches SOS without any DQT or DHT segment.
pub fn is_abbreviated_stream(data: &[u8]) -> bool {
    let Some(segments) = header_segments(data) else {
        return false;
    };
    let reaches_scan = segments.iter().any(|s| s.marker == MARKER_SOS);
    let has_tables = segments
        .iter()
        .any(|s| s.marker == MARKER_DQT || s.marker == MARKER_DHT);
    reaches_scan && !has_tables
}

/// Check if JPEG data carries its own quantization tables.
pub fn is_complete_stream(data: &[u8]) -> bool {
    header_segments(data)
        .map(|segments| segments.iter().any(|s| s.marker == MARKER_DQT))
        .unwrap_or(false)
}

/// Check if the header area contains an Adobe APP14 segment.
pub fn has_adobe_segment(data: &[u8]) -> bool {
    find_adobe_segment(data).is_some()
}

fn find_adobe_segment(data: &[u8]) -> Option<Segment> {
    header_segments(data)?.into_iter().find(|s| {
        s.marker == MARKER_APP14
            && s.end - s.start > APP14_TRANSFORM_OFFSET
            && &data[s.start + 4..s.start + 9] == b"Adobe"
    })
}

// =============================================================================
// Stream Rewriting
// =============================================================================

/// Merge JPEGTables with abbreviated tile data.
///
/// Strips EOI from the tables and SOI from the tile, then concatenates.
pub fn merge_jpeg_tables(tables: &[u8], tile_data: &[u8]) -> Bytes {
    if tables.is_empty() {
        return Bytes::copy_from_slice(tile_data);
    }
    if tile_data.is_empty() {
        return Bytes::new();
    }

    let tables = tables.strip_suffix(&EOI).unwrap_or(tables);
    let tile = tile_data.strip_prefix(&SOI).unwrap_or(tile_data);

    let mut result = BytesMut::with_capacity(tables.len() + tile.len());
    result.extend_from_slice(tables);
    result.extend_from_slice(tile);
    result.freeze()
}

/// Mark a JPEG stream as RGB-coded.
///
/// An existing Adobe APP14 segment gets its transform flag cleared; otherwise
/// one is inserted right after SOI. Data that is not a JPEG stream is
/// returned unchanged.
pub fn set_adobe_transform_unknown(data: &[u8]) -> Bytes {
    if let Some(segment) = find_adobe_segment(data) {
        let mut patched = data.to_vec();
        patched[segment.start + APP14_TRANSFORM_OFFSET] = 0;
        return Bytes::from(patched);
    }

    if data.len() < 2 || data[..2] != SOI {
        return Bytes::copy_from_slice(data);
    }

    let mut result = BytesMut::with_capacity(data.len() + APP14_TRANSFORM_UNKNOWN.len());
    result.extend_from_slice(&SOI);
    result.extend_from_slice(&APP14_TRANSFORM_UNKNOWN);
    result.extend_from_slice(&data[2..]);
    result.freeze()
}

/// Turn raw tile bytes into a stream a JPEG decoder accepts.
///
/// Merges `tables` into abbreviated tiles and, for RGB-coded levels, marks
/// the stream with an Adobe transform of 0.
pub fn prepare_tile_jpeg(tables: Option<&[u8]>, tile_data: &[u8], rgb_coded: bool) -> Bytes {
    let merged = match tables {
        Some(tables) if !is_complete_stream(tile_data) && is_abbreviated_stream(tile_data) => {
            merge_jpeg_tables(tables, tile_data)
        }
        _ => Bytes::copy_from_slice(tile_data),
    };

    if rgb_coded {
        set_adobe_transform_unknown(&merged)
    } else {
        merged
    }
}

// =============================================================================
// Tests
// =============================================================================
