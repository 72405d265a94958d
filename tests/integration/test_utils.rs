//! Test utilities for integration tests.
//!
//! Builds small pyramidal TIFF files in memory: every tile is a solid color
//! derived from its level and grid position, so region reads can be checked
//! pixel by pixel.

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use eozin::error::IoError;
use eozin::io::RangeReader;

// =============================================================================
// Mock Range Reader with Request Tracking
// =============================================================================

/// A range reader over a byte buffer that records every request.
pub struct TrackingMockReader {
    data: Bytes,
    identifier: String,
    request_count: Arc<AtomicUsize>,
    requests: Arc<RwLock<Vec<(u64, usize)>>>,
}

impl TrackingMockReader {
    pub fn new(data: Vec<u8>, identifier: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(data),
            identifier: identifier.into(),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Handle sharing this reader's counters.
    pub fn tracker(&self) -> RequestTracker {
        RequestTracker {
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
        }
    }
}

#[async_trait]
impl RangeReader for TrackingMockReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push((offset, len));

        let start = offset as usize;
        let end = start + len;
        if end > self.data.len() {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.data.len() as u64,
            });
        }
        Ok(self.data.slice(start..end))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

/// Counters of a [`TrackingMockReader`] that outlive moving the reader.
#[derive(Clone)]
pub struct RequestTracker {
    request_count: Arc<AtomicUsize>,
    requests: Arc<RwLock<Vec<(u64, usize)>>>,
}

impl RequestTracker {
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub async fn get_requests(&self) -> Vec<(u64, usize)> {
        self.requests.read().await.clone()
    }
}

// =============================================================================
// Test JPEG Creation
// =============================================================================

/// Color of tile (`x`, `y`) at `level` in the synthetic slides.
pub fn tile_color(level: u32, x: u32, y: u32) -> [u8; 3] {
    [
        (40 + x * 50) as u8,
        (40 + y * 60) as u8,
        (60 + level * 120) as u8,
    ]
}

/// Encode a solid-color RGB JPEG.
pub fn solid_jpeg(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 95);
    encoder.encode_image(&img).unwrap();
    buf
}

/// Split a complete JPEG into an Aperio-style pair: a tables stream
/// (SOI, APPn, DQT, DHT, EOI) and an abbreviated tile (SOI, SOF, SOS..EOI).
pub fn split_jpeg_tables(jpeg: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut tables = vec![0xFF, 0xD8];
    let mut tile = vec![0xFF, 0xD8];

    let mut i = 2;
    while i + 4 <= jpeg.len() {
        let marker = jpeg[i + 1];
        if marker == 0xDA {
            tile.extend_from_slice(&jpeg[i..]);
            break;
        }
        let len = u16::from_be_bytes([jpeg[i + 2], jpeg[i + 3]]) as usize;
        let segment = &jpeg[i..i + 2 + len];
        match marker {
            0xDB | 0xC4 | 0xE0..=0xEF => tables.extend_from_slice(segment),
            _ => tile.extend_from_slice(segment),
        }
        i += 2 + len;
    }

    tables.extend_from_slice(&[0xFF, 0xD9]);
    (tables, tile)
}

/// Check that pixels match within JPEG tolerance.
pub fn assert_color_near(actual: Rgb<u8>, expected: [u8; 3]) {
    for channel in 0..3 {
        let diff = (actual.0[channel] as i32 - expected[channel] as i32).abs();
        assert!(
            diff <= 8,
            "pixel {:?} differs from expected {:?}",
            actual.0,
            expected
        );
    }
}

// =============================================================================
// TIFF Builder
// =============================================================================

const ASCII: u16 = 2;
const SHORT: u16 = 3;
const LONG: u16 = 4;
const RATIONAL: u16 = 5;
const UNDEFINED: u16 = 7;

struct EntrySpec {
    tag: u16,
    field_type: u16,
    count: u32,
    /// Little-endian value bytes
    payload: Vec<u8>,
}

/// One IFD of a little-endian classic TIFF.
#[derive(Default)]
pub struct IfdSpec {
    entries: Vec<EntrySpec>,
    /// Row-major tile payloads; an empty payload is written as a missing tile
    tiles: Option<Vec<Vec<u8>>>,
}

impl IfdSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tiled RGB JPEG level with the usual tags.
    pub fn tiled(width: u32, height: u32, tile_size: u32, tiles: Vec<Vec<u8>>) -> Self {
        Self::new()
            .long(256, width)
            .long(257, height)
            .short(258, 8)
            .short(259, 7)
            .short(262, 6)
            .short(277, 3)
            .short(322, tile_size as u16)
            .short(323, tile_size as u16)
            .with_tiles(tiles)
    }

    pub fn short(mut self, tag: u16, value: u16) -> Self {
        self.entries.push(EntrySpec {
            tag,
            field_type: SHORT,
            count: 1,
            payload: value.to_le_bytes().to_vec(),
        });
        self
    }

    pub fn long(mut self, tag: u16, value: u32) -> Self {
        self.entries.push(EntrySpec {
            tag,
            field_type: LONG,
            count: 1,
            payload: value.to_le_bytes().to_vec(),
        });
        self
    }

    pub fn ascii(mut self, tag: u16, value: &str) -> Self {
        let mut payload = value.as_bytes().to_vec();
        payload.push(0);
        self.entries.push(EntrySpec {
            tag,
            field_type: ASCII,
            count: payload.len() as u32,
            payload,
        });
        self
    }

    pub fn rational(mut self, tag: u16, numerator: u32, denominator: u32) -> Self {
        let mut payload = numerator.to_le_bytes().to_vec();
        payload.extend_from_slice(&denominator.to_le_bytes());
        self.entries.push(EntrySpec {
            tag,
            field_type: RATIONAL,
            count: 1,
            payload,
        });
        self
    }

    pub fn undefined(mut self, tag: u16, payload: Vec<u8>) -> Self {
        self.entries.push(EntrySpec {
            tag,
            field_type: UNDEFINED,
            count: payload.len() as u32,
            payload,
        });
        self
    }

    pub fn with_tiles(mut self, tiles: Vec<Vec<u8>>) -> Self {
        self.tiles = Some(tiles);
        self
    }
}

fn longs_entry(tag: u16, values: &[u32]) -> EntrySpec {
    EntrySpec {
        tag,
        field_type: LONG,
        count: values.len() as u32,
        payload: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
    }
}

fn align(data: &mut Vec<u8>) {
    if data.len() % 2 == 1 {
        data.push(0);
    }
}

/// Serialize IFDs into a little-endian classic TIFF, chained in order.
pub fn build_tiff(ifds: Vec<IfdSpec>) -> Vec<u8> {
    let mut data = vec![b'I', b'I', 42, 0, 0, 0, 0, 0];
    let mut next_offset_pos = 4;

    for ifd in ifds {
        let mut entries = ifd.entries;

        if let Some(tiles) = ifd.tiles {
            let mut offsets = Vec::with_capacity(tiles.len());
            let mut counts = Vec::with_capacity(tiles.len());
            for tile in &tiles {
                if tile.is_empty() {
                    offsets.push(0);
                    counts.push(0);
                    continue;
                }
                align(&mut data);
                offsets.push(data.len() as u32);
                counts.push(tile.len() as u32);
                data.extend_from_slice(tile);
            }
            entries.push(longs_entry(324, &offsets));
            entries.push(longs_entry(325, &counts));
        }
        entries.sort_by_key(|e| e.tag);

        let mut value_fields = Vec::with_capacity(entries.len());
        for entry in &entries {
            if entry.payload.len() <= 4 {
                let mut inline = entry.payload.clone();
                inline.resize(4, 0);
                value_fields.push(inline);
            } else {
                align(&mut data);
                value_fields.push((data.len() as u32).to_le_bytes().to_vec());
                data.extend_from_slice(&entry.payload);
            }
        }

        align(&mut data);
        let ifd_offset = data.len() as u32;
        data[next_offset_pos..next_offset_pos + 4].copy_from_slice(&ifd_offset.to_le_bytes());

        data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for (entry, value) in entries.iter().zip(value_fields) {
            data.extend_from_slice(&entry.tag.to_le_bytes());
            data.extend_from_slice(&entry.field_type.to_le_bytes());
            data.extend_from_slice(&entry.count.to_le_bytes());
            data.extend_from_slice(&value);
        }
        next_offset_pos = data.len();
        data.extend_from_slice(&[0, 0, 0, 0]);
    }

    data
}

// =============================================================================
// Synthetic Slides
// =============================================================================

/// Tile size of the synthetic slides.
pub const TILE: u32 = 64;

/// Level sizes of the synthetic slides: 4x3 and 2x2 tile grids.
pub const LEVELS: [(u32, u32); 2] = [(200, 150), (100, 75)];

/// Solid-color JPEG tiles for a level.
pub fn level_tiles(level: u32, width: u32, height: u32) -> Vec<Vec<u8>> {
    let tiles_x = width.div_ceil(TILE);
    let tiles_y = height.div_ceil(TILE);
    (0..tiles_y)
        .flat_map(|y| (0..tiles_x).map(move |x| solid_jpeg(TILE, TILE, tile_color(level, x, y))))
        .collect()
}

/// Two-level generic pyramidal TIFF followed by a stripped thumbnail.
///
/// `missing` lists level-0 tiles stored with a zero byte count.
pub fn create_pyramid_tiff(missing: &[(u32, u32)]) -> Vec<u8> {
    let mut ifds = Vec::new();
    for (level, &(width, height)) in LEVELS.iter().enumerate() {
        let mut tiles = level_tiles(level as u32, width, height);
        if level == 0 {
            let tiles_x = width.div_ceil(TILE);
            for &(x, y) in missing {
                tiles[(y * tiles_x + x) as usize].clear();
            }
        }
        let mut ifd = IfdSpec::tiled(width, height, TILE, tiles);
        if level == 0 {
            ifd = ifd
                .ascii(271, "Example Scanners")
                .rational(282, 20_000, 1)
                .rational(283, 20_000, 1)
                .short(296, 3);
        }
        ifds.push(ifd);
    }
    ifds.push(thumbnail_ifd());
    build_tiff(ifds)
}

/// Aperio-style slide: abbreviated tiles with shared JPEGTables.
pub fn create_svs() -> Vec<u8> {
    let description = "Aperio Image Library v12.0.15\n200x150 (64x64) JPEG/RGB Q=95|AppMag = 20|MPP = 0.4990|ScanScope ID = SS1234";

    let mut ifds = Vec::new();
    for (level, &(width, height)) in LEVELS.iter().enumerate() {
        let full = level_tiles(level as u32, width, height);
        let (tables, _) = split_jpeg_tables(&full[0]);
        let tiles = full.iter().map(|jpeg| split_jpeg_tables(jpeg).1).collect();

        let mut ifd = IfdSpec::tiled(width, height, TILE, tiles).undefined(347, tables);
        if level == 0 {
            ifd = ifd.ascii(270, description);
        } else {
            ifd = ifd.ascii(270, "Aperio Image Library v12.0.15\n100x75 (64x64) -> 100x75");
        }
        ifds.push(ifd);
    }
    ifds.push(thumbnail_ifd());
    build_tiff(ifds)
}

/// Leica SCN style file: tiled, with the SCN XML namespace in its description.
pub fn create_leica_scn() -> Vec<u8> {
    let description = r#"<?xml version="1.0" encoding="utf-8"?><scn xmlns="http://www.leica-microsystems.com/scn/2010/10/01"></scn>"#;
    let (width, height) = LEVELS[0];
    build_tiff(vec![
        IfdSpec::tiled(width, height, TILE, level_tiles(0, width, height)).ascii(270, description),
    ])
}

/// Tiled TIFF whose only level uses LZW.
pub fn create_lzw_tiff() -> Vec<u8> {
    let tiles = vec![vec![1, 2, 3, 4]];
    build_tiff(vec![IfdSpec::new()
        .long(256, 64)
        .long(257, 64)
        .short(259, 5)
        .short(322, 64)
        .short(323, 64)
        .with_tiles(tiles)])
}

/// Stripped 16x12 uncompressed RGB image.
fn thumbnail_ifd() -> IfdSpec {
    let (width, height) = (16u32, 12u32);
    IfdSpec::new()
        .long(256, width)
        .long(257, height)
        .short(258, 8)
        .short(259, 1)
        .short(262, 2)
        .long(273, 0)
        .short(277, 3)
        .long(278, height)
        .long(279, width * height * 3)
}

/// Write bytes to a temp file that lives as long as the returned handle.
pub fn write_temp_slide(data: &[u8], suffix: &str) -> tempfile::NamedTempFile {
    use std::io::Write;

    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(data).unwrap();
    file.flush().unwrap();
    file
}
