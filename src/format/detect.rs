//! Format detection for Whole Slide Image files.
//!
//! Detection examines magic bytes and vendor markers in the first IFD's
//! ImageDescription:
//!
//! - **Aperio SVS**: "Aperio" in ImageDescription
//! - **Leica SCN**: Leica XML namespace in ImageDescription, rejected
//! - **Generic Pyramidal TIFF**: any other TIFF or BigTIFF

use tracing::debug;

use crate::error::FormatError;
use crate::io::RangeReader;

use super::tiff::{
    ByteOrder, Ifd, TiffHeader, TiffTag, ValueReader, BIGTIFF_HEADER_SIZE, MAX_IFD_ENTRIES,
    TIFF_HEADER_SIZE,
};

// =============================================================================
// SlideFormat
// =============================================================================

/// Detected slide format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideFormat {
    /// Aperio SVS format (TIFF-based with JPEGTables for abbreviated streams)
    AperioSvs,

    /// Generic pyramidal TIFF (standard tiled TIFF with multiple resolutions)
    GenericTiff,
}

impl SlideFormat {
    /// Get a human-readable name for the format.
    pub const fn name(&self) -> &'static str {
        match self {
            SlideFormat::AperioSvs => "Aperio SVS",
            SlideFormat::GenericTiff => "Generic Pyramidal TIFF",
        }
    }
}

impl std::fmt::Display for SlideFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Format Detection
// =============================================================================

/// Maximum bytes to read from ImageDescription for format detection.
const MAX_DESCRIPTION_BYTES: usize = 1024;

/// Marker string for Aperio SVS format.
const APERIO_MARKER: &str = "Aperio";

/// XML namespace prefix of Leica SCN descriptions.
const LEICA_SCN_MARKER: &str = "leica-microsystems.com/scn";

/// Detect the format of a slide file.
///
/// # Format Detection Logic
///
/// 1. Read initial bytes and verify TIFF/BigTIFF magic
/// 2. Parse the first IFD to access ImageDescription tag
/// 3. If ImageDescription names a Leica SCN namespace, reject the file
/// 4. If ImageDescription contains "Aperio", classify as SVS
/// 5. Otherwise, classify as generic pyramidal TIFF
pub async fn detect_format<R: RangeReader>(reader: &R) -> Result<SlideFormat, FormatError> {
    if reader.size() < TIFF_HEADER_SIZE as u64 {
        return Err(FormatError::UnsupportedFormat {
            reason: "File too small to be a valid TIFF".to_string(),
        });
    }

    let header_len = (BIGTIFF_HEADER_SIZE as u64).min(reader.size()) as usize;
    let header_bytes = reader.read_exact_at(0, header_len).await?;
    if !is_tiff_header(&header_bytes) {
        return Err(FormatError::UnsupportedFormat {
            reason: "Not a TIFF file".to_string(),
        });
    }
    let header = TiffHeader::parse(&header_bytes, reader.size())?;

    let description = read_description_prefix(reader, &header).await?;
    let format = classify_description(description.as_deref())?;

    debug!(file = reader.identifier(), format = format.name(), "detected slide format");
    Ok(format)
}

/// Read the first IFD and up to `MAX_DESCRIPTION_BYTES` of its ImageDescription.
async fn read_description_prefix<R: RangeReader>(
    reader: &R,
    header: &TiffHeader,
) -> Result<Option<String>, FormatError> {
    let count_bytes = reader
        .read_exact_at(header.first_ifd_offset, header.ifd_count_size())
        .await?;
    let entry_count = header.read_entry_count(&count_bytes);
    if entry_count > MAX_IFD_ENTRIES {
        return Err(FormatError::UnsupportedFormat {
            reason: format!("first IFD declares {} entries", entry_count),
        });
    }

    let ifd_size = Ifd::calculate_size(entry_count, header);
    let ifd_bytes = reader
        .read_exact_at(header.first_ifd_offset, ifd_size)
        .await?;
    let ifd = Ifd::parse(&ifd_bytes, header)?;

    let Some(entry) = ifd.get_entry_by_tag(TiffTag::ImageDescription) else {
        return Ok(None);
    };
    if entry.count == 0 {
        return Ok(None);
    }

    let values = ValueReader::new(reader, header);
    let description = values
        .read_string_prefix(entry, MAX_DESCRIPTION_BYTES)
        .await?;
    Ok(Some(description))
}

/// Decide the format from the start of the first ImageDescription.
fn classify_description(description: Option<&str>) -> Result<SlideFormat, FormatError> {
    let Some(description) = description else {
        return Ok(SlideFormat::GenericTiff);
    };

    if description.contains(LEICA_SCN_MARKER) {
        return Err(FormatError::UnsupportedFormat {
            reason: "Leica SCN slides are not supported".to_string(),
        });
    }
    if contains_aperio_marker(description) {
        return Ok(SlideFormat::AperioSvs);
    }
    Ok(SlideFormat::GenericTiff)
}

/// Check if a description carries the Aperio marker.
fn contains_aperio_marker(description: &str) -> bool {
    description.contains(APERIO_MARKER)
}

/// Check if bytes represent a valid TIFF header.
///
/// This is a quick check that can be used before attempting full parsing.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < TIFF_HEADER_SIZE {
        return false;
    }

    let byte_order = match &bytes[0..2] {
        b"II" => ByteOrder::LittleEndian,
        b"MM" => ByteOrder::BigEndian,
        _ => return false,
    };

    let version = byte_order.read_u16(&bytes[2..4]);
    version == 42 || version == 43
}

// =============================================================================
// Tests
// =============================================================================
