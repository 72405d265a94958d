//! Format detection and parsing integration tests.
//!
//! Tests verify:
//! - Generic TIFF and Aperio SVS are told apart
//! - Unsupported files are rejected with format errors
//! - Stripped images are not counted as levels
//! - Slide properties from TIFF tags and the Aperio description

use eozin::error::{FormatError, IoError, SlideError, TiffError};
use eozin::format::detect_format;
use eozin::io::MemoryRangeReader;
use eozin::{Eozin, SlideFormat, Tile};

use super::test_utils::{
    create_leica_scn, create_lzw_tiff, create_pyramid_tiff, create_svs, write_temp_slide,
};

// =============================================================================
// Format Detection
// =============================================================================

#[tokio::test]
async fn test_format_detection_generic_tiff() {
    let reader = MemoryRangeReader::new(create_pyramid_tiff(&[]), "pyramid.tif");
    let format = detect_format(&reader).await.unwrap();
    assert_eq!(format, SlideFormat::GenericTiff);
}

#[tokio::test]
async fn test_format_detection_svs() {
    let reader = MemoryRangeReader::new(create_svs(), "slide.svs");
    let format = detect_format(&reader).await.unwrap();
    assert_eq!(format, SlideFormat::AperioSvs);
}

#[tokio::test]
async fn test_format_ignores_file_extension() {
    // Aperio content behind a .tif name is still SVS
    let file = write_temp_slide(&create_svs(), ".tif");
    let slide = Eozin::open(file.path()).await.unwrap();
    assert_eq!(slide.format(), SlideFormat::AperioSvs);
}

#[tokio::test]
async fn test_leica_scn_is_rejected() {
    let reader = MemoryRangeReader::new(create_leica_scn(), "slide.scn");

    let result = Eozin::from_reader(reader).await;
    match result {
        Err(SlideError::Format(FormatError::UnsupportedFormat { reason })) => {
            assert!(reason.contains("Leica"));
        }
        other => panic!("expected unsupported format, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_non_tiff_is_rejected() {
    let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
    data.resize(64, 0);
    let reader = MemoryRangeReader::new(data, "image.png");

    let result = Eozin::from_reader(reader).await;
    assert!(matches!(
        result,
        Err(SlideError::Format(FormatError::UnsupportedFormat { .. }))
    ));
}

#[tokio::test]
async fn test_tiny_file_is_rejected() {
    let reader = MemoryRangeReader::new(vec![b'I', b'I'], "tiny.tif");
    assert!(Eozin::from_reader(reader).await.is_err());
}

#[tokio::test]
async fn test_lzw_tiles_are_rejected() {
    let reader = MemoryRangeReader::new(create_lzw_tiff(), "lzw.tif");

    let result = Eozin::from_reader(reader).await;
    assert!(matches!(
        result,
        Err(SlideError::Format(FormatError::Tiff(
            TiffError::UnsupportedCompression(_)
        )))
    ));
}

#[tokio::test]
async fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = Eozin::open(dir.path().join("absent.svs")).await;
    assert!(matches!(result, Err(SlideError::Io(IoError::NotFound(_)))));
}

// =============================================================================
// Pyramid Structure
// =============================================================================

#[tokio::test]
async fn test_thumbnail_is_not_a_level() {
    let reader = MemoryRangeReader::new(create_pyramid_tiff(&[]), "pyramid.tif");
    let slide = Eozin::from_reader(reader).await.unwrap();

    assert_eq!(slide.level_count(), 2);
    assert_eq!(slide.level_dimensions(), &[(200, 150), (100, 75)]);
}

#[tokio::test]
async fn test_svs_tiles_are_merged_with_tables() {
    let reader = MemoryRangeReader::new(create_svs(), "slide.svs");
    let slide = Eozin::from_reader(reader).await.unwrap();

    let tile = slide.read_raw_tile(0, 1, 1).await.unwrap();
    let Tile::Jpeg(data) = tile else {
        panic!("expected a JPEG tile");
    };
    assert_eq!(&data[..2], &[0xFF, 0xD8]);
    assert_eq!(&data[data.len() - 2..], &[0xFF, 0xD9]);
    // Quantization tables come from JPEGTables
    assert!(data.windows(2).any(|w| w == [0xFF, 0xDB]));
}

// =============================================================================
// Properties
// =============================================================================

#[tokio::test]
async fn test_svs_properties() {
    let reader = MemoryRangeReader::new(create_svs(), "slide.svs");
    let slide = Eozin::from_reader(reader).await.unwrap();
    let properties = slide.properties();

    assert_eq!(properties.vendor(), Some("aperio"));
    assert_eq!(properties.mpp(), Some((0.499, 0.499)));
    assert_eq!(properties.objective_power(), Some(20.0));
    assert_eq!(properties.get("aperio.ScanScope ID"), Some("SS1234"));
    assert!(properties
        .get("tiff.ImageDescription")
        .unwrap()
        .starts_with("Aperio Image Library"));
    assert_eq!(properties.get("eozin.level-count"), Some("2"));
    assert_eq!(properties.get("eozin.level[1].width"), Some("100"));
}

#[tokio::test]
async fn test_generic_tiff_properties() {
    let reader = MemoryRangeReader::new(create_pyramid_tiff(&[]), "pyramid.tif");
    let slide = Eozin::from_reader(reader).await.unwrap();
    let properties = slide.properties();

    assert_eq!(properties.vendor(), Some("generic-tiff"));
    assert_eq!(properties.get("tiff.Make"), Some("Example Scanners"));
    assert_eq!(properties.get("tiff.ResolutionUnit"), Some("3"));
    // 20000 pixels per centimeter
    assert_eq!(properties.mpp(), Some((0.5, 0.5)));
    assert!(properties.objective_power().is_none());
}
