//! Region read integration tests.
//!
//! Tests verify:
//! - Regions spanning several tiles are stitched in the right places
//! - Origins are in the coordinates of the requested level
//! - Bounds: regions may end exactly at the level edge, not past it
//! - Missing tiles come back white
//! - Saving picks the output format from the extension

use eozin::error::SlideError;
use eozin::io::MemoryRangeReader;
use eozin::tile::BACKGROUND;
use eozin::Eozin;

use super::test_utils::{assert_color_near, create_pyramid_tiff, create_svs, tile_color};

async fn pyramid_slide(missing: &[(u32, u32)]) -> Eozin<MemoryRangeReader> {
    let reader = MemoryRangeReader::new(create_pyramid_tiff(missing), "pyramid.tif");
    Eozin::from_reader(reader).await.unwrap()
}

// =============================================================================
// Stitching
// =============================================================================

#[tokio::test]
async fn test_region_across_four_tiles() {
    let slide = pyramid_slide(&[]).await;

    let region = slide.read_region((32, 32), 0, (64, 64)).await.unwrap();
    assert_eq!(region.dimensions(), (64, 64));
    assert_eq!(region.level(), 0);
    assert_eq!(region.origin(), (32, 32));

    let image = region.image();
    assert_color_near(*image.get_pixel(10, 10), tile_color(0, 0, 0));
    assert_color_near(*image.get_pixel(31, 31), tile_color(0, 0, 0));
    assert_color_near(*image.get_pixel(50, 10), tile_color(0, 1, 0));
    assert_color_near(*image.get_pixel(10, 50), tile_color(0, 0, 1));
    assert_color_near(*image.get_pixel(32, 32), tile_color(0, 1, 1));
    assert_color_near(*image.get_pixel(63, 63), tile_color(0, 1, 1));
}

#[tokio::test]
async fn test_region_inside_one_tile() {
    let slide = pyramid_slide(&[]).await;

    let region = slide.read_region((130, 70), 0, (20, 10)).await.unwrap();
    assert_eq!(region.dimensions(), (20, 10));
    assert!(region
        .image()
        .pixels()
        .all(|p| (p.0[0] as i32 - tile_color(0, 2, 1)[0] as i32).abs() <= 8));
}

#[tokio::test]
async fn test_origin_is_in_level_coordinates() {
    let slide = pyramid_slide(&[]).await;

    // Ends exactly at the 100x75 edge of level 1
    let region = slide.read_region((60, 60), 1, (40, 15)).await.unwrap();
    assert_eq!(region.dimensions(), (40, 15));

    let image = region.image();
    assert_color_near(*image.get_pixel(0, 0), tile_color(1, 0, 0));
    assert_color_near(*image.get_pixel(10, 10), tile_color(1, 1, 1));
}

#[tokio::test]
async fn test_svs_region() {
    let reader = MemoryRangeReader::new(create_svs(), "slide.svs");
    let slide = Eozin::from_reader(reader).await.unwrap();

    let region = slide.read_region((100, 100), 0, (50, 40)).await.unwrap();
    let image = region.image();
    assert_color_near(*image.get_pixel(5, 5), tile_color(0, 1, 1));
    assert_color_near(*image.get_pixel(40, 35), tile_color(0, 2, 2));
}

#[tokio::test]
async fn test_whole_level() {
    let slide = pyramid_slide(&[]).await;

    let region = slide.read_region((0, 0), 0, (200, 150)).await.unwrap();
    assert_eq!(region.dimensions(), (200, 150));
    assert_color_near(*region.image().get_pixel(199, 149), tile_color(0, 3, 2));
}

#[tokio::test]
async fn test_missing_tile_is_white() {
    let slide = pyramid_slide(&[(1, 0)]).await;

    let region = slide.read_region((32, 0), 0, (64, 16)).await.unwrap();
    let image = region.image();
    assert_color_near(*image.get_pixel(0, 0), tile_color(0, 0, 0));
    assert_eq!(*image.get_pixel(32, 0), BACKGROUND);
    assert_eq!(*image.get_pixel(63, 15), BACKGROUND);
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_region_past_level_edge() {
    let slide = pyramid_slide(&[]).await;

    let result = slide.read_region((150, 0), 0, (51, 10)).await;
    assert!(matches!(
        result,
        Err(SlideError::RegionOutOfBounds {
            level: 0,
            level_width: 200,
            level_height: 150,
            ..
        })
    ));

    assert!(slide.read_region((0, 76), 1, (1, 1)).await.is_err());
    assert!(slide.read_region((u64::MAX, 0), 0, (1, 1)).await.is_err());

    // Last pixel is still inside
    assert!(slide.read_region((199, 149), 0, (1, 1)).await.is_ok());
}

#[tokio::test]
async fn test_empty_region() {
    let slide = pyramid_slide(&[]).await;

    let result = slide.read_region((10, 10), 0, (0, 5)).await;
    assert!(matches!(
        result,
        Err(SlideError::EmptyRegion {
            width: 0,
            height: 5
        })
    ));
}

#[tokio::test]
async fn test_invalid_level() {
    let slide = pyramid_slide(&[]).await;

    let result = slide.read_region((0, 0), 2, (10, 10)).await;
    assert!(matches!(result, Err(SlideError::InvalidLevel { level: 2, .. })));
}

// =============================================================================
// Saving
// =============================================================================

#[tokio::test]
async fn test_save_by_extension() {
    let slide = pyramid_slide(&[]).await;
    let region = slide.read_region((10, 20), 0, (100, 50)).await.unwrap();
    let dir = tempfile::tempdir().unwrap();

    let png_path = dir.path().join("region.png");
    region.save(&png_path).await.unwrap();
    let reopened = image::open(&png_path).unwrap().to_rgb8();
    assert_eq!(reopened.dimensions(), (100, 50));
    assert_eq!(reopened, *region.image());

    let jpg_path = dir.path().join("region.JPG");
    region.save_with_quality(&jpg_path, 80).await.unwrap();
    let bytes = std::fs::read(&jpg_path).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

    let tiff_path = dir.path().join("region.tiff");
    assert!(matches!(
        region.save(&tiff_path).await,
        Err(SlideError::UnsupportedOutputFormat { .. })
    ));
    assert!(!tiff_path.exists());
}
