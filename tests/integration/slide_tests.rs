//! Slide handle integration tests.
//!
//! Tests verify:
//! - Level metadata exposed by an opened slide
//! - Downsample-to-level selection
//! - Tile reads, bounds checks and missing tiles

use std::sync::Arc;

use eozin::error::SlideError;
use eozin::io::MemoryRangeReader;
use eozin::tile::BACKGROUND;
use eozin::{Eozin, SlideFormat, Tile};

use super::test_utils::{
    assert_color_near, create_pyramid_tiff, create_svs, tile_color, write_temp_slide, TILE,
};

async fn pyramid_slide() -> Eozin<MemoryRangeReader> {
    let reader = MemoryRangeReader::new(create_pyramid_tiff(&[(3, 2)]), "pyramid.tif");
    Eozin::from_reader(reader).await.unwrap()
}

// =============================================================================
// Metadata
// =============================================================================

#[tokio::test]
async fn test_open_from_path() {
    let file = write_temp_slide(&create_pyramid_tiff(&[]), ".tif");
    let slide = Eozin::open(file.path()).await.unwrap();

    assert_eq!(slide.format(), SlideFormat::GenericTiff);
    assert_eq!(slide.level_count(), 2);
    assert_eq!(slide.dimensions(), (200, 150));
    assert_eq!(slide.level_dimensions(), &[(200, 150), (100, 75)]);
    assert_eq!(slide.identifier(), file.path().display().to_string());
}

#[tokio::test]
async fn test_level_geometry() {
    let slide = pyramid_slide().await;

    assert_eq!(slide.level_downsamples(), vec![1.0, 2.0]);
    assert_eq!(slide.level_tile_sizes(), vec![(TILE, TILE), (TILE, TILE)]);

    let info = slide.level_info(0).unwrap();
    assert_eq!((info.tiles_x, info.tiles_y), (4, 3));
    let info = slide.level_info(1).unwrap();
    assert_eq!((info.tiles_x, info.tiles_y), (2, 2));

    assert!(matches!(
        slide.level_info(2),
        Err(SlideError::InvalidLevel {
            level: 2,
            level_count: 2
        })
    ));
}

#[tokio::test]
async fn test_best_level_for_downsample() {
    let slide = pyramid_slide().await;

    assert_eq!(slide.best_level_for_downsample(0.5), 0);
    assert_eq!(slide.best_level_for_downsample(1.0), 0);
    assert_eq!(slide.best_level_for_downsample(1.9), 0);
    assert_eq!(slide.best_level_for_downsample(2.0), 1);
    assert_eq!(slide.best_level_for_downsample(16.0), 1);
}

#[tokio::test]
async fn test_debug_output_names_the_slide() {
    let slide = pyramid_slide().await;
    let debug = format!("{:?}", slide);
    assert!(debug.contains("Eozin"));
    assert!(debug.contains("pyramid.tif"));
}

// =============================================================================
// Tiles
// =============================================================================

#[tokio::test]
async fn test_read_tile_colors() {
    let slide = pyramid_slide().await;

    for (level, x, y) in [(0, 0, 0), (0, 2, 1), (1, 1, 1)] {
        let tile = slide.read_tile(level, x, y).await.unwrap();
        assert_eq!(tile.dimensions(), (TILE, TILE));
        assert_color_near(*tile.get_pixel(32, 32), tile_color(level as u32, x, y));
    }
}

#[tokio::test]
async fn test_svs_tile_colors() {
    let reader = MemoryRangeReader::new(create_svs(), "slide.svs");
    let slide = Eozin::from_reader(reader).await.unwrap();

    let tile = slide.read_tile(0, 3, 2).await.unwrap();
    assert_color_near(*tile.get_pixel(10, 10), tile_color(0, 3, 2));

    let tile = slide.read_tile(1, 0, 1).await.unwrap();
    assert_color_near(*tile.get_pixel(10, 10), tile_color(1, 0, 1));
}

#[tokio::test]
async fn test_read_tile_is_cached() {
    let slide = pyramid_slide().await;

    let first = slide.read_tile(0, 1, 1).await.unwrap();
    let second = slide.read_tile(0, 1, 1).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_tile_out_of_bounds() {
    let slide = pyramid_slide().await;

    let result = slide.read_tile(0, 4, 0).await;
    assert!(matches!(
        result,
        Err(SlideError::TileOutOfBounds {
            level: 0,
            x: 4,
            y: 0,
            tiles_x: 4,
            tiles_y: 3
        })
    ));

    assert!(matches!(
        slide.read_raw_tile(1, 0, 2).await,
        Err(SlideError::TileOutOfBounds { .. })
    ));
    assert!(matches!(
        slide.read_tile(5, 0, 0).await,
        Err(SlideError::InvalidLevel { .. })
    ));
}

#[tokio::test]
async fn test_missing_tile_is_background() {
    let slide = pyramid_slide().await;

    let raw = slide.read_raw_tile(0, 3, 2).await.unwrap();
    assert_eq!(raw, Tile::Missing);

    let tile = slide.read_tile(0, 3, 2).await.unwrap();
    assert_eq!(tile.dimensions(), (TILE, TILE));
    assert!(tile.pixels().all(|p| *p == BACKGROUND));
}
