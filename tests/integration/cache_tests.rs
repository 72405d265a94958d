//! Cache effectiveness integration tests.
//!
//! Tests verify:
//! - Repeated region reads are served without touching storage
//! - Disabling the tile cache falls back to the block cache and storage
//! - Concurrent reads on one slide agree

use eozin::{Eozin, SlideOptions};

use super::test_utils::{create_pyramid_tiff, TrackingMockReader};

// =============================================================================
// Tile Cache Effectiveness
// =============================================================================

#[tokio::test]
async fn test_repeated_region_hits_caches() {
    let reader = TrackingMockReader::new(create_pyramid_tiff(&[]), "pyramid.tif");
    let tracker = reader.tracker();
    let slide = Eozin::from_reader(reader).await.unwrap();

    let first = slide.read_region((32, 32), 0, (64, 64)).await.unwrap();
    let after_first = tracker.request_count();

    let second = slide.read_region((32, 32), 0, (64, 64)).await.unwrap();
    assert_eq!(tracker.request_count(), after_first);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_opening_reads_in_blocks() {
    let options = SlideOptions {
        block_size: 1024,
        ..SlideOptions::default()
    };
    let reader = TrackingMockReader::new(create_pyramid_tiff(&[]), "pyramid.tif");
    let tracker = reader.tracker();
    let _slide = Eozin::from_reader_with_options(reader, options)
        .await
        .unwrap();

    let requests = tracker.get_requests().await;
    assert!(!requests.is_empty());
    for (offset, _) in requests {
        assert_eq!(offset % 1024, 0, "request not block aligned");
    }
}

#[tokio::test]
async fn test_without_tile_cache_tiles_are_reread() {
    let options = SlideOptions {
        block_size: 1024,
        block_cache_capacity: 1,
        tile_cache_bytes: 0,
    };
    let reader = TrackingMockReader::new(create_pyramid_tiff(&[]), "pyramid.tif");
    let tracker = reader.tracker();
    let slide = Eozin::from_reader_with_options(reader, options)
        .await
        .unwrap();

    let first = slide.read_region((0, 0), 0, (128, 128)).await.unwrap();
    let after_first = tracker.request_count();

    let second = slide.read_region((0, 0), 0, (128, 128)).await.unwrap();
    assert!(tracker.request_count() > after_first);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_concurrent_region_reads() {
    let reader = TrackingMockReader::new(create_pyramid_tiff(&[]), "pyramid.tif");
    let slide = Eozin::from_reader(reader).await.unwrap();

    let (a, b, c) = tokio::join!(
        slide.read_region((0, 0), 0, (200, 150)),
        slide.read_region((0, 0), 0, (200, 150)),
        slide.read_region((64, 64), 0, (64, 64)),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

    assert_eq!(a, b);
    let from_whole = image::imageops::crop_imm(a.image(), 64, 64, 64, 64).to_image();
    assert_eq!(from_whole, *c.image());
}
