//! Cache of decoded tiles.
//!
//! Regions usually overlap the same tiles as the previous request (panning,
//! neighbouring crops), so decoded tiles are kept in an LRU keyed by level
//! and tile coordinates.
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total pixel bytes of cached tiles and evicts
//! least-recently-used entries when the capacity is exceeded.

use std::num::NonZeroUsize;
use std::sync::Arc;

use image::RgbImage;
use lru::LruCache;
use tokio::sync::Mutex;

/// Default cache capacity: 64MB of RGB pixels (about 340 tiles of 256x256)
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 64 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 10_000;

// =============================================================================
// Cache Key
// =============================================================================

/// Position of a tile within one slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    /// Pyramid level (0 = highest resolution)
    pub level: u32,

    /// Tile X coordinate (0-indexed from left)
    pub tile_x: u32,

    /// Tile Y coordinate (0-indexed from top)
    pub tile_y: u32,
}

impl TileCacheKey {
    pub fn new(level: u32, tile_x: u32, tile_y: u32) -> Self {
        Self {
            level,
            tile_x,
            tile_y,
        }
    }
}

// =============================================================================
// Tile Cache
// =============================================================================

struct CacheState {
    entries: LruCache<TileCacheKey, Arc<RgbImage>>,
    current_size: usize,
}

/// LRU cache for decoded tiles with size-based capacity.
///
/// The cache is thread-safe and can be shared across async tasks.
pub struct TileCache {
    state: Mutex<CacheState>,

    /// Maximum total size in bytes
    max_size: usize,
}

fn image_size(image: &RgbImage) -> usize {
    image.as_raw().len()
}

impl TileCache {
    /// Create a new tile cache with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TILE_CACHE_CAPACITY)
    }

    /// Create a tile cache holding at most `max_size` bytes of pixels.
    ///
    /// A capacity of zero disables caching.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a new tile cache with specified capacity and maximum entries.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let max_entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(max_entries),
                current_size: 0,
            }),
            max_size,
        }
    }

    /// Get a tile from the cache, marking it as recently used.
    pub async fn get(&self, key: &TileCacheKey) -> Option<Arc<RgbImage>> {
        let mut state = self.state.lock().await;
        state.entries.get(key).cloned()
    }

    /// Check if a tile is in the cache without updating LRU order.
    pub async fn contains(&self, key: &TileCacheKey) -> bool {
        self.state.lock().await.entries.contains(key)
    }

    /// Store a tile in the cache.
    ///
    /// Least-recently-used entries are evicted until the cache is back
    /// within capacity. Tiles larger than the whole capacity are not stored.
    pub async fn put(&self, key: TileCacheKey, tile: Arc<RgbImage>) {
        let tile_size = image_size(&tile);
        if tile_size > self.max_size {
            return;
        }

        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        if let Some(old) = state.entries.peek(&key) {
            state.current_size = state.current_size.saturating_sub(image_size(old));
        }

        // The entry limit can push out an entry on its own
        if let Some((evicted_key, evicted)) = state.entries.push(key, tile) {
            if evicted_key != key {
                state.current_size = state.current_size.saturating_sub(image_size(&evicted));
            }
        }
        state.current_size += tile_size;

        while state.current_size > self.max_size {
            match state.entries.pop_lru() {
                Some((_, evicted)) => {
                    state.current_size = state.current_size.saturating_sub(image_size(&evicted));
                }
                None => break,
            }
        }
    }

    /// Remove a tile from the cache.
    pub async fn remove(&self, key: &TileCacheKey) -> Option<Arc<RgbImage>> {
        let mut state = self.state.lock().await;
        let removed = state.entries.pop(key)?;
        state.current_size = state.current_size.saturating_sub(image_size(&removed));
        Some(removed)
    }

    /// Clear all entries from the cache.
    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.entries.clear();
        state.current_size = 0;
    }

    /// Get the current number of cached tiles.
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.entries.is_empty()
    }

    /// Get the current total size of cached tiles in bytes.
    pub async fn size(&self) -> usize {
        self.state.lock().await.current_size
    }

    /// Get the maximum capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
