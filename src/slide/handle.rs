//! The slide handle: open a file, inspect its pyramid, read tiles and regions.

use std::path::Path;
use std::sync::Arc;

use image::RgbImage;
use tracing::{debug, info};

use crate::error::{FormatError, SlideError};
use crate::format::{
    detect_format, GenericTiffReader, SlideFormat, SlideProperties, SvsReader, Tile,
};
use crate::io::{
    BlockCache, FileRangeReader, RangeReader, DEFAULT_BLOCK_CACHE_CAPACITY, DEFAULT_BLOCK_SIZE,
};
use crate::region::{compose, Region, RegionPlan};
use crate::tile::{TileCache, TileCacheKey, TileDecoder, DEFAULT_TILE_CACHE_CAPACITY};

use super::reader::{LevelInfo, SlideReader};

// =============================================================================
// Options
// =============================================================================

/// Cache sizing for an open slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideOptions {
    /// Size of each cached block of file bytes
    pub block_size: usize,

    /// Number of file blocks kept in memory
    pub block_cache_capacity: usize,

    /// Bytes of decoded tile pixels kept in memory (0 disables the cache)
    pub tile_cache_bytes: usize,
}

impl Default for SlideOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            block_cache_capacity: DEFAULT_BLOCK_CACHE_CAPACITY,
            tile_cache_bytes: DEFAULT_TILE_CACHE_CAPACITY,
        }
    }
}

// =============================================================================
// Eozin
// =============================================================================

enum SlideReaderInner {
    Svs(SvsReader),
    GenericTiff(GenericTiffReader),
}

impl SlideReaderInner {
    fn as_reader(&self) -> &dyn LevelSource {
        match self {
            SlideReaderInner::Svs(r) => r,
            SlideReaderInner::GenericTiff(r) => r,
        }
    }

    fn properties(&self) -> &SlideProperties {
        match self {
            SlideReaderInner::Svs(r) => r.properties(),
            SlideReaderInner::GenericTiff(r) => r.properties(),
        }
    }

    fn warnings(&self) -> &[String] {
        match self {
            SlideReaderInner::Svs(r) => r.warnings(),
            SlideReaderInner::GenericTiff(r) => r.warnings(),
        }
    }
}

/// Object-safe view of the synchronous half of [`SlideReader`].
trait LevelSource {
    fn level_info(&self, level: usize) -> Option<LevelInfo>;
    fn level_count(&self) -> usize;
    fn best_level_for_downsample(&self, downsample: f64) -> Option<usize>;
}

impl<T: SlideReader> LevelSource for T {
    fn level_info(&self, level: usize) -> Option<LevelInfo> {
        SlideReader::level_info(self, level)
    }

    fn level_count(&self) -> usize {
        SlideReader::level_count(self)
    }

    fn best_level_for_downsample(&self, downsample: f64) -> Option<usize> {
        SlideReader::best_level_for_downsample(self, downsample)
    }
}

/// An open whole slide image.
///
/// Level 0 is full resolution; each further level is a downsampled copy.
/// Region coordinates are always in the pixel space of the level being
/// read.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> Result<(), eozin::SlideError> {
/// use eozin::Eozin;
///
/// let slide = Eozin::open("CMU-1.svs").await?;
/// println!("{} levels: {:?}", slide.level_count(), slide.level_dimensions());
///
/// let region = slide.read_region((800, 900), 1, (512, 512)).await?;
/// region.save("region.png").await?;
/// # Ok(())
/// # }
/// ```
pub struct Eozin<R: RangeReader + 'static = FileRangeReader> {
    format: SlideFormat,

    reader: Arc<BlockCache<R>>,

    inner: SlideReaderInner,

    levels: Vec<LevelInfo>,

    /// (width, height) per level, in level order
    level_dimensions: Vec<(u32, u32)>,

    tiles: TileCache,

    decoder: TileDecoder,
}

impl Eozin<FileRangeReader> {
    /// Open the slide file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SlideError> {
        Self::open_with_options(path, SlideOptions::default()).await
    }

    pub async fn open_with_options(
        path: impl AsRef<Path>,
        options: SlideOptions,
    ) -> Result<Self, SlideError> {
        let reader = FileRangeReader::open(path).await?;
        Self::from_reader_with_options(reader, options).await
    }
}

impl<R: RangeReader + 'static> Eozin<R> {
    /// Open a slide from any byte source.
    pub async fn from_reader(reader: R) -> Result<Self, SlideError> {
        Self::from_reader_with_options(reader, SlideOptions::default()).await
    }

    pub async fn from_reader_with_options(
        reader: R,
        options: SlideOptions,
    ) -> Result<Self, SlideError> {
        let cached_reader = Arc::new(BlockCache::with_capacity(
            reader,
            options.block_size,
            options.block_cache_capacity,
        ));

        let format = detect_format(cached_reader.as_ref()).await?;

        let inner = match format {
            SlideFormat::AperioSvs => {
                let svs = SvsReader::open(cached_reader.as_ref())
                    .await
                    .map_err(FormatError::from)?;
                SlideReaderInner::Svs(svs)
            }
            SlideFormat::GenericTiff => {
                let tiff = GenericTiffReader::open(cached_reader.as_ref())
                    .await
                    .map_err(FormatError::from)?;
                SlideReaderInner::GenericTiff(tiff)
            }
        };

        let source = inner.as_reader();
        let levels: Vec<LevelInfo> = (0..source.level_count())
            .filter_map(|level| source.level_info(level))
            .collect();
        let level_dimensions = levels.iter().map(|l| (l.width, l.height)).collect();

        info!(
            slide = cached_reader.identifier(),
            format = %format,
            levels = levels.len(),
            "opened slide"
        );

        Ok(Self {
            format,
            reader: cached_reader,
            inner,
            levels,
            level_dimensions,
            tiles: TileCache::with_capacity(options.tile_cache_bytes),
            decoder: TileDecoder::new(),
        })
    }

    pub fn format(&self) -> SlideFormat {
        self.format
    }

    /// Identifier of the underlying byte source (the path for files).
    pub fn identifier(&self) -> &str {
        self.reader.identifier()
    }

    /// Number of pyramid levels.
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Size of level 0.
    pub fn dimensions(&self) -> (u32, u32) {
        self.level_dimensions.first().copied().unwrap_or((0, 0))
    }

    /// (width, height) of each level, level 0 first.
    pub fn level_dimensions(&self) -> &[(u32, u32)] {
        &self.level_dimensions
    }

    pub fn level_downsamples(&self) -> Vec<f64> {
        self.levels.iter().map(|l| l.downsample).collect()
    }

    /// Nominal (tile width, tile height) of each level.
    pub fn level_tile_sizes(&self) -> Vec<(u32, u32)> {
        self.levels
            .iter()
            .map(|l| (l.tile_width, l.tile_height))
            .collect()
    }

    pub fn level_info(&self, level: usize) -> Result<LevelInfo, SlideError> {
        self.levels
            .get(level)
            .copied()
            .ok_or(SlideError::InvalidLevel {
                level,
                level_count: self.levels.len(),
            })
    }

    /// Slide metadata: TIFF tags, vendor keys and per-level geometry.
    pub fn properties(&self) -> &SlideProperties {
        self.inner.properties()
    }

    /// Non-fatal problems noticed while opening the slide.
    pub fn warnings(&self) -> &[String] {
        self.inner.warnings()
    }

    /// Level to read from for a target downsample of level 0.
    ///
    /// Picks the largest downsample not above `downsample`; anything below
    /// 1.0 maps to level 0.
    pub fn best_level_for_downsample(&self, downsample: f64) -> usize {
        self.inner
            .as_reader()
            .best_level_for_downsample(downsample)
            .unwrap_or(0)
    }

    /// Read a tile's compressed data without decoding it.
    pub async fn read_raw_tile(
        &self,
        level: usize,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Tile, SlideError> {
        self.check_tile(level, tile_x, tile_y)?;

        let reader = self.reader.as_ref();
        let tile = match &self.inner {
            SlideReaderInner::Svs(r) => r.read_tile(reader, level, tile_x, tile_y).await?,
            SlideReaderInner::GenericTiff(r) => r.read_tile(reader, level, tile_x, tile_y).await?,
        };
        Ok(tile)
    }

    /// Read and decode a tile.
    ///
    /// Decoded tiles are cached. Edge tiles keep their full stored size;
    /// only the part inside the level is image data.
    pub async fn read_tile(
        &self,
        level: usize,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Arc<RgbImage>, SlideError> {
        let info = self.level_info(level)?;
        let key = TileCacheKey::new(level as u32, tile_x, tile_y);
        if let Some(cached) = self.tiles.get(&key).await {
            return Ok(cached);
        }

        let tile = self.read_raw_tile(level, tile_x, tile_y).await?;
        debug!(
            level,
            tile_x,
            tile_y,
            codec = tile.codec_name(),
            bytes = tile.data().len(),
            "decoding tile"
        );

        let decoder = self.decoder.clone();
        let tile_size = (info.tile_width, info.tile_height);
        let image = tokio::task::spawn_blocking(move || decoder.decode(&tile, tile_size))
            .await
            .map_err(|e| SlideError::Decode {
                message: format!("decode task failed: {}", e),
            })??;

        let image = Arc::new(image);
        self.tiles.put(key, image.clone()).await;
        Ok(image)
    }

    /// Read a `size` pixel region at `origin` from `level`.
    ///
    /// `origin` is in the level's own coordinates. The region must lie
    /// within the level: `x + width` may equal the level width but not
    /// exceed it. Area with no stored tile data is white.
    pub async fn read_region(
        &self,
        origin: (u64, u64),
        level: usize,
        size: (u32, u32),
    ) -> Result<Region, SlideError> {
        let info = self.level_info(level)?;
        let (x, y) = origin;
        let (width, height) = size;

        if width == 0 || height == 0 {
            return Err(SlideError::EmptyRegion { width, height });
        }

        let fits_x = x
            .checked_add(width as u64)
            .is_some_and(|end| end <= info.width as u64);
        let fits_y = y
            .checked_add(height as u64)
            .is_some_and(|end| end <= info.height as u64);
        if !fits_x || !fits_y {
            return Err(SlideError::RegionOutOfBounds {
                level,
                x,
                y,
                width,
                height,
                level_width: info.width,
                level_height: info.height,
            });
        }

        let plan = RegionPlan::new(origin, size, (info.tile_width, info.tile_height));
        debug!(
            slide = self.identifier(),
            level,
            x,
            y,
            width,
            height,
            tiles = plan.tile_count(),
            "reading region"
        );

        let mut tiles = Vec::with_capacity(plan.tile_count());
        for patch in &plan.patches {
            let tile = self.read_tile(level, patch.tile_x, patch.tile_y).await?;
            tiles.push((*patch, tile));
        }

        let image = tokio::task::spawn_blocking(move || compose(&plan, &tiles))
            .await
            .map_err(|e| SlideError::Decode {
                message: format!("compose task failed: {}", e),
            })?;

        Ok(Region::new(image, level, origin))
    }

    fn check_tile(&self, level: usize, tile_x: u32, tile_y: u32) -> Result<(), SlideError> {
        let info = self.level_info(level)?;
        if tile_x >= info.tiles_x || tile_y >= info.tiles_y {
            return Err(SlideError::TileOutOfBounds {
                level,
                x: tile_x,
                y: tile_y,
                tiles_x: info.tiles_x,
                tiles_y: info.tiles_y,
            });
        }
        Ok(())
    }
}

impl<R: RangeReader + 'static> std::fmt::Debug for Eozin<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Eozin")
            .field("identifier", &self.identifier())
            .field("format", &self.format)
            .field("level_dimensions", &self.level_dimensions)
            .finish()
    }
}
