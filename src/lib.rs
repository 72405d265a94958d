//! # Eozin
//!
//! A reader for Whole Slide Images (WSI): gigapixel microscopy images stored
//! as pyramids of tiled TIFF directories.
//!
//! Slides are read on demand through byte ranges, so only the directories and
//! tiles a request touches are loaded from disk.
//!
//! ## Features
//!
//! - **Format support**: Aperio SVS and generic pyramidal tiled TIFF/BigTIFF
//! - **Codecs**: JPEG tiles (with shared JPEGTables) and, with the `jpeg2000`
//!   feature, Aperio JPEG 2000 tiles
//! - **Regions**: arbitrary rectangles from any level, stitched from tiles
//! - **Output**: JPEG or PNG, chosen from the file extension
//!
//! ## Architecture
//!
//! - [`io`] - Range readers and block caching
//! - [`mod@format`] - TIFF/SVS parsers and JPEG stream handling
//! - [`tile`] - Tile decoding, caching and image encoding
//! - [`region`] - Region planning and composition
//! - [`slide`] - The [`Eozin`] slide handle
//! - [`config`] - CLI configuration for the `eozin` binary
//!
//! ## Example
//!
//! ```rust,no_run
//! use eozin::Eozin;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), eozin::SlideError> {
//!     let slide = Eozin::open("CMU-1.svs").await?;
//!
//!     println!("level count: {}", slide.level_count());
//!     println!("level dimensions: {:?}", slide.level_dimensions());
//!     println!("dimensions: {:?}", slide.dimensions());
//!
//!     // Origin is in level 1 coordinates
//!     let region = slide.read_region((800, 900), 1, (1024, 768)).await?;
//!     region.save("region.png").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod io;
pub mod region;
pub mod slide;
pub mod tile;

// Re-export commonly used types
pub use error::{FormatError, IoError, SlideError, TiffError};
pub use format::{
    detect_format, is_tiff_header, GenericTiffReader, SlideFormat, SlideProperties, SvsMetadata,
    SvsReader, Tile,
};
pub use io::{BlockCache, FileRangeReader, MemoryRangeReader, RangeReader};
pub use region::{Region, RegionPlan, TilePatch};
pub use slide::{Eozin, LevelInfo, SlideOptions, SlideReader};
pub use tile::{ImageEncoder, OutputFormat, TileCache, TileDecoder};
