//! Command-line configuration for the `eozin` binary.
//!
//! Options can be given as flags or through environment variables with the
//! `EOZIN_` prefix:
//!
//! - `EOZIN_BLOCK_SIZE` - Bytes per cached file block (default: 64KB)
//! - `EOZIN_CACHE_BLOCKS` - Number of cached file blocks (default: 256)
//! - `EOZIN_CACHE_TILES` - Bytes of decoded tiles to cache (default: 64MB)
//! - `EOZIN_JPEG_QUALITY` - JPEG quality for written images (default: 90)
//!
//! # Example
//!
//! ```text
//! eozin info CMU-1.svs --json
//! eozin region CMU-1.svs --x 800 --y 900 --level 1 --width 512 --height 512 -o region.png
//! eozin tile CMU-1.svs --level 0 --col 3 --row 2 -o tile.jpg
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::io::{DEFAULT_BLOCK_CACHE_CAPACITY, DEFAULT_BLOCK_SIZE};
use crate::slide::SlideOptions;
use crate::tile::{OutputFormat, DEFAULT_JPEG_QUALITY, DEFAULT_TILE_CACHE_CAPACITY};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Eozin - read whole slide images.
///
/// Prints slide metadata and extracts tiles or pixel regions from pyramidal
/// TIFF slides (Aperio SVS and generic tiled TIFF).
#[derive(Parser, Debug, Clone)]
#[command(name = "eozin")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub options: CommonOptions,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print levels, dimensions and properties of a slide.
    Info(InfoConfig),

    /// Extract a pixel region from one level and write it to an image file.
    Region(RegionConfig),

    /// Decode a single tile and write it to an image file.
    Tile(TileConfig),
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct CommonOptions {
    /// Bytes per cached block of the slide file.
    #[arg(long, global = true, default_value_t = DEFAULT_BLOCK_SIZE, env = "EOZIN_BLOCK_SIZE")]
    pub block_size: usize,

    /// Number of file blocks kept in memory.
    #[arg(long, global = true, default_value_t = DEFAULT_BLOCK_CACHE_CAPACITY, env = "EOZIN_CACHE_BLOCKS")]
    pub cache_blocks: usize,

    /// Bytes of decoded tile pixels kept in memory.
    #[arg(long, global = true, default_value_t = DEFAULT_TILE_CACHE_CAPACITY, env = "EOZIN_CACHE_TILES")]
    pub cache_tiles: usize,

    /// JPEG quality for written images (1-100).
    #[arg(long, global = true, default_value_t = DEFAULT_JPEG_QUALITY, env = "EOZIN_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Enable debug logging.
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct InfoConfig {
    /// Path to the slide file.
    pub path: PathBuf,

    /// Print as JSON instead of text.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RegionConfig {
    /// Path to the slide file.
    pub path: PathBuf,

    /// Left edge, in the level's pixel coordinates.
    #[arg(long, default_value_t = 0)]
    pub x: u64,

    /// Top edge, in the level's pixel coordinates.
    #[arg(long, default_value_t = 0)]
    pub y: u64,

    /// Pyramid level (0 = full resolution).
    #[arg(short, long, default_value_t = 0)]
    pub level: usize,

    #[arg(long)]
    pub width: u32,

    #[arg(long)]
    pub height: u32,

    /// Output file; the extension (.jpg, .jpeg, .png) picks the format.
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct TileConfig {
    /// Path to the slide file.
    pub path: PathBuf,

    /// Pyramid level (0 = full resolution).
    #[arg(short, long, default_value_t = 0)]
    pub level: usize,

    /// Tile column.
    #[arg(long)]
    pub col: u32,

    /// Tile row.
    #[arg(long)]
    pub row: u32,

    /// Output file; the extension (.jpg, .jpeg, .png) picks the format.
    #[arg(short, long)]
    pub output: PathBuf,
}

impl Cli {
    /// Check option values clap cannot check on its own.
    pub fn validate(&self) -> Result<(), String> {
        self.options.validate()?;

        let output = match &self.command {
            Command::Info(_) => return Ok(()),
            Command::Region(region) => {
                if region.width == 0 || region.height == 0 {
                    return Err("region width and height must be greater than 0".to_string());
                }
                &region.output
            }
            Command::Tile(tile) => &tile.output,
        };

        if OutputFormat::from_path(output).is_none() {
            return Err(format!(
                "unsupported output format for '{}' (use .jpg, .jpeg or .png)",
                output.display()
            ));
        }

        Ok(())
    }
}

impl CommonOptions {
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_blocks == 0 {
            return Err("cache_blocks must be greater than 0".to_string());
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        if self.block_size < 1024 || self.block_size > 16 * 1024 * 1024 {
            return Err("block_size must be between 1KB and 16MB".to_string());
        }

        Ok(())
    }

    pub fn slide_options(&self) -> SlideOptions {
        SlideOptions {
            block_size: self.block_size,
            block_cache_capacity: self.cache_blocks,
            tile_cache_bytes: self.cache_tiles,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
