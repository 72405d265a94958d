//! Tile pixels: decoding, caching and encoding.
//!
//! ```text
//!  format::Tile ──► TileDecoder ──► TileCache ──► region composition
//!                                                        │
//!                                                        ▼
//!                                                  ImageEncoder
//! ```
//!
//! # Components
//!
//! - [`TileDecoder`]: JPEG and JPEG 2000 tiles to RGB pixels
//! - [`TileCache`]: LRU of decoded tiles with size-based eviction
//! - [`ImageEncoder`]: JPEG/PNG output, format picked from the file extension

mod cache;
mod decoder;
mod encoder;

pub use cache::{TileCache, TileCacheKey, DEFAULT_TILE_CACHE_CAPACITY};
pub use decoder::{decode_jp2k, decode_jpeg, ycbcr_to_rgb, TileDecoder, BACKGROUND};
pub use encoder::{
    clamp_quality, is_valid_quality, ImageEncoder, OutputFormat, DEFAULT_JPEG_QUALITY,
    MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
