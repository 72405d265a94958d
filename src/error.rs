use thiserror::Error;

/// I/O errors that can occur when reading slide bytes
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error reported by the underlying storage (file system, memory buffer)
    #[error("Read error: {0}")]
    Read(String),

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Slide file does not exist
    #[error("File not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => IoError::NotFound(err.to_string()),
            _ => IoError::Read(err.to_string()),
        }
    }
}

/// Errors related to format detection and validation
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// TIFF parsing error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// File is a TIFF, but not one this crate can read as a slide
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },
}

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// IFD bytes end before the declared entries do
    #[error("Truncated IFD: expected {expected} bytes, got {actual}")]
    TruncatedIfd { expected: usize, actual: usize },

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme
    #[error("Unsupported compression: {0} (only JPEG and JPEG 2000 are supported)")]
    UnsupportedCompression(String),

    /// File uses strips instead of tiles
    #[error("Unsupported organization: file uses strips instead of tiles")]
    StripOrganization,

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),
}

/// Errors surfaced by the slide handle when reading tiles and regions
#[derive(Debug, Clone, Error)]
pub enum SlideError {
    /// The slide could not be opened or recognized
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Structural error while reading tile data
    #[error(transparent)]
    Tiff(#[from] TiffError),

    /// Pyramid level does not exist
    #[error("Invalid level {level}: slide has {level_count} levels")]
    InvalidLevel { level: usize, level_count: usize },

    /// Tile coordinates outside the level's tile grid
    #[error(
        "Tile ({x}, {y}) out of bounds for level {level}: grid is {tiles_x}x{tiles_y} tiles"
    )]
    TileOutOfBounds {
        level: usize,
        x: u32,
        y: u32,
        tiles_x: u32,
        tiles_y: u32,
    },

    /// Region extends past the level's pixel extent
    #[error(
        "Region {width}x{height} at ({x}, {y}) exceeds level {level} bounds {level_width}x{level_height}"
    )]
    RegionOutOfBounds {
        level: usize,
        x: u64,
        y: u64,
        width: u32,
        height: u32,
        level_width: u32,
        level_height: u32,
    },

    /// Region with zero width or height
    #[error("Empty region: {width}x{height}")]
    EmptyRegion { width: u32, height: u32 },

    /// Tile bytes could not be decoded into pixels
    #[error("Failed to decode tile: {message}")]
    Decode { message: String },

    /// Pixels could not be encoded for output
    #[error("Failed to encode image: {message}")]
    Encode { message: String },

    /// Output path has no extension this crate can write
    #[error("Unsupported output format for '{path}' (use .jpg, .jpeg or .png)")]
    UnsupportedOutputFormat { path: String },

    /// Writing the output file failed
    #[error("Failed to write '{path}': {message}")]
    Output { path: String, message: String },

    /// The slide file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}
