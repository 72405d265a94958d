//! Format parsers for Whole Slide Image files.
//!
//! # Format Detection
//!
//! Use [`detect::detect_format`] to identify the format of a slide file.
//! Currently supported formats:
//!
//! - **Aperio SVS**: Identified by "Aperio" marker in ImageDescription
//! - **Generic Pyramidal TIFF**: Standard tiled TIFF with pyramid structure

pub mod detect;
pub mod generic_tiff;
pub mod jpeg;
pub mod level;
pub mod properties;
pub mod svs;
pub mod tiff;

pub use detect::{detect_format, is_tiff_header, SlideFormat};
pub use generic_tiff::GenericTiffReader;
pub use level::{LevelData, Tile};
pub use properties::SlideProperties;
pub use svs::{SvsMetadata, SvsReader};
