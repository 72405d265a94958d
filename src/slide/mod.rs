//! Slide access independent of the file format.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │                 Eozin                   │
//! │  (detects format, caches, reads regions)│
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           SlideReader Trait             │
//! │  (format-agnostic slide interface)      │
//! └────────────────────┬────────────────────┘
//!                      │
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//! ┌─────────────────┐    ┌─────────────────────┐
//! │   SvsReader     │    │ GenericTiffReader   │
//! │  (Aperio SVS)   │    │ (tiled TIFF)        │
//! └─────────────────┘    └─────────────────────┘
//! ```

mod handle;
mod reader;

pub use handle::{Eozin, SlideOptions};
pub use reader::{LevelInfo, SlideReader};
