//! Binary Map Model
//!
//! Everything the simulation knows about static level geometry: record
//! parsing from flat binary lumps, the cross-linked level arena, the
//! blockmap spatial index, and the sector-visibility reject table.
//!
//! ## Module Structure
//!
//! - `lump`: named-lump store abstraction and texture lookup seams
//! - `records`: fixed-stride binary record parsers
//! - `map`: the cross-linked [`map::LevelMap`] arena and BSP queries
//! - `blockmap`: uniform spatial grid with generation-stamped queries
//! - `reject`: sector-pair visibility bitmap
//! - `preload`: parallel construction of read-only resource tables
//! - `sample`: a tiny built-in level for tools and tests

pub mod blockmap;
pub mod lump;
pub mod map;
pub mod preload;
pub mod records;
pub mod reject;
pub mod sample;

// Re-export key types
pub use blockmap::BlockMap;
pub use lump::{LevelError, LumpStore, MemoryLumps, TextureLookup};
pub use map::LevelMap;
pub use reject::Reject;
