//! Named-Lump Store and Lookup Seams
//!
//! The simulation core never parses archive containers. It consumes a
//! byte-addressable store of named lumps through [`LumpStore`], and resolves
//! surface names through [`TextureLookup`]. The presentation layer owns the
//! real implementations; [`MemoryLumps`] backs tools and tests.

use thiserror::Error;
use tracing::warn;

/// Length of an on-disk name field.
pub const NAME_LEN: usize = 8;

/// Errors raised while loading a level.
///
/// Fatal conditions abort the load: a level cannot run on corrupt geometry.
/// Recoverable conditions (missing optional resources) are handled locally
/// by the parsers and never surface here.
#[derive(Debug, Clone, Error)]
pub enum LevelError {
    /// A required named lump is absent from the store.
    #[error("missing required lump {name}")]
    MissingLump {
        /// The name that failed to resolve.
        name: String,
    },

    /// A lump's byte length is not a multiple of its record stride.
    #[error("lump {lump}: length {len} is not a multiple of record stride {stride}")]
    BadLumpSize {
        /// Which lump failed validation.
        lump: &'static str,
        /// Actual byte length.
        len: usize,
        /// Required record stride.
        stride: usize,
    },

    /// A record referenced an index outside its target arena.
    #[error("lump {lump}: record {record} references index {index} (max {max})")]
    BadIndex {
        /// Which lump contained the bad record.
        lump: &'static str,
        /// Record ordinal within the lump.
        record: usize,
        /// The out-of-range index.
        index: usize,
        /// Exclusive upper bound of the target arena.
        max: usize,
    },

    /// The blockmap header disagrees with the lump length.
    #[error("blockmap: {reason}")]
    BadBlockMap {
        /// Human-readable inconsistency.
        reason: &'static str,
    },
}

/// A byte-addressable store of named lumps.
///
/// Implementations must be cheap to read repeatedly; the loader makes one
/// pass per lump but the preload step reads several lumps concurrently.
pub trait LumpStore {
    /// Number of lumps in the store.
    fn len(&self) -> usize;

    /// True when the store holds no lumps.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve a name to a lump index. Later lumps shadow earlier ones with
    /// the same name, so the search runs back to front.
    fn index_of(&self, name: &str) -> Option<usize>;

    /// Name of the lump at `index`.
    fn name_of(&self, index: usize) -> &str;

    /// Bytes of the lump at `index`.
    fn bytes_of(&self, index: usize) -> &[u8];
}

/// In-memory lump store for tools and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryLumps {
    lumps: Vec<(String, Vec<u8>)>,
}

impl MemoryLumps {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a lump. Names are uppercased on insert so lookup semantics
    /// match the on-disk convention.
    pub fn push(&mut self, name: &str, bytes: Vec<u8>) {
        self.lumps.push((name.to_ascii_uppercase(), bytes));
    }
}

impl LumpStore for MemoryLumps {
    fn len(&self) -> usize {
        self.lumps.len()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        let upper = name.to_ascii_uppercase();
        self.lumps.iter().rposition(|(n, _)| *n == upper)
    }

    fn name_of(&self, index: usize) -> &str {
        &self.lumps[index].0
    }

    fn bytes_of(&self, index: usize) -> &[u8] {
        &self.lumps[index].1
    }
}

/// Resolves surface names to indices in the presentation layer's tables.
///
/// Lookups return `None` for unknown names rather than failing; the loader
/// decides per call site whether that is tolerable.
pub trait TextureLookup {
    /// Resolve a wall texture name to an index.
    fn texture_index(&self, name: &str) -> Option<usize>;

    /// Resolve a floor/ceiling flat name to an index.
    fn flat_index(&self, name: &str) -> Option<usize>;
}

/// A lookup over plain name lists, for tools and tests.
#[derive(Debug, Default, Clone)]
pub struct NamedTextures {
    /// Wall texture names, position = index.
    pub textures: Vec<String>,
    /// Flat names, position = index.
    pub flats: Vec<String>,
}

impl TextureLookup for NamedTextures {
    fn texture_index(&self, name: &str) -> Option<usize> {
        self.textures.iter().position(|n| n.eq_ignore_ascii_case(name))
    }

    fn flat_index(&self, name: &str) -> Option<usize> {
        self.flats.iter().position(|n| n.eq_ignore_ascii_case(name))
    }
}

/// Decode an on-disk name field: NUL-terminated, at most 8 bytes,
/// ASCII-uppercased. No locale-aware casing.
pub fn decode_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    field[..end]
        .iter()
        .map(|&b| (b as char).to_ascii_uppercase())
        .collect()
}

/// Sentinel texture index meaning "no texture here" (the `-` name).
pub const TEXTURE_NONE: i16 = 0;

/// Sentinel texture index meaning "name did not resolve".
pub const TEXTURE_MISSING: i16 = -1;

/// Resolve a wall texture name field from a side record.
///
/// A leading `-` is the explicit "no texture" sentinel and maps to index 0.
/// An unknown name maps to -1 with a warning; archives legitimately
/// reference missing patches, so this path must never fail the load.
pub fn resolve_texture(lookup: &dyn TextureLookup, field: &[u8]) -> i16 {
    let name = decode_name(field);
    if name.starts_with('-') || name.is_empty() {
        return TEXTURE_NONE;
    }
    match lookup.texture_index(&name) {
        Some(index) => index as i16,
        None => {
            warn!(texture = %name, "unresolved wall texture name");
            TEXTURE_MISSING
        }
    }
}

/// Resolve a flat name field from a sector record.
///
/// Unknown flats fall back to index 0 with a warning rather than failing.
pub fn resolve_flat(lookup: &dyn TextureLookup, field: &[u8]) -> i16 {
    let name = decode_name(field);
    match lookup.flat_index(&name) {
        Some(index) => index as i16,
        None => {
            warn!(flat = %name, "unresolved flat name");
            0
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_name() {
        assert_eq!(decode_name(b"STARTAN3"), "STARTAN3");
        assert_eq!(decode_name(b"door\0\0\0\0"), "DOOR");
        assert_eq!(decode_name(b"\0\0\0\0\0\0\0\0"), "");
    }

    #[test]
    fn test_memory_lumps_shadowing() {
        let mut store = MemoryLumps::new();
        store.push("E1M1", vec![1]);
        store.push("other", vec![2]);
        store.push("e1m1", vec![3]);
        // Later lump with the same name wins
        let idx = store.index_of("E1M1").unwrap();
        assert_eq!(store.bytes_of(idx), &[3]);
        assert_eq!(store.index_of("E9M9"), None);
    }

    #[test]
    fn test_resolve_texture_sentinels() {
        let lookup = NamedTextures {
            textures: vec!["WALL1".into(), "WALL2".into()],
            flats: vec!["FLOOR1".into()],
        };
        assert_eq!(resolve_texture(&lookup, b"-\0\0\0\0\0\0\0"), TEXTURE_NONE);
        assert_eq!(resolve_texture(&lookup, b"WALL2\0\0\0"), 1);
        // Unknown names are tolerated, not fatal
        assert_eq!(resolve_texture(&lookup, b"NOSUCH\0\0"), TEXTURE_MISSING);
        assert_eq!(resolve_flat(&lookup, b"FLOOR1\0\0"), 0);
        assert_eq!(resolve_flat(&lookup, b"NOSUCH\0\0"), 0);
    }
}
