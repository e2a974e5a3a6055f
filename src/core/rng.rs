//! Deterministic Table-Driven Random Numbers
//!
//! One shared generator instance drives every random decision in the
//! simulation (spawn selection, animation timing, combat rolls). It is a
//! 256-entry byte table with a single wrapping index: the cheapest possible
//! state to snapshot, and trivially identical across implementations.
//!
//! The instance lives in [`crate::GameOptions`] and is threaded explicitly
//! through every consumer. There is no implicit global state.

use serde::{Deserialize, Serialize};

/// The fixed draw table. Every conforming implementation uses these exact
/// 256 bytes; the sequence is part of the demo-compatibility contract.
static DRAW_TABLE: [u8; 256] = [
    0, 8, 109, 220, 222, 241, 149, 107, 75, 248, 254, 140, 16, 66, 74, 21, 211, 47, 80, 242, 154,
    27, 205, 128, 161, 89, 77, 36, 95, 110, 85, 48, 212, 140, 211, 249, 22, 79, 200, 50, 28, 188,
    52, 140, 202, 120, 68, 145, 62, 70, 184, 190, 91, 197, 152, 224, 149, 104, 25, 178, 252, 182,
    202, 182, 141, 197, 4, 81, 181, 242, 145, 42, 39, 227, 156, 198, 225, 193, 219, 93, 122, 175,
    249, 0, 175, 143, 70, 239, 46, 246, 163, 53, 163, 109, 168, 135, 2, 235, 25, 92, 20, 145, 138,
    77, 69, 166, 78, 176, 173, 212, 166, 113, 94, 161, 41, 50, 239, 49, 111, 164, 70, 60, 2, 37,
    171, 75, 136, 156, 11, 56, 42, 146, 138, 229, 73, 146, 77, 61, 98, 196, 135, 106, 63, 197,
    195, 86, 96, 203, 113, 101, 170, 247, 181, 113, 80, 250, 108, 7, 255, 237, 129, 226, 79, 107,
    112, 166, 103, 241, 24, 223, 239, 120, 198, 58, 60, 82, 128, 3, 184, 66, 143, 224, 145, 224,
    81, 206, 163, 45, 63, 90, 168, 114, 59, 33, 159, 95, 28, 139, 123, 98, 125, 196, 15, 70, 194,
    253, 54, 14, 109, 226, 71, 17, 161, 93, 186, 87, 244, 138, 20, 52, 123, 251, 26, 36, 17, 46,
    52, 231, 232, 76, 31, 221, 84, 37, 216, 165, 212, 106, 197, 242, 98, 43, 39, 175, 254, 145,
    190, 84, 118, 222, 187, 136, 120, 163, 236, 249,
];

/// Deterministic table generator.
///
/// # Determinism Guarantee
///
/// Given the same starting index, the generator produces the exact same
/// byte sequence on any platform. The whole state is one byte.
///
/// # Example
///
/// ```
/// use phobos::core::rng::GameRng;
///
/// let mut rng = GameRng::new();
/// assert_eq!(rng.next_byte(), 8); // Always the same!
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRng {
    index: u8,
}

impl GameRng {
    /// Create a generator in the cleared state.
    pub const fn new() -> Self {
        Self { index: 0 }
    }

    /// Create a generator seeded at an arbitrary table position.
    pub const fn with_index(index: u8) -> Self {
        Self { index }
    }

    /// Draw the next byte.
    #[inline]
    pub fn next_byte(&mut self) -> u8 {
        self.index = self.index.wrapping_add(1);
        DRAW_TABLE[self.index as usize]
    }

    /// Reset to the cleared state. Called at level (re)start so identical
    /// level runs draw identical sequences.
    #[inline]
    pub fn clear(&mut self) {
        self.index = 0;
    }

    /// Current table index (for snapshots and diagnostics).
    #[inline]
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Restore a snapshotted index.
    #[inline]
    pub fn set_index(&mut self, index: u8) {
        self.index = index;
    }

    /// Symmetric roll in `[-255, 255]`: the difference of two draws.
    /// Used wherever an unbiased signed offset is needed.
    #[inline]
    pub fn spread(&mut self) -> i32 {
        let a = self.next_byte() as i32;
        let b = self.next_byte() as i32;
        a - b
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        // These values must never change: existing demo recordings
        // depend on them.
        let mut rng = GameRng::new();
        assert_eq!(rng.next_byte(), 8);
        assert_eq!(rng.next_byte(), 109);
        assert_eq!(rng.next_byte(), 220);
        assert_eq!(rng.next_byte(), 222);
    }

    #[test]
    fn test_determinism_long_run() {
        let mut a = GameRng::new();
        let mut b = GameRng::new();
        for _ in 0..10_000 {
            assert_eq!(a.next_byte(), b.next_byte());
        }
    }

    #[test]
    fn test_wraps_every_256_draws() {
        let mut rng = GameRng::new();
        let first: Vec<u8> = (0..256).map(|_| rng.next_byte()).collect();
        let second: Vec<u8> = (0..256).map(|_| rng.next_byte()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_clear_restarts_sequence() {
        let mut rng = GameRng::new();
        let head: Vec<u8> = (0..16).map(|_| rng.next_byte()).collect();
        rng.clear();
        let again: Vec<u8> = (0..16).map(|_| rng.next_byte()).collect();
        assert_eq!(head, again);
    }

    #[test]
    fn test_index_checkpoint() {
        let mut rng = GameRng::new();
        for _ in 0..50 {
            rng.next_byte();
        }
        let saved = rng.index();
        let expected: Vec<u8> = (0..10).map(|_| rng.next_byte()).collect();
        rng.set_index(saved);
        let replayed: Vec<u8> = (0..10).map(|_| rng.next_byte()).collect();
        assert_eq!(expected, replayed);
    }

    #[test]
    fn test_spread_range() {
        let mut rng = GameRng::new();
        for _ in 0..512 {
            let s = rng.spread();
            assert!((-255..=255).contains(&s));
        }
    }
}
