//! Uniform Spatial Grid
//!
//! The blockmap partitions map space into 128x128-unit cells. Each cell owns
//! a flat list of line indices (from the binary table, terminated by a
//! sentinel word) and the head of an intrusive list of mobile objects.
//!
//! A single spatial query may touch a line through several overlapping
//! cells; the generation-stamp scheme guarantees each line is visited once
//! per query. The caller supplies the generation number - this structure
//! only stamps and skips.

use crate::core::fixed::{Fixed, FRACBITS};

use super::lump::LevelError;
use super::records::LineDef;

/// Side length of one cell in map units.
pub const MAPBLOCKUNITS: i32 = 128;

/// Shift from fixed-point map coordinates to cell coordinates.
pub const BLOCK_SHIFT: i32 = FRACBITS + 7;

/// Sentinel word terminating each cell's line list.
const BLOCK_END: u16 = 0xFFFF;

/// The uniform grid over map bounds.
///
/// Cell line lists are immutable after load. The per-cell thing heads are
/// mutated by the world's position mutators, never by the blockmap itself.
#[derive(Debug, Clone)]
pub struct BlockMap {
    /// Grid origin X (fixed-point).
    pub origin_x: Fixed,
    /// Grid origin Y (fixed-point).
    pub origin_y: Fixed,
    /// Grid width in cells.
    pub width: usize,
    /// Grid height in cells.
    pub height: usize,
    /// The lump reinterpreted as words; offsets index into this.
    words: Vec<u16>,
    /// Per-cell offset of the line list, in words from the lump start.
    offsets: Vec<u16>,
    /// Per-cell head of the intrusive mobile-object list.
    thing_heads: Vec<Option<usize>>,
}

impl BlockMap {
    /// Parse the blockmap lump: a 4-word header (origin x/y, width, height),
    /// one offset word per cell, then the null-terminated cell lists.
    pub fn parse(bytes: &[u8]) -> Result<Self, LevelError> {
        if bytes.len() % 2 != 0 {
            return Err(LevelError::BadBlockMap {
                reason: "odd byte length",
            });
        }
        let words: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        if words.len() < 4 {
            return Err(LevelError::BadBlockMap {
                reason: "missing header",
            });
        }

        let origin_x = ((words[0] as i16) as i32) << FRACBITS;
        let origin_y = ((words[1] as i16) as i32) << FRACBITS;
        let width = words[2] as usize;
        let height = words[3] as usize;
        if width == 0 || height == 0 {
            return Err(LevelError::BadBlockMap {
                reason: "zero dimension",
            });
        }
        if words.len() < 4 + width * height {
            return Err(LevelError::BadBlockMap {
                reason: "offset table truncated",
            });
        }
        let offsets = words[4..4 + width * height].to_vec();

        Ok(Self {
            origin_x,
            origin_y,
            width,
            height,
            offsets,
            words,
            thing_heads: vec![None; width * height],
        })
    }

    /// Raw (unclamped) cell coordinates of a map point.
    #[inline]
    pub fn block_coords(&self, x: Fixed, y: Fixed) -> (i32, i32) {
        (
            x.wrapping_sub(self.origin_x) >> BLOCK_SHIFT,
            y.wrapping_sub(self.origin_y) >> BLOCK_SHIFT,
        )
    }

    /// Cell index of a map point, or `None` outside the grid.
    #[inline]
    pub fn cell_of(&self, x: Fixed, y: Fixed) -> Option<usize> {
        let (col, row) = self.block_coords(x, y);
        self.cell_at(col, row)
    }

    /// Cell index of grid coordinates, or `None` outside `[0,w) x [0,h)`.
    #[inline]
    pub fn cell_at(&self, col: i32, row: i32) -> Option<usize> {
        if col < 0 || row < 0 || col as usize >= self.width || row as usize >= self.height {
            return None;
        }
        Some(row as usize * self.width + col as usize)
    }

    /// Visit every line in one cell not yet stamped with `valid_count`,
    /// stamping as it goes. Out-of-range cells are empty, never an error.
    /// Iteration stops early when `f` returns `false`; the return value is
    /// `false` iff it did.
    pub fn for_each_line_in_block<F>(
        &self,
        col: i32,
        row: i32,
        lines: &mut [LineDef],
        valid_count: u32,
        f: &mut F,
    ) -> bool
    where
        F: FnMut(usize, &mut LineDef) -> bool,
    {
        let cell = match self.cell_at(col, row) {
            Some(cell) => cell,
            None => return true,
        };

        let mut at = self.offsets[cell] as usize;
        // Every list opens with a zero marker word.
        if self.words.get(at) == Some(&0) {
            at += 1;
        }
        while let Some(&word) = self.words.get(at) {
            if word == BLOCK_END {
                break;
            }
            at += 1;
            let index = word as usize;
            if index >= lines.len() {
                continue;
            }
            if lines[index].valid_count == valid_count {
                continue; // already visited by this query
            }
            lines[index].valid_count = valid_count;
            if !f(index, &mut lines[index]) {
                return false;
            }
        }
        true
    }

    /// Visit every line in the window of cells covering `bbox` coordinates
    /// (fixed-point, `left <= right`, `bottom <= top`), once each.
    pub fn for_each_line_in_box<F>(
        &self,
        left: Fixed,
        bottom: Fixed,
        right: Fixed,
        top: Fixed,
        lines: &mut [LineDef],
        valid_count: u32,
        f: &mut F,
    ) -> bool
    where
        F: FnMut(usize, &mut LineDef) -> bool,
    {
        let (xl, yl) = self.block_coords(left, bottom);
        let (xh, yh) = self.block_coords(right, top);
        // Cells beyond the grid are empty; clamp so the walk stays bounded.
        let (xl, yl) = (xl.max(0), yl.max(0));
        let (xh, yh) = (xh.min(self.width as i32 - 1), yh.min(self.height as i32 - 1));
        for row in yl..=yh {
            for col in xl..=xh {
                if !self.for_each_line_in_block(col, row, lines, valid_count, f) {
                    return false;
                }
            }
        }
        true
    }

    /// Head of the mobile-object list in a cell.
    #[inline]
    pub fn thing_head(&self, cell: usize) -> Option<usize> {
        self.thing_heads[cell]
    }

    /// Replace the head of the mobile-object list in a cell. Called only by
    /// the world's position mutators.
    #[inline]
    pub fn set_thing_head(&mut self, cell: usize, head: Option<usize>) {
        self.thing_heads[cell] = head;
    }

    /// Drop every thing link (level reload).
    pub fn clear_thing_heads(&mut self) {
        self.thing_heads.iter_mut().for_each(|h| *h = None);
    }
}

// =============================================================================
// TESTS
// =============================================================================
