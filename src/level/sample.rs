//! Built-In Sample Level
//!
//! A complete, internally consistent one-room level assembled as raw lump
//! bytes: a 256x256 square sector split by one BSP node, with four player
//! starts, two deathmatch starts and a barrel. The headless tool and the
//! test suite load it through the same binary parsers as real content.

use super::lump::{MemoryLumps, NamedTextures};
use super::records::{
    LINE_STRIDE, ML_BLOCKING, NF_SUBSECTOR, NODE_STRIDE, SECTOR_STRIDE, SEG_STRIDE,
    SIDE_STRIDE, SUBSECTOR_STRIDE, THING_STRIDE, VERTEX_STRIDE,
};

/// Marker name of the sample level.
pub const SAMPLE_MAP: &str = "E1M1";

/// Thing type of the sample barrel.
pub const SAMPLE_BARREL: i16 = 2035;

struct Packer(Vec<u8>);

impl Packer {
    fn new() -> Self {
        Packer(Vec::new())
    }
    fn i16(&mut self, v: i16) -> &mut Self {
        self.0.extend(v.to_le_bytes());
        self
    }
    fn u16(&mut self, v: u16) -> &mut Self {
        self.0.extend(v.to_le_bytes());
        self
    }
    fn name(&mut self, v: &str) -> &mut Self {
        let mut field = [0u8; 8];
        field[..v.len()].copy_from_slice(v.as_bytes());
        self.0.extend(field);
        self
    }
    fn done(self, stride: usize) -> Vec<u8> {
        debug_assert_eq!(self.0.len() % stride, 0);
        self.0
    }
}

fn things() -> Vec<u8> {
    let mut p = Packer::new();
    // Player starts 1-4, present on every skill.
    let starts: [(i16, i16); 4] = [(64, 64), (192, 64), (64, 192), (192, 192)];
    for (i, &(x, y)) in starts.iter().enumerate() {
        p.i16(x).i16(y).i16(0).i16(i as i16 + 1).i16(7);
    }
    // Deathmatch starts.
    p.i16(128).i16(96).i16(0).i16(11).i16(7);
    p.i16(128).i16(160).i16(90).i16(11).i16(7);
    // One barrel.
    p.i16(224).i16(224).i16(0).i16(SAMPLE_BARREL).i16(7);
    p.done(THING_STRIDE)
}

fn linedefs() -> Vec<u8> {
    let mut p = Packer::new();
    // v1, v2, flags, special, tag, front side, back side. The right wall
    // carries an exit-switch special so it grows a sound origin.
    let walls: [(i16, i16, i16, i16); 4] = [
        (0, 1, 0, 0),
        (1, 2, 11, 0),
        (2, 3, 0, 0),
        (3, 0, 0, 0),
    ];
    for (i, (v1, v2, special, tag)) in walls.iter().enumerate() {
        p.i16(*v1)
            .i16(*v2)
            .i16(ML_BLOCKING as i16)
            .i16(*special)
            .i16(*tag)
            .i16(i as i16)
            .i16(-1);
    }
    p.done(LINE_STRIDE)
}

fn sidedefs() -> Vec<u8> {
    let mut p = Packer::new();
    for _ in 0..4 {
        p.i16(0).i16(0).name("-").name("-").name("BROWN1").i16(0);
    }
    p.done(SIDE_STRIDE)
}

fn vertexes() -> Vec<u8> {
    let mut p = Packer::new();
    let corners: [(i16, i16); 4] = [(0, 0), (256, 0), (256, 256), (0, 256)];
    for (x, y) in corners {
        p.i16(x).i16(y);
    }
    p.done(VERTEX_STRIDE)
}

fn segs() -> Vec<u8> {
    let mut p = Packer::new();
    // One seg per wall, running along the front side.
    let angles: [u16; 4] = [0x0000, 0x4000, 0x8000, 0xC000];
    for (i, bams) in angles.iter().enumerate() {
        p.i16(i as i16)
            .i16(((i + 1) % 4) as i16)
            .u16(*bams)
            .i16(i as i16)
            .i16(0)
            .i16(0);
    }
    p.done(SEG_STRIDE)
}

fn ssectors() -> Vec<u8> {
    let mut p = Packer::new();
    p.i16(2).i16(0); // right half: bottom + right walls
    p.i16(2).i16(2); // left half: top + left walls
    p.done(SUBSECTOR_STRIDE)
}

fn nodes() -> Vec<u8> {
    let mut p = Packer::new();
    // Partition x = 128 pointing +Y; front child is the right half.
    p.i16(128).i16(0).i16(0).i16(256);
    p.i16(256).i16(0).i16(128).i16(256); // front bbox: top, bottom, left, right
    p.i16(256).i16(0).i16(0).i16(128); // back bbox
    p.u16(NF_SUBSECTOR).u16(NF_SUBSECTOR | 1);
    p.done(NODE_STRIDE)
}

fn sectors() -> Vec<u8> {
    let mut p = Packer::new();
    p.i16(0)
        .i16(128)
        .name("FLOOR4_8")
        .name("CEIL3_5")
        .i16(160)
        .i16(0)
        .i16(0);
    p.done(SECTOR_STRIDE)
}

fn blockmap() -> Vec<u8> {
    // 3x3 grid at origin (0,0). Cell lists: the boundary walls cross the
    // edge cells, the center cell is empty.
    let cells: [Vec<u16>; 9] = [
        vec![0, 3],
        vec![0],
        vec![0, 1],
        vec![3],
        vec![],
        vec![1],
        vec![2, 3],
        vec![2],
        vec![1, 2],
    ];
    let mut words: Vec<u16> = vec![0, 0, 3, 3];
    let mut offset = 4 + cells.len();
    for cell in &cells {
        words.push(offset as u16);
        offset += cell.len() + 2; // zero marker + terminator
    }
    for cell in &cells {
        words.push(0);
        words.extend(cell);
        words.push(0xFFFF);
    }
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// Build the sample level's lump store and matching texture tables.
pub fn sample_level() -> (MemoryLumps, NamedTextures) {
    let mut store = MemoryLumps::new();
    store.push(SAMPLE_MAP, Vec::new());
    store.push("THINGS", things());
    store.push("LINEDEFS", linedefs());
    store.push("SIDEDEFS", sidedefs());
    store.push("VERTEXES", vertexes());
    store.push("SEGS", segs());
    store.push("SSECTORS", ssectors());
    store.push("NODES", nodes());
    store.push("SECTORS", sectors());
    store.push("REJECT", vec![0]);
    store.push("BLOCKMAP", blockmap());

    let textures = NamedTextures {
        textures: vec!["BROWN1".into()],
        flats: vec!["FLOOR4_8".into(), "CEIL3_5".into()],
    };
    (store, textures)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::lump::LumpStore;

    #[test]
    fn test_lump_layout() {
        let (store, _) = sample_level();
        assert_eq!(store.len(), 11);
        let marker = store.index_of(SAMPLE_MAP).unwrap();
        assert_eq!(store.name_of(marker + 1), "THINGS");
        assert_eq!(store.name_of(marker + 10), "BLOCKMAP");
        assert!(store.bytes_of(marker).is_empty());
    }

    #[test]
    fn test_record_counts() {
        let (store, _) = sample_level();
        let at = |n: usize| store.bytes_of(n).len();
        assert_eq!(at(1) / THING_STRIDE, 7);
        assert_eq!(at(2) / LINE_STRIDE, 4);
        assert_eq!(at(4) / VERTEX_STRIDE, 4);
        assert_eq!(at(7) / NODE_STRIDE, 1);
    }
}
