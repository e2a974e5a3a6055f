//! The Cross-Linked Level Arena
//!
//! [`LevelMap`] owns every geometry record for one loaded level: vertices,
//! sectors, sides, lines, segs, subsectors, BSP nodes, raw things, the
//! blockmap and the reject table. Records reference each other by index into
//! these arenas; only the map frees them, en masse, on level unload.
//!
//! After parsing, a grouping pass computes each sector's bounding line set,
//! its blockmap-clamped block box, and the synthesized sound-effect origins
//! for sectors (box centroid) and special lines (segment midpoint).

use tracing::{debug, info, warn};

use crate::core::fixed::{fixed_mul, Fixed, FRACBITS, FRACUNIT};

use super::blockmap::BlockMap;
use super::lump::{LevelError, LumpStore, TextureLookup};
use super::records::{
    parse_lines, parse_nodes, parse_sectors, parse_segs, parse_sides, parse_subsectors,
    parse_things, parse_vertices, LineDef, MapThing, Node, Sector, Seg, SideDef, Subsector,
    Vertex,
};
use super::reject::Reject;

/// Largest radius any mobile object can have; pads sector block boxes so
/// radius-overlap queries near a boundary still find the sector's lines.
pub const MAXRADIUS: Fixed = 32 * FRACUNIT;

/// Lump order following a map marker.
const LUMP_THINGS: usize = 1;
const LUMP_LINEDEFS: usize = 2;
const LUMP_SIDEDEFS: usize = 3;
const LUMP_VERTEXES: usize = 4;
const LUMP_SEGS: usize = 5;
const LUMP_SSECTORS: usize = 6;
const LUMP_NODES: usize = 7;
const LUMP_SECTORS: usize = 8;
const LUMP_REJECT: usize = 9;
const LUMP_BLOCKMAP: usize = 10;

/// One loaded level's complete static geometry.
#[derive(Debug, Clone)]
pub struct LevelMap {
    /// Map marker name this level was loaded from.
    pub name: String,
    /// Vertex arena.
    pub vertices: Vec<Vertex>,
    /// Sector arena.
    pub sectors: Vec<Sector>,
    /// Side arena.
    pub sides: Vec<SideDef>,
    /// Line arena.
    pub lines: Vec<LineDef>,
    /// Seg arena.
    pub segs: Vec<Seg>,
    /// BSP leaf arena.
    pub subsectors: Vec<Subsector>,
    /// BSP node arena; the root is the last entry.
    pub nodes: Vec<Node>,
    /// Raw placed-object records, consumed at spawn time.
    pub things: Vec<MapThing>,
    /// The spatial index.
    pub blockmap: BlockMap,
    /// The sector-visibility table.
    pub reject: Reject,
}

impl LevelMap {
    /// Load a level from the lump store.
    ///
    /// Fails on a missing marker, a missing required lump, any lump whose
    /// length is not a multiple of its record stride, or a dangling index.
    /// A missing or short reject table is recovered locally.
    pub fn load(
        store: &dyn LumpStore,
        textures: &dyn TextureLookup,
        name: &str,
    ) -> Result<Self, LevelError> {
        let marker = store.index_of(name).ok_or_else(|| LevelError::MissingLump {
            name: name.to_string(),
        })?;

        let vertices = parse_vertices(required(store, marker, name, LUMP_VERTEXES, "VERTEXES")?)?;
        let sectors = parse_sectors(required(store, marker, name, LUMP_SECTORS, "SECTORS")?, textures)?;
        let sides = parse_sides(
            required(store, marker, name, LUMP_SIDEDEFS, "SIDEDEFS")?,
            textures,
            sectors.len(),
        )?;
        let lines = parse_lines(
            required(store, marker, name, LUMP_LINEDEFS, "LINEDEFS")?,
            &vertices,
            &sides,
        )?;
        let segs = parse_segs(required(store, marker, name, LUMP_SEGS, "SEGS")?, &vertices, &lines)?;
        let subsectors =
            parse_subsectors(required(store, marker, name, LUMP_SSECTORS, "SSECTORS")?, &segs)?;
        let nodes = parse_nodes(required(store, marker, name, LUMP_NODES, "NODES")?)?;
        let things = parse_things(required(store, marker, name, LUMP_THINGS, "THINGS")?)?;
        let blockmap = BlockMap::parse(required(store, marker, name, LUMP_BLOCKMAP, "BLOCKMAP")?)?;

        // The reject table is optional: substitute an empty one and let the
        // zero-padding rule cover every pair.
        let reject_bytes = if marker + LUMP_REJECT < store.len() {
            store.bytes_of(marker + LUMP_REJECT)
        } else {
            warn!(map = name, "no reject lump, assuming empty");
            &[]
        };
        let reject = Reject::from_lump(reject_bytes, sectors.len());

        let mut map = Self {
            name: name.to_string(),
            vertices,
            sectors,
            sides,
            lines,
            segs,
            subsectors,
            nodes,
            things,
            blockmap,
            reject,
        };
        map.group_lines();

        info!(
            map = name,
            vertices = map.vertices.len(),
            lines = map.lines.len(),
            sectors = map.sectors.len(),
            subsectors = map.subsectors.len(),
            things = map.things.len(),
            "level loaded"
        );
        Ok(map)
    }

    /// Compute per-sector line sets, bounding boxes, block boxes and sound
    /// origins. Runs once, after all records are parsed and cross-linked.
    fn group_lines(&mut self) {
        let mut boxes = vec![super::records::BBox::cleared(); self.sectors.len()];

        for (i, line) in self.lines.iter_mut().enumerate() {
            let front = line.front_sector;
            self.sectors[front].lines.push(i);
            boxes[front].add(self.vertices[line.v1].x, self.vertices[line.v1].y);
            boxes[front].add(self.vertices[line.v2].x, self.vertices[line.v2].y);
            if let Some(back) = line.back_sector {
                if back != front {
                    self.sectors[back].lines.push(i);
                    boxes[back].add(self.vertices[line.v1].x, self.vertices[line.v1].y);
                    boxes[back].add(self.vertices[line.v2].x, self.vertices[line.v2].y);
                }
            }

            // Special lines get a sound origin at their midpoint.
            if line.special != 0 {
                line.sound_org = Some(Vertex {
                    x: midpoint(self.vertices[line.v1].x, self.vertices[line.v2].x),
                    y: midpoint(self.vertices[line.v1].y, self.vertices[line.v2].y),
                });
            }
        }

        let bm = &self.blockmap;
        for (sector, bbox) in self.sectors.iter_mut().zip(&boxes) {
            if sector.lines.is_empty() {
                debug!("sector with no lines");
                continue;
            }
            sector.sound_org = Vertex {
                x: midpoint(bbox.left, bbox.right),
                y: midpoint(bbox.bottom, bbox.top),
            };

            // Block box padded by the largest object radius, clamped to the
            // grid so later cell walks never index out of range.
            let clamp_col = |x: Fixed| -> i32 {
                (x.wrapping_sub(bm.origin_x) >> super::blockmap::BLOCK_SHIFT)
                    .clamp(0, bm.width as i32 - 1)
            };
            let clamp_row = |y: Fixed| -> i32 {
                (y.wrapping_sub(bm.origin_y) >> super::blockmap::BLOCK_SHIFT)
                    .clamp(0, bm.height as i32 - 1)
            };
            sector.block_box = [
                clamp_row(bbox.top.wrapping_add(MAXRADIUS)),
                clamp_row(bbox.bottom.wrapping_sub(MAXRADIUS)),
                clamp_col(bbox.left.wrapping_sub(MAXRADIUS)),
                clamp_col(bbox.right.wrapping_add(MAXRADIUS)),
            ];
        }
    }

    /// Which side of a node's partition line a point is on: 0 = front,
    /// 1 = back. Axis-aligned partitions take the exact path; the general
    /// case compares cross products in reduced precision, exactly as the
    /// renderer and the sight code expect.
    pub fn point_on_node_side(&self, x: Fixed, y: Fixed, node: &Node) -> usize {
        if node.dx == 0 {
            return if x <= node.x {
                (node.dy > 0) as usize
            } else {
                (node.dy < 0) as usize
            };
        }
        if node.dy == 0 {
            return if y <= node.y {
                (node.dx < 0) as usize
            } else {
                (node.dx > 0) as usize
            };
        }

        let dx = x.wrapping_sub(node.x);
        let dy = y.wrapping_sub(node.y);
        let left = fixed_mul(node.dy >> FRACBITS, dx);
        let right = fixed_mul(dy, node.dx >> FRACBITS);
        if right < left {
            0
        } else {
            1
        }
    }

    /// Subsector containing a point, by iterative BSP descent from the
    /// root. Single-subsector maps have no nodes; everything is leaf 0.
    pub fn point_in_subsector(&self, x: Fixed, y: Fixed) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut child = (self.nodes.len() - 1) as u16;
        loop {
            let node = &self.nodes[child as usize];
            let side = self.point_on_node_side(x, y, node);
            child = node.children[side];
            if Node::child_is_leaf(child) {
                return Node::child_index(child);
            }
        }
    }

    /// Sector containing a point.
    pub fn sector_at(&self, x: Fixed, y: Fixed) -> usize {
        self.subsectors[self.point_in_subsector(x, y)].sector
    }
}

/// Midpoint without intermediate overflow.
#[inline]
fn midpoint(a: Fixed, b: Fixed) -> Fixed {
    ((a as i64 + b as i64) / 2) as Fixed
}

/// Fetch a required lump at a fixed offset after the map marker.
fn required<'s>(
    store: &'s dyn LumpStore,
    marker: usize,
    map_name: &str,
    offset: usize,
    what: &str,
) -> Result<&'s [u8], LevelError> {
    if marker + offset >= store.len() {
        return Err(LevelError::MissingLump {
            name: format!("{map_name}/{what}"),
        });
    }
    Ok(store.bytes_of(marker + offset))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixed::from_int;
    use crate::level::sample::{sample_level, SAMPLE_MAP};

    #[test]
    fn test_load_sample_level() {
        let (store, textures) = sample_level();
        let map = LevelMap::load(&store, &textures, SAMPLE_MAP).unwrap();
        assert_eq!(map.vertices.len(), 4);
        assert_eq!(map.lines.len(), 4);
        assert_eq!(map.sectors.len(), 1);
        assert_eq!(map.subsectors.len(), 2);
        assert_eq!(map.nodes.len(), 1);
    }

    #[test]
    fn test_missing_marker_is_fatal() {
        let (store, textures) = sample_level();
        let err = LevelMap::load(&store, &textures, "E9M9").unwrap_err();
        assert!(matches!(err, LevelError::MissingLump { .. }));
    }

    #[test]
    fn test_grouping() {
        let (store, textures) = sample_level();
        let map = LevelMap::load(&store, &textures, SAMPLE_MAP).unwrap();

        // Every line bounds the single sector.
        assert_eq!(map.sectors[0].lines, vec![0, 1, 2, 3]);

        // Sound origin sits at the centroid of the 256x256 box.
        assert_eq!(map.sectors[0].sound_org.x, from_int(128));
        assert_eq!(map.sectors[0].sound_org.y, from_int(128));

        // Block box is clamped to the 3x3 grid.
        let bb = map.sectors[0].block_box;
        assert_eq!(bb, [2, 0, 0, 2]);
    }

    #[test]
    fn test_special_line_sound_origin() {
        let (store, textures) = sample_level();
        let map = LevelMap::load(&store, &textures, SAMPLE_MAP).unwrap();
        // Line 1 (the right wall) carries a special in the sample level.
        let org = map.lines[1].sound_org.expect("special line origin");
        assert_eq!(org.x, from_int(256));
        assert_eq!(org.y, from_int(128));
        assert_eq!(map.lines[0].sound_org, None);
    }

    #[test]
    fn test_point_in_subsector() {
        let (store, textures) = sample_level();
        let map = LevelMap::load(&store, &textures, SAMPLE_MAP).unwrap();

        // Partition is the vertical line x = 128 pointing +Y: the right
        // half is the front child (leaf 0), the left half the back (leaf 1).
        assert_eq!(map.point_in_subsector(from_int(200), from_int(64)), 0);
        assert_eq!(map.point_in_subsector(from_int(10), from_int(10)), 1);
        assert_eq!(map.sector_at(from_int(200), from_int(64)), 0);
    }
}
