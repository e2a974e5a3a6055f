//! Save and Load Snapshots
//!
//! A save is a single buffer: one version byte, then a bincode body holding
//! the complete [`GameOptions`] graph (players, map selection, generator
//! state) and the mutable world state. Saving is synchronous and whole;
//! loading either fully replaces the simulation state or fails outright -
//! there is no partial application.
//!
//! The static geometry is NOT stored: loading re-reads the level from the
//! content store and lays the mutable state back over it, which is why a
//! save only applies to the archive it was taken against.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::angle::Angle;
use crate::core::fixed::Fixed;
use crate::level::map::LevelMap;
use crate::MAX_PLAYERS;

use super::game::GameOptions;
use super::player::Player;
use super::world::{Thing, World};

/// Save format version this build writes and accepts.
pub const SAVE_VERSION: u8 = 1;

/// Errors raised by save/load.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The buffer was written by an incompatible version.
    #[error("save version {found} does not match supported version {expected}")]
    VersionMismatch {
        /// Version byte found.
        found: u8,
        /// Version supported.
        expected: u8,
    },

    /// The buffer is empty or its body failed to decode.
    #[error("save body failed to decode: {0}")]
    Codec(#[from] bincode::Error),

    /// The snapshot disagrees with the loaded level's geometry.
    #[error("save geometry mismatch in {what}: {have} records vs {expected}")]
    GeometryMismatch {
        /// Which arena disagreed.
        what: &'static str,
        /// Records in the snapshot.
        have: usize,
        /// Records in the loaded level.
        expected: usize,
    },
}

/// Mutable per-sector state.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SectorSnap {
    floor_height: Fixed,
    ceiling_height: Fixed,
    floor_pic: i16,
    ceiling_pic: i16,
    light_level: i16,
    special: i16,
    tag: i16,
}

/// Mutable per-side state.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SideSnap {
    texture_offset: Fixed,
    row_offset: Fixed,
    top_texture: i16,
    bottom_texture: i16,
    mid_texture: i16,
}

/// Mutable per-line state.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LineSnap {
    flags: u16,
    special: i16,
    tag: i16,
}

/// One mobile object, spatial links excluded (rebuilt on restore).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ThingSnap {
    x: Fixed,
    y: Fixed,
    z: Fixed,
    angle: Angle,
    radius: Fixed,
    height: Fixed,
    flags: u32,
    kind: i16,
    health: i32,
    player: Option<usize>,
}

/// The world half of a save: everything the simulation mutates.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldSnap {
    level_time: u32,
    total_kills: u32,
    total_items: u32,
    total_secrets: u32,
    sectors: Vec<SectorSnap>,
    sides: Vec<SideSnap>,
    lines: Vec<LineSnap>,
    things: Vec<ThingSnap>,
}

/// A decoded save buffer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaveGame {
    /// Free-form slot description.
    pub description: String,
    /// The configuration graph, players and generator included.
    pub options: GameOptions,
    /// The mutable world state.
    pub world_state: WorldSnap,
}

/// Serialize the full simulation state into a save buffer.
pub fn save(
    options: &GameOptions,
    map: &LevelMap,
    world: &World,
    description: &str,
) -> Result<Vec<u8>, SaveError> {
    let snap = WorldSnap {
        level_time: world.level_time,
        total_kills: world.total_kills,
        total_items: world.total_items,
        total_secrets: world.total_secrets,
        sectors: map
            .sectors
            .iter()
            .map(|s| SectorSnap {
                floor_height: s.floor_height,
                ceiling_height: s.ceiling_height,
                floor_pic: s.floor_pic,
                ceiling_pic: s.ceiling_pic,
                light_level: s.light_level,
                special: s.special,
                tag: s.tag,
            })
            .collect(),
        sides: map
            .sides
            .iter()
            .map(|s| SideSnap {
                texture_offset: s.texture_offset,
                row_offset: s.row_offset,
                top_texture: s.top_texture,
                bottom_texture: s.bottom_texture,
                mid_texture: s.mid_texture,
            })
            .collect(),
        lines: map
            .lines
            .iter()
            .map(|l| LineSnap {
                flags: l.flags,
                special: l.special,
                tag: l.tag,
            })
            .collect(),
        things: world
            .things()
            .map(|(_, t)| ThingSnap {
                x: t.x,
                y: t.y,
                z: t.z,
                angle: t.angle,
                radius: t.radius,
                height: t.height,
                flags: t.flags,
                kind: t.kind,
                health: t.health,
                player: t.player,
            })
            .collect(),
    };
    let body = SaveGame {
        description: description.to_string(),
        options: options.clone(),
        world_state: snap,
    };

    let mut bytes = vec![SAVE_VERSION];
    bytes.extend(bincode::serialize(&body)?);
    Ok(bytes)
}

/// Decode a save buffer. Version mismatch is fatal and checked before the
/// body is touched.
pub fn load(bytes: &[u8]) -> Result<SaveGame, SaveError> {
    let Some((&version, body)) = bytes.split_first() else {
        return Err(SaveError::VersionMismatch {
            found: 0,
            expected: SAVE_VERSION,
        });
    };
    if version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            found: version,
            expected: SAVE_VERSION,
        });
    }
    Ok(bincode::deserialize(body)?)
}

/// Lay a snapshot's mutable state over a freshly loaded level, replacing
/// the world's things and rebinding the player slots.
pub fn apply(
    snap: &WorldSnap,
    map: &mut LevelMap,
    world: &mut World,
    players: &mut [Player; MAX_PLAYERS],
) -> Result<(), SaveError> {
    let check = |what: &'static str, have: usize, expected: usize| {
        if have != expected {
            Err(SaveError::GeometryMismatch {
                what,
                have,
                expected,
            })
        } else {
            Ok(())
        }
    };
    check("sectors", snap.sectors.len(), map.sectors.len())?;
    check("sides", snap.sides.len(), map.sides.len())?;
    check("lines", snap.lines.len(), map.lines.len())?;

    for (sector, s) in map.sectors.iter_mut().zip(&snap.sectors) {
        sector.floor_height = s.floor_height;
        sector.ceiling_height = s.ceiling_height;
        sector.floor_pic = s.floor_pic;
        sector.ceiling_pic = s.ceiling_pic;
        sector.light_level = s.light_level;
        sector.special = s.special;
        sector.tag = s.tag;
    }
    for (side, s) in map.sides.iter_mut().zip(&snap.sides) {
        side.texture_offset = s.texture_offset;
        side.row_offset = s.row_offset;
        side.top_texture = s.top_texture;
        side.bottom_texture = s.bottom_texture;
        side.mid_texture = s.mid_texture;
    }
    for (line, l) in map.lines.iter_mut().zip(&snap.lines) {
        line.flags = l.flags;
        line.special = l.special;
        line.tag = l.tag;
    }

    world.clear_things(map);
    world.level_time = snap.level_time;
    world.total_kills = snap.total_kills;
    world.total_items = snap.total_items;
    world.total_secrets = snap.total_secrets;

    for player in players.iter_mut() {
        player.thing = None;
    }
    for t in &snap.things {
        let id = world.restore_thing(
            map,
            Thing {
                x: t.x,
                y: t.y,
                z: t.z,
                angle: t.angle,
                radius: t.radius,
                height: t.height,
                flags: t.flags,
                kind: t.kind,
                health: t.health,
                player: t.player,
                subsector: 0,
                sector: 0,
                snext: None,
                bnext: None,
                block_cell: None,
            },
        );
        if let Some(slot) = t.player {
            players[slot].thing = Some(id);
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::angle::Angle;
    use crate::core::fixed::from_int;
    use crate::level::records::MTF_EASY;
    use crate::level::sample::{sample_level, SAMPLE_MAP};

    fn loaded() -> (LevelMap, World) {
        let (store, textures) = sample_level();
        let mut map = LevelMap::load(&store, &textures, SAMPLE_MAP).unwrap();
        let mut world = World::new();
        world.spawn_map_things(&mut map, MTF_EASY, false, false);
        (map, world)
    }

    #[test]
    fn test_version_check() {
        let (map, world) = loaded();
        let options = GameOptions::default();
        let mut bytes = save(&options, &map, &world, "slot 1").unwrap();
        assert_eq!(bytes[0], SAVE_VERSION);

        bytes[0] = SAVE_VERSION + 1;
        assert!(matches!(
            load(&bytes),
            Err(SaveError::VersionMismatch { .. })
        ));
        assert!(matches!(
            load(&[]),
            Err(SaveError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_roundtrip_restores_mutable_state() {
        let (mut map, mut world) = loaded();
        let mut options = GameOptions::default();

        // Mutate the things a simulation would: a moved floor, a switched
        // texture, a moved thing, some generator draws.
        map.sectors[0].floor_height = from_int(24);
        map.sides[1].mid_texture = 0;
        map.lines[2].special = 42;
        options.rng.next_byte();
        options.rng.next_byte();
        let id = world.things().next().unwrap().0;
        world.move_thing(&mut map, id, from_int(100), from_int(100));
        world.level_time = 321;

        let bytes = save(&options, &map, &world, "mid-level").unwrap();
        let decoded = load(&bytes).unwrap();
        assert_eq!(decoded.description, "mid-level");
        assert_eq!(decoded.options.rng.index(), 2);

        // Apply onto a fresh load of the same level.
        let (mut map2, mut world2) = loaded();
        let mut players: [Player; MAX_PLAYERS] = Default::default();
        apply(&decoded.world_state, &mut map2, &mut world2, &mut players).unwrap();

        assert_eq!(map2.sectors[0].floor_height, from_int(24));
        assert_eq!(map2.sides[1].mid_texture, 0);
        assert_eq!(map2.lines[2].special, 42);
        assert_eq!(world2.level_time, 321);
        let (rid, restored) = world2.things().next().unwrap();
        assert_eq!(restored.x, from_int(100));
        // Spatial links were rebuilt, not copied.
        assert_eq!(
            world2.thing(rid).block_cell,
            map2.blockmap.cell_of(from_int(100), from_int(100))
        );
    }

    #[test]
    fn test_player_rebinding() {
        let (mut map, mut world) = loaded();
        let options = GameOptions::default();
        let start = world.player_starts[0].unwrap();
        let body = world.spawn_player(&mut map, 0, &start);
        let _ = body;

        let bytes = save(&options, &map, &world, "").unwrap();
        let decoded = load(&bytes).unwrap();

        let (mut map2, mut world2) = loaded();
        let mut players: [Player; MAX_PLAYERS] = Default::default();
        apply(&decoded.world_state, &mut map2, &mut world2, &mut players).unwrap();
        let id = players[0].thing.expect("player rebound");
        assert_eq!(world2.thing(id).player, Some(0));
        assert_eq!(world2.thing(id).angle, Angle::ZERO);
    }

    #[test]
    fn test_geometry_mismatch_rejected() {
        let (map, world) = loaded();
        let options = GameOptions::default();
        let bytes = save(&options, &map, &world, "").unwrap();
        let decoded = load(&bytes).unwrap();

        // A snapshot from some other map (different arena sizes) is
        // rejected whole; nothing is half-applied.
        let (mut map2, mut world2) = loaded();
        map2.sectors.push(map2.sectors[0].clone());
        let mut players: [Player; MAX_PLAYERS] = Default::default();
        assert!(matches!(
            apply(&decoded.world_state, &mut map2, &mut world2, &mut players),
            Err(SaveError::GeometryMismatch { what: "sectors", .. })
        ));
    }
}
