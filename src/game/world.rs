//! The Mobile-Object World
//!
//! Owns every mobile object ("thing") for one loaded level in an index
//! arena, plus the active-effect arena for sector behaviors. Things carry
//! their own intrusive `next` links for blockmap-cell and sector
//! membership; an object belongs to at most one cell list and one sector
//! list at a time, and only the position mutators here touch the links.

use tracing::debug;

use crate::core::angle::{Angle, ANG45, ANG90};
use crate::core::fixed::{fixed_mul, Fixed, FRACBITS, FRACUNIT};
use crate::core::hash::StateHasher;
use crate::level::map::{LevelMap, MAXRADIUS};
use crate::level::records::{MapThing, Sector, ML_BLOCKING, MTF_NOTSINGLE};
use crate::MAX_PLAYERS;

use super::player::{Player, PlayerState};

/// Index of a thing in the world arena.
pub type ThingId = usize;

// Thing flag bits.

/// Touching it picks it up.
pub const MF_SPECIAL: u32 = 1;
/// Blocks movement.
pub const MF_SOLID: u32 = 2;
/// Can take damage.
pub const MF_SHOOTABLE: u32 = 4;
/// Never linked into sector thing lists.
pub const MF_NOSECTOR: u32 = 8;
/// Never linked into blockmap cells.
pub const MF_NOBLOCKMAP: u32 = 16;
/// Counts toward the kill tally.
pub const MF_COUNTKILL: u32 = 32;
/// Counts toward the item tally.
pub const MF_COUNTITEM: u32 = 64;

/// Thing type number of player starts 1-4 upper bound.
const PLAYER_START_MAX: i16 = 4;
/// Thing type number of a deathmatch start.
const DEATHMATCH_START: i16 = 11;

/// Radius of a player object.
pub const PLAYER_RADIUS: Fixed = 16 * FRACUNIT;
/// Height of a player object.
pub const PLAYER_HEIGHT: Fixed = 56 * FRACUNIT;

/// Thrust per unit of command movement.
const MOVE_SCALE: Fixed = 2048;

/// A mobile object.
#[derive(Debug, Clone)]
pub struct Thing {
    /// Map X.
    pub x: Fixed,
    /// Map Y.
    pub y: Fixed,
    /// Foot height.
    pub z: Fixed,
    /// Facing.
    pub angle: Angle,
    /// Collision radius.
    pub radius: Fixed,
    /// Collision height.
    pub height: Fixed,
    /// `MF_*` bits.
    pub flags: u32,
    /// Type number from the placed-object record.
    pub kind: i16,
    /// Hit points.
    pub health: i32,
    /// Owning player slot, for player bodies.
    pub player: Option<usize>,
    /// BSP leaf containing the object.
    pub subsector: usize,
    /// Sector containing the object.
    pub sector: usize,
    /// Intrusive link: next thing in the same sector.
    pub snext: Option<ThingId>,
    /// Intrusive link: next thing in the same blockmap cell.
    pub bnext: Option<ThingId>,
    /// Cell the object is linked into, for O(1) relink decisions.
    pub block_cell: Option<usize>,
}

/// Collision footprint and tally class for a thing type.
struct ThingTemplate {
    radius: Fixed,
    height: Fixed,
    flags: u32,
}

/// Minimal type database: the handful of classes the simulation core
/// distinguishes. The full bestiary lives with the gameplay layer; anything
/// unknown spawns as inert solid scenery.
fn template(kind: i16) -> ThingTemplate {
    match kind {
        1..=4 => ThingTemplate {
            radius: PLAYER_RADIUS,
            height: PLAYER_HEIGHT,
            flags: MF_SOLID | MF_SHOOTABLE,
        },
        // Barrel.
        2035 => ThingTemplate {
            radius: 10 * FRACUNIT,
            height: 42 * FRACUNIT,
            flags: MF_SOLID | MF_SHOOTABLE,
        },
        // Former humans, imps, demons and friends.
        9 | 58 | 3001..=3006 => ThingTemplate {
            radius: if kind == 58 || kind == 3002 {
                30 * FRACUNIT
            } else {
                20 * FRACUNIT
            },
            height: 56 * FRACUNIT,
            flags: MF_SOLID | MF_SHOOTABLE | MF_COUNTKILL,
        },
        // Pickups: weapons, ammo, health, armor, keys.
        5 | 6 | 13 | 38..=40 | 2001..=2028 | 2045..=2049 | 8 | 17 => ThingTemplate {
            radius: 20 * FRACUNIT,
            height: 16 * FRACUNIT,
            flags: MF_SPECIAL | MF_COUNTITEM,
        },
        _ => ThingTemplate {
            radius: 20 * FRACUNIT,
            height: 16 * FRACUNIT,
            flags: MF_SOLID,
        },
    }
}

/// Why a sector effect keeps running or stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectStatus {
    /// Advance again next tic.
    Running,
    /// Reached its terminal condition; detach and free.
    Done,
}

/// A sector behavior advanced once per tic.
///
/// Effects are tagged variants attached to geometry by index, never
/// dispatch baked into the geometry records themselves.
#[derive(Debug, Clone)]
pub enum ActiveEffect {
    /// Moves a floor toward a target height, then stops.
    FloorMover {
        /// Sector being moved.
        sector: usize,
        /// Destination height.
        target: Fixed,
        /// Height change per tic (sign gives direction).
        speed: Fixed,
    },
    /// Oscillates a sector's light level between two bounds. Runs until
    /// detached externally.
    LightPulser {
        /// Sector being lit.
        sector: usize,
        /// Dim bound.
        low: i16,
        /// Bright bound.
        high: i16,
        /// Change per tic; flips sign at the bounds.
        step: i16,
    },
}

impl ActiveEffect {
    /// Sector this effect is bound to.
    pub fn sector(&self) -> usize {
        match self {
            ActiveEffect::FloorMover { sector, .. } => *sector,
            ActiveEffect::LightPulser { sector, .. } => *sector,
        }
    }

    /// Advance one tic.
    pub fn advance(&mut self, sectors: &mut [Sector]) -> EffectStatus {
        match self {
            ActiveEffect::FloorMover {
                sector,
                target,
                speed,
            } => {
                let floor = &mut sectors[*sector].floor_height;
                let next = floor.wrapping_add(*speed);
                let arrived = if *speed >= 0 {
                    next >= *target
                } else {
                    next <= *target
                };
                if arrived {
                    *floor = *target;
                    EffectStatus::Done
                } else {
                    *floor = next;
                    EffectStatus::Running
                }
            }
            ActiveEffect::LightPulser {
                sector,
                low,
                high,
                step,
            } => {
                let light = &mut sectors[*sector].light_level;
                *light += *step;
                if *light <= *low {
                    *light = *low;
                    *step = -*step;
                } else if *light >= *high {
                    *light = *high;
                    *step = -*step;
                }
                EffectStatus::Running
            }
        }
    }
}

/// All mobile state for one loaded level.
#[derive(Debug, Default)]
pub struct World {
    things: Vec<Option<Thing>>,
    free: Vec<ThingId>,
    effects: Vec<Option<ActiveEffect>>,
    free_effects: Vec<usize>,

    /// Player start points collected from the placed-object records.
    pub player_starts: [Option<MapThing>; MAX_PLAYERS],
    /// Deathmatch spawn pool.
    pub deathmatch_starts: Vec<MapThing>,

    /// Level maxima for the intermission tallies.
    pub total_kills: u32,
    /// Countable items placed.
    pub total_items: u32,
    /// Secret sectors placed.
    pub total_secrets: u32,
    /// Tics elapsed in this level.
    pub level_time: u32,

    valid_count: u32,
}

impl World {
    /// An empty world. Populate with [`World::spawn_map_things`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a spatial query: returns a fresh generation number for the
    /// blockmap's stamp-and-skip scheme. Sound only because the simulation
    /// is single-threaded; concurrent queries would need their own counter
    /// space.
    pub fn begin_query(&mut self) -> u32 {
        self.valid_count += 1;
        self.valid_count
    }

    /// Shared access to a thing.
    pub fn thing(&self, id: ThingId) -> &Thing {
        self.things[id].as_ref().expect("stale thing id")
    }

    /// Exclusive access to a thing.
    pub fn thing_mut(&mut self, id: ThingId) -> &mut Thing {
        self.things[id].as_mut().expect("stale thing id")
    }

    /// Iterate live things in arena order.
    pub fn things(&self) -> impl Iterator<Item = (ThingId, &Thing)> {
        self.things
            .iter()
            .enumerate()
            .filter_map(|(id, t)| t.as_ref().map(|t| (id, t)))
    }

    /// Number of live things.
    pub fn thing_count(&self) -> usize {
        self.things.iter().filter(|t| t.is_some()).count()
    }

    /// Spawn a thing of `kind` at a map position. Fixed-point coordinates;
    /// `z` snaps to the sector floor.
    pub fn spawn_thing(
        &mut self,
        map: &mut LevelMap,
        x: Fixed,
        y: Fixed,
        angle: Angle,
        kind: i16,
    ) -> ThingId {
        let tmpl = template(kind);
        let thing = Thing {
            x,
            y,
            z: 0,
            angle,
            radius: tmpl.radius,
            height: tmpl.height,
            flags: tmpl.flags,
            kind,
            health: 100,
            player: None,
            subsector: 0,
            sector: 0,
            snext: None,
            bnext: None,
            block_cell: None,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.things[id] = Some(thing);
                id
            }
            None => {
                self.things.push(Some(thing));
                self.things.len() - 1
            }
        };
        self.set_thing_position(map, id);
        let floor = map.sectors[self.thing(id).sector].floor_height;
        self.thing_mut(id).z = floor;
        id
    }

    /// Remove a thing and recycle its slot.
    pub fn remove_thing(&mut self, map: &mut LevelMap, id: ThingId) {
        self.unset_thing_position(map, id);
        self.things[id] = None;
        self.free.push(id);
    }

    /// Unlink and drop every thing, resetting the arena (snapshot restore).
    pub fn clear_things(&mut self, map: &mut LevelMap) {
        let ids: Vec<ThingId> = self.things().map(|(id, _)| id).collect();
        for id in ids {
            self.unset_thing_position(map, id);
        }
        self.things.clear();
        self.free.clear();
    }

    /// Recreate a thing from snapshot fields, relinking it spatially. The
    /// record's links are ignored and rebuilt; `z` is kept as given.
    pub fn restore_thing(&mut self, map: &mut LevelMap, mut thing: Thing) -> ThingId {
        thing.snext = None;
        thing.bnext = None;
        thing.block_cell = None;
        let z = thing.z;
        self.things.push(Some(thing));
        let id = self.things.len() - 1;
        self.set_thing_position(map, id);
        self.thing_mut(id).z = z;
        id
    }

    /// Link a thing into its subsector's sector list and blockmap cell
    /// from its current coordinates. The sole way links are created.
    pub fn set_thing_position(&mut self, map: &mut LevelMap, id: ThingId) {
        let (x, y, flags) = {
            let t = self.thing(id);
            (t.x, t.y, t.flags)
        };
        let subsector = map.point_in_subsector(x, y);
        let sector = map.subsectors[subsector].sector;
        {
            let t = self.thing_mut(id);
            t.subsector = subsector;
            t.sector = sector;
        }

        if flags & MF_NOSECTOR == 0 {
            let head = map.sectors[sector].thing_list;
            self.thing_mut(id).snext = head;
            map.sectors[sector].thing_list = Some(id);
        }

        if flags & MF_NOBLOCKMAP == 0 {
            let cell = map.blockmap.cell_of(x, y);
            self.thing_mut(id).block_cell = cell;
            if let Some(cell) = cell {
                let head = map.blockmap.thing_head(cell);
                self.thing_mut(id).bnext = head;
                map.blockmap.set_thing_head(cell, Some(id));
            }
        }
    }

    /// Unlink a thing from its sector list and blockmap cell. Call before
    /// moving it; the links are rebuilt by [`World::set_thing_position`].
    pub fn unset_thing_position(&mut self, map: &mut LevelMap, id: ThingId) {
        let (flags, sector, block_cell) = {
            let t = self.thing(id);
            (t.flags, t.sector, t.block_cell)
        };

        if flags & MF_NOSECTOR == 0 {
            let next = self.thing(id).snext;
            if map.sectors[sector].thing_list == Some(id) {
                map.sectors[sector].thing_list = next;
            } else {
                let mut at = map.sectors[sector].thing_list;
                while let Some(prev) = at {
                    if self.thing(prev).snext == Some(id) {
                        self.thing_mut(prev).snext = next;
                        break;
                    }
                    at = self.thing(prev).snext;
                }
            }
            self.thing_mut(id).snext = None;
        }

        if flags & MF_NOBLOCKMAP == 0 {
            if let Some(cell) = block_cell {
                let next = self.thing(id).bnext;
                if map.blockmap.thing_head(cell) == Some(id) {
                    map.blockmap.set_thing_head(cell, next);
                } else {
                    let mut at = map.blockmap.thing_head(cell);
                    while let Some(prev) = at {
                        if self.thing(prev).bnext == Some(id) {
                            self.thing_mut(prev).bnext = next;
                            break;
                        }
                        at = self.thing(prev).bnext;
                    }
                }
                self.thing_mut(id).bnext = None;
                self.thing_mut(id).block_cell = None;
            }
        }
    }

    /// Move a thing, maintaining its spatial membership.
    pub fn move_thing(&mut self, map: &mut LevelMap, id: ThingId, x: Fixed, y: Fixed) {
        self.unset_thing_position(map, id);
        {
            let t = self.thing_mut(id);
            t.x = x;
            t.y = y;
        }
        self.set_thing_position(map, id);
        let floor = map.sectors[self.thing(id).sector].floor_height;
        self.thing_mut(id).z = floor;
    }

    /// Ids of every thing linked into one blockmap cell.
    pub fn things_in_block(&self, map: &LevelMap, col: i32, row: i32) -> Vec<ThingId> {
        let mut out = Vec::new();
        if let Some(cell) = map.blockmap.cell_at(col, row) {
            let mut at = map.blockmap.thing_head(cell);
            while let Some(id) = at {
                out.push(id);
                at = self.thing(id).bnext;
            }
        }
        out
    }

    /// Consume the placed-object records: collect player and deathmatch
    /// starts, apply the skill/multiplayer filters, and spawn the rest.
    ///
    /// `skill_bits` is the `MTF_*` mask of the chosen skill.
    pub fn spawn_map_things(
        &mut self,
        map: &mut LevelMap,
        skill_bits: i16,
        multiplayer: bool,
        no_monsters: bool,
    ) {
        let placed = map.things.clone();
        for mt in placed {
            if (1..=PLAYER_START_MAX).contains(&mt.kind) {
                self.player_starts[(mt.kind - 1) as usize] = Some(mt);
                continue;
            }
            if mt.kind == DEATHMATCH_START {
                self.deathmatch_starts.push(mt);
                continue;
            }
            if !multiplayer && mt.options & MTF_NOTSINGLE != 0 {
                continue;
            }
            if mt.options & skill_bits == 0 {
                continue;
            }
            let tmpl = template(mt.kind);
            if no_monsters && tmpl.flags & MF_COUNTKILL != 0 {
                continue;
            }

            let id = self.spawn_thing(
                map,
                (mt.x as i32) << FRACBITS,
                (mt.y as i32) << FRACBITS,
                start_angle(mt.angle),
                mt.kind,
            );
            let flags = self.thing(id).flags;
            if flags & MF_COUNTKILL != 0 {
                self.total_kills += 1;
            }
            if flags & MF_COUNTITEM != 0 {
                self.total_items += 1;
            }
        }
        debug!(
            things = self.thing_count(),
            kills = self.total_kills,
            items = self.total_items,
            "map things spawned"
        );
    }

    /// True when a player-sized object can spawn at a start point without
    /// overlapping any solid thing or crossing a blocking line.
    pub fn check_spot(&mut self, map: &mut LevelMap, start: &MapThing) -> bool {
        let x = (start.x as i32) << FRACBITS;
        let y = (start.y as i32) << FRACBITS;
        let reach = PLAYER_RADIUS.wrapping_add(MAXRADIUS);
        let (xl, yl) = map.blockmap.block_coords(x.wrapping_sub(reach), y.wrapping_sub(reach));
        let (xh, yh) = map.blockmap.block_coords(x.wrapping_add(reach), y.wrapping_add(reach));

        for row in yl..=yh {
            for col in xl..=xh {
                for id in self.things_in_block(map, col, row) {
                    let t = self.thing(id);
                    if t.flags & MF_SOLID == 0 {
                        continue;
                    }
                    let gap = t.radius.wrapping_add(PLAYER_RADIUS);
                    if (t.x.wrapping_sub(x)).abs() < gap && (t.y.wrapping_sub(y)).abs() < gap {
                        return false;
                    }
                }
            }
        }

        // The spawn box must not cross a one-sided or blocking line. One
        // windowed query; the generation stamp keeps multi-cell lines from
        // being tested twice.
        let left = x.wrapping_sub(PLAYER_RADIUS);
        let right = x.wrapping_add(PLAYER_RADIUS);
        let bottom = y.wrapping_sub(PLAYER_RADIUS);
        let top = y.wrapping_add(PLAYER_RADIUS);
        let valid = self.begin_query();
        let blockmap = &map.blockmap;
        blockmap.for_each_line_in_box(
            left,
            bottom,
            right,
            top,
            &mut map.lines,
            valid,
            &mut |_, line| {
                let overlaps = line.bbox.left < right
                    && line.bbox.right > left
                    && line.bbox.bottom < top
                    && line.bbox.top > bottom;
                let solid = line.back_side.is_none() || line.flags & ML_BLOCKING != 0;
                !(overlaps && solid)
            },
        )
    }

    /// Spawn a player body at a start point and bind it to a slot.
    pub fn spawn_player(
        &mut self,
        map: &mut LevelMap,
        slot: usize,
        start: &MapThing,
    ) -> ThingId {
        let id = self.spawn_thing(
            map,
            (start.x as i32) << FRACBITS,
            (start.y as i32) << FRACBITS,
            start_angle(start.angle),
            1 + slot as i16,
        );
        self.thing_mut(id).player = Some(slot);
        id
    }

    /// Attach a sector effect; returns its handle.
    pub fn attach_effect(&mut self, map: &mut LevelMap, effect: ActiveEffect) -> usize {
        let sector = effect.sector();
        let slot = match self.free_effects.pop() {
            Some(slot) => {
                self.effects[slot] = Some(effect);
                slot
            }
            None => {
                self.effects.push(Some(effect));
                self.effects.len() - 1
            }
        };
        map.sectors[sector].effect = Some(slot);
        slot
    }

    /// Advance every active effect, detaching the finished ones.
    fn run_effects(&mut self, map: &mut LevelMap) {
        for slot in 0..self.effects.len() {
            let Some(effect) = self.effects[slot].as_mut() else {
                continue;
            };
            if effect.advance(&mut map.sectors) == EffectStatus::Done {
                let sector = effect.sector();
                map.sectors[sector].effect = None;
                self.effects[slot] = None;
                self.free_effects.push(slot);
            }
        }
    }

    /// Advance the world one tic: player movement from the commands in
    /// their slots, then active effects, then the level clock.
    pub fn advance(
        &mut self,
        map: &mut LevelMap,
        players: &mut [Player; MAX_PLAYERS],
        in_game: &[bool; MAX_PLAYERS],
    ) {
        for slot in 0..MAX_PLAYERS {
            if !in_game[slot] {
                continue;
            }
            players[slot].run_counters();
            if players[slot].state != PlayerState::Live {
                continue;
            }
            let Some(id) = players[slot].thing else {
                continue;
            };
            let cmd = players[slot].cmd;

            let angle = {
                let t = self.thing_mut(id);
                t.angle += Angle(((cmd.turn as i32) << 16) as u32);
                t.angle
            };

            if cmd.forward != 0 || cmd.side != 0 {
                let forward = (cmd.forward as i32) * MOVE_SCALE;
                let side = (cmd.side as i32) * MOVE_SCALE;
                let strafe = angle - ANG90;
                let dx = fixed_mul(forward, angle.cosine())
                    .wrapping_add(fixed_mul(side, strafe.cosine()));
                let dy = fixed_mul(forward, angle.sine())
                    .wrapping_add(fixed_mul(side, strafe.sine()));
                let (x, y) = {
                    let t = self.thing(id);
                    (t.x.wrapping_add(dx), t.y.wrapping_add(dy))
                };
                self.move_thing(map, id, x, y);
            }
        }

        self.run_effects(map);
        self.level_time += 1;
    }

    /// Feed the world's deterministic state into a hasher, arena order.
    pub fn hash_state(&self, hasher: &mut StateHasher) {
        hasher.update_u32(self.level_time);
        for (id, thing) in self.things() {
            hasher.update_u32(id as u32);
            hasher.update_fixed(thing.x);
            hasher.update_fixed(thing.y);
            hasher.update_fixed(thing.z);
            hasher.update_angle(thing.angle);
            hasher.update_u32(thing.flags);
            hasher.update_i32(thing.health);
            hasher.update_u16(thing.kind as u16);
        }
    }
}

/// Facing of a start point: degrees snapped to 45-degree steps, exactly
/// representable in binary angle.
fn start_angle(degrees: i16) -> Angle {
    Angle(ANG45.raw().wrapping_mul((degrees as u32) / 45))
}

// =============================================================================
// TESTS
// =============================================================================
