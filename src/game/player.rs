//! Player Slots
//!
//! Exactly four player slots exist regardless of how many are active. A
//! slot's state persists across levels (inventory, score counters) and is
//! reset in two well-defined ways: `finish_level` when a level completes,
//! and `reborn` when the slot respawns after death.

use serde::{Deserialize, Serialize};

use crate::MAX_PLAYERS;

use super::ticcmd::TicCmd;

/// Starting health at spawn and after reborn.
pub const BASE_HEALTH: i32 = 100;

/// Bullets granted with the starting pistol.
pub const BASE_BULLETS: i32 = 50;

/// Life-cycle of a slot within a level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerState {
    /// Playing or camera.
    #[default]
    Live,
    /// Dead on the ground, waiting for the respawn press.
    Dead,
    /// Requested a respawn; drained at the top of the next tic.
    Reborn,
}

/// Weapons, in pickup order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Weapon {
    /// Bare fists.
    Fist = 0,
    /// The starting sidearm.
    #[default]
    Pistol = 1,
    /// Shotgun.
    Shotgun = 2,
    /// Chaingun.
    Chaingun = 3,
    /// Rocket launcher.
    Missile = 4,
    /// Plasma rifle.
    Plasma = 5,
    /// The big one.
    Bfg = 6,
    /// Chainsaw.
    Chainsaw = 7,
}

/// Number of weapon kinds.
pub const NUM_WEAPONS: usize = 8;

/// Ammunition pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Ammo {
    /// Pistol and chaingun bullets.
    Clip = 0,
    /// Shotgun shells.
    Shell = 1,
    /// Plasma cells.
    Cell = 2,
    /// Rockets.
    Missile = 3,
}

/// Number of ammunition pools.
pub const NUM_AMMO: usize = 4;

/// Default per-pool capacity, doubled by a backpack.
pub const MAX_AMMO: [i32; NUM_AMMO] = [200, 50, 300, 50];

/// Number of key cards and skulls.
pub const NUM_CARDS: usize = 6;

/// Number of timed/toggled power-ups.
pub const NUM_POWERS: usize = 6;

/// Persistent per-slot simulation state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Player {
    /// Life-cycle state within the current level.
    pub state: PlayerState,
    /// The command driving this slot this tic.
    pub cmd: TicCmd,
    /// Index of this player's thing in the world arena.
    pub thing: Option<usize>,

    /// Hit points.
    pub health: i32,
    /// Armor points.
    pub armor_points: i32,
    /// Armor class: 0 = none, 1 = green, 2 = blue.
    pub armor_type: i32,
    /// Remaining tics per power-up.
    pub powers: [i32; NUM_POWERS],
    /// Key cards and skulls held.
    pub cards: [bool; NUM_CARDS],
    /// Doubled ammo capacity.
    pub backpack: bool,

    /// Readied weapon.
    pub ready_weapon: Weapon,
    /// Weapon to switch to, if any.
    pub pending_weapon: Option<Weapon>,
    /// Weapons owned.
    pub weapon_owned: [bool; NUM_WEAPONS],
    /// Rounds per pool.
    pub ammo: [i32; NUM_AMMO],
    /// Capacity per pool.
    pub max_ammo: [i32; NUM_AMMO],

    /// Kills of each other player, indexed by slot.
    pub frags: [u32; MAX_PLAYERS],
    /// Monsters killed this level.
    pub kill_count: u32,
    /// Items picked up this level.
    pub item_count: u32,
    /// Secret sectors found this level.
    pub secret_count: u32,

    /// Screen-flash tics remaining after damage.
    pub damage_count: i32,
    /// Screen-flash tics remaining after a pickup.
    pub bonus_count: i32,
    /// Attack button was down last tic.
    pub attack_down: bool,
    /// Use button was down last tic.
    pub use_down: bool,
    /// Passed through the secret exit this episode.
    pub did_secret: bool,
}

impl Player {
    /// A fresh slot with the starting loadout.
    pub fn new() -> Self {
        let mut weapon_owned = [false; NUM_WEAPONS];
        weapon_owned[Weapon::Fist as usize] = true;
        weapon_owned[Weapon::Pistol as usize] = true;
        let mut ammo = [0; NUM_AMMO];
        ammo[Ammo::Clip as usize] = BASE_BULLETS;
        Self {
            state: PlayerState::Live,
            cmd: TicCmd::new(),
            thing: None,
            health: BASE_HEALTH,
            armor_points: 0,
            armor_type: 0,
            powers: [0; NUM_POWERS],
            cards: [false; NUM_CARDS],
            backpack: false,
            ready_weapon: Weapon::Pistol,
            pending_weapon: None,
            weapon_owned,
            ammo,
            max_ammo: MAX_AMMO,
            frags: [0; MAX_PLAYERS],
            kill_count: 0,
            item_count: 0,
            secret_count: 0,
            damage_count: 0,
            bonus_count: 0,
            attack_down: false,
            use_down: false,
            did_secret: false,
        }
    }

    /// End-of-level bookkeeping: confiscate cards and powers, clear the
    /// feedback counters. Inventory and tallies survive into the next map.
    pub fn finish_level(&mut self) {
        self.cards = [false; NUM_CARDS];
        self.powers = [0; NUM_POWERS];
        self.damage_count = 0;
        self.bonus_count = 0;
    }

    /// Reinitialize after death, keeping the identity that outlives a life:
    /// frags and the per-level tallies.
    pub fn reborn(&mut self) {
        let frags = self.frags;
        let kill_count = self.kill_count;
        let item_count = self.item_count;
        let secret_count = self.secret_count;
        let did_secret = self.did_secret;

        *self = Self::new();
        self.frags = frags;
        self.kill_count = kill_count;
        self.item_count = item_count;
        self.secret_count = secret_count;
        self.did_secret = did_secret;

        // Don't fire or use on the first tic of the new life.
        self.attack_down = true;
        self.use_down = true;
    }

    /// Per-tic housekeeping: power timers and screen-flash counters.
    pub fn run_counters(&mut self) {
        for power in self.powers.iter_mut() {
            if *power > 0 {
                *power -= 1;
            }
        }
        if self.damage_count > 0 {
            self.damage_count -= 1;
        }
        if self.bonus_count > 0 {
            self.bonus_count -= 1;
        }
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starting_loadout() {
        let player = Player::new();
        assert_eq!(player.health, BASE_HEALTH);
        assert_eq!(player.ready_weapon, Weapon::Pistol);
        assert!(player.weapon_owned[Weapon::Fist as usize]);
        assert!(player.weapon_owned[Weapon::Pistol as usize]);
        assert!(!player.weapon_owned[Weapon::Shotgun as usize]);
        assert_eq!(player.ammo[Ammo::Clip as usize], BASE_BULLETS);
        assert_eq!(player.max_ammo, MAX_AMMO);
    }

    #[test]
    fn test_finish_level_confiscates() {
        let mut player = Player::new();
        player.cards[0] = true;
        player.powers[2] = 500;
        player.damage_count = 30;
        player.ammo[Ammo::Shell as usize] = 20;
        player.kill_count = 9;

        player.finish_level();
        assert_eq!(player.cards, [false; NUM_CARDS]);
        assert_eq!(player.powers, [0; NUM_POWERS]);
        assert_eq!(player.damage_count, 0);
        // Inventory and tallies survive
        assert_eq!(player.ammo[Ammo::Shell as usize], 20);
        assert_eq!(player.kill_count, 9);
    }

    #[test]
    fn test_reborn_keeps_identity() {
        let mut player = Player::new();
        player.frags = [1, 2, 3, 4];
        player.kill_count = 7;
        player.secret_count = 2;
        player.health = 0;
        player.state = PlayerState::Reborn;
        player.ammo[Ammo::Cell as usize] = 100;

        player.reborn();
        assert_eq!(player.health, BASE_HEALTH);
        assert_eq!(player.state, PlayerState::Live);
        assert_eq!(player.frags, [1, 2, 3, 4]);
        assert_eq!(player.kill_count, 7);
        assert_eq!(player.secret_count, 2);
        // Loadout reset to start
        assert_eq!(player.ammo[Ammo::Cell as usize], 0);
        assert_eq!(player.ammo[Ammo::Clip as usize], BASE_BULLETS);
        assert!(player.attack_down);
    }

    #[test]
    fn test_run_counters() {
        let mut player = Player::new();
        player.powers[0] = 2;
        player.bonus_count = 1;
        player.run_counters();
        assert_eq!(player.powers[0], 1);
        assert_eq!(player.bonus_count, 0);
        player.run_counters();
        player.run_counters();
        assert_eq!(player.powers[0], 0);
        assert_eq!(player.bonus_count, 0);
    }
}
