//! End-of-Level Tallies and the Finale
//!
//! When a level completes, the state machine builds an
//! [`IntermissionInfo`] from the players' per-level counters and the
//! world's maxima, then runs the [`Intermission`] until a player
//! accelerates past it. Episode ends run a [`Finale`] instead - a timed
//! text screen with the same exit path.
//!
//! The `next` field is ZERO-based while every map-select field elsewhere
//! is one-based; the boundary that consumes it must add one.

use serde::{Deserialize, Serialize};

use crate::{MAX_PLAYERS, TICRATE};

use super::game::GameMode;
use super::player::Player;

/// Minimum tics the tally screen stays up before a press can skip it.
const MIN_DISPLAY_TICS: u32 = TICRATE;

/// Tics per character of finale text, plus the trailing hold.
const TEXT_SPEED: u32 = 3;
const TEXT_WAIT: u32 = 250;

/// Per-player tallies carried into the intermission.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct IntermissionPlayer {
    /// Slot was occupied when the level ended.
    pub in_game: bool,
    /// Monsters killed.
    pub kills: u32,
    /// Items collected.
    pub items: u32,
    /// Secrets found.
    pub secret: u32,
    /// Frags against the other slots, summed.
    pub frags: u32,
    /// Level time in tics.
    pub time: u32,
}

/// Everything the intermission needs, fixed at level completion.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IntermissionInfo {
    /// Episode (one-based).
    pub episode: u8,
    /// The player came through the secret exit.
    pub did_secret: bool,
    /// Map that just ended (one-based).
    pub last: u8,
    /// Map to load next (ZERO-based).
    pub next: u8,
    /// Kill denominator, floored at 1.
    pub max_kills: u32,
    /// Item denominator, floored at 1.
    pub max_items: u32,
    /// Secret denominator, floored at 1.
    pub max_secret: u32,
    /// Par time in tics.
    pub par_time: u32,
    /// Slot of the console player.
    pub console_player: usize,
    /// Per-slot tallies.
    pub players: [IntermissionPlayer; MAX_PLAYERS],
}

impl IntermissionInfo {
    /// Kill ratio of a slot, in percent.
    pub fn kill_percent(&self, slot: usize) -> u32 {
        self.players[slot].kills * 100 / self.max_kills
    }

    /// Item ratio of a slot, in percent.
    pub fn item_percent(&self, slot: usize) -> u32 {
        self.players[slot].items * 100 / self.max_items
    }

    /// Secret ratio of a slot, in percent.
    pub fn secret_percent(&self, slot: usize) -> u32 {
        self.players[slot].secret * 100 / self.max_secret
    }
}

/// Par times for the episodic maps, in seconds: `[episode-1][map-1]`.
/// Episode 4 shipped without pars; it reads zero.
const PAR_TIMES: [[u32; 9]; 3] = [
    [30, 75, 120, 90, 165, 180, 180, 30, 165],
    [90, 90, 90, 120, 90, 360, 240, 30, 170],
    [90, 45, 90, 150, 90, 90, 165, 30, 135],
];

/// Par times for the commercial maps, in seconds: `[map-1]`.
const COMMERCIAL_PAR_TIMES: [u32; 32] = [
    30, 90, 120, 120, 90, 150, 120, 120, 270, 90, 210, 150, 150, 150, 210, 150, 420, 150, 210,
    150, 240, 150, 180, 150, 150, 300, 330, 420, 300, 180, 120, 30,
];

/// Par time for a map, in tics. Maps without a table entry read zero.
pub fn par_time(mode: GameMode, episode: u8, map: u8) -> u32 {
    let seconds = if mode == GameMode::Commercial {
        COMMERCIAL_PAR_TIMES
            .get(map.wrapping_sub(1) as usize)
            .copied()
            .unwrap_or(0)
    } else {
        PAR_TIMES
            .get(episode.wrapping_sub(1) as usize)
            .and_then(|ep| ep.get(map.wrapping_sub(1) as usize))
            .copied()
            .unwrap_or(0)
    };
    seconds * TICRATE
}

/// The tally screen between levels.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Intermission {
    /// The tallies being shown.
    pub info: IntermissionInfo,
    count: u32,
}

impl Intermission {
    /// Start showing the tallies.
    pub fn start(info: IntermissionInfo) -> Self {
        Self { info, count: 0 }
    }

    /// Advance one tic. Returns `true` when an in-game player accelerates
    /// past the screen (after the minimum display time).
    pub fn tic(&mut self, players: &[Player; MAX_PLAYERS]) -> bool {
        self.count += 1;
        if self.count < MIN_DISPLAY_TICS {
            return false;
        }
        self.info
            .players
            .iter()
            .zip(players)
            .any(|(tally, player)| {
                tally.in_game && (player.cmd.attack_down() || player.cmd.use_down())
            })
    }
}

/// Flavor text shown at each episode end.
fn episode_text(episode: u8) -> &'static str {
    match episode {
        1 => {
            "The garrison is silent. Whatever came through the gate came \
             through here first, and the way it left is still open. You step \
             into the dark after it."
        }
        2 => {
            "The second moon is yours, but the signal that lured you out \
             here is still broadcasting from the surface below."
        }
        3 => {
            "The machine at the heart of it all collapses into itself. In \
             the quiet that follows, you finally hear wind."
        }
        _ => {
            "Against everything, you are still standing. The long way home \
             starts here."
        }
    }
}

/// Flavor text shown at the commercial story breaks.
fn commercial_text(map: u8) -> &'static str {
    match map {
        6 => {
            "The starport falls quiet behind you. The tunnels ahead run \
             deeper than any survey ever recorded."
        }
        11 => {
            "You seal the waste gates. Somewhere below, something very \
             large begins to move."
        }
        15 | 31 => "A hidden door swings wide. This place is not on any map.",
        20 => {
            "Half the city is ash, but the spire at its center still \
             stands. That is where you are going."
        }
        _ => "It is over. The counters read zero, and nothing answers.",
    }
}

/// The end-of-episode text screen.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Finale {
    count: u32,
    duration: u32,
}

impl Finale {
    /// Start a finale for the current mode and position.
    pub fn start(mode: GameMode, episode: u8, map: u8) -> Self {
        let text = if mode == GameMode::Commercial {
            commercial_text(map)
        } else {
            episode_text(episode)
        };
        Self {
            count: 0,
            duration: text.len() as u32 * TEXT_SPEED + TEXT_WAIT,
        }
    }

    /// Advance one tic. Returns `true` when the text has run its course.
    pub fn tic(&mut self) -> bool {
        self.count += 1;
        self.count > self.duration
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::ticcmd::{TicCmd, BT_USE};

    #[test]
    fn test_percentages_floor_denominators() {
        let mut info = IntermissionInfo {
            max_kills: 1,
            max_items: 1,
            max_secret: 1,
            ..IntermissionInfo::default()
        };
        info.players[0].kills = 0;
        // An empty level (0 maxima floored to 1) must not divide by zero.
        assert_eq!(info.kill_percent(0), 0);
        info.players[0].kills = 1;
        assert_eq!(info.kill_percent(0), 100);
    }

    #[test]
    fn test_par_time_lookup() {
        assert_eq!(par_time(GameMode::Retail, 1, 1), 30 * TICRATE);
        assert_eq!(par_time(GameMode::Retail, 3, 9), 135 * TICRATE);
        assert_eq!(par_time(GameMode::Commercial, 0, 17), 420 * TICRATE);
        // No par for episode 4 or out-of-table maps
        assert_eq!(par_time(GameMode::Retail, 4, 2), 0);
        assert_eq!(par_time(GameMode::Commercial, 0, 33), 0);
    }

    #[test]
    fn test_intermission_waits_for_press() {
        let mut info = IntermissionInfo::default();
        info.players[0].in_game = true;
        let mut inter = Intermission::start(info);

        let mut players: [Player; MAX_PLAYERS] = Default::default();
        players[0].cmd = TicCmd {
            buttons: BT_USE,
            ..TicCmd::new()
        };

        // Held button does nothing during the minimum display time.
        for _ in 0..MIN_DISPLAY_TICS - 1 {
            assert!(!inter.tic(&players));
        }
        assert!(inter.tic(&players));
    }

    #[test]
    fn test_intermission_ignores_absent_slots() {
        let info = IntermissionInfo::default(); // nobody in_game
        let mut inter = Intermission::start(info);
        let mut players: [Player; MAX_PLAYERS] = Default::default();
        players[2].cmd = TicCmd {
            buttons: BT_USE,
            ..TicCmd::new()
        };
        for _ in 0..MIN_DISPLAY_TICS * 2 {
            assert!(!inter.tic(&players));
        }
    }

    #[test]
    fn test_finale_runs_to_completion() {
        let mut finale = Finale::start(GameMode::Retail, 1, 8);
        let mut tics = 0;
        while !finale.tic() {
            tics += 1;
            assert!(tics < 10_000, "finale never ends");
        }
        assert!(tics > TEXT_WAIT);
    }
}
