//! Demo Streams
//!
//! A demo is a flat byte stream: a one-byte version tag, a fixed-layout
//! header describing the initial game configuration, then four bytes per
//! in-game player per tic in slot order. A record byte equal to
//! [`DEMO_END`], or simply running out of bytes, ends playback cleanly -
//! that is the normal termination signal, not an error. A version mismatch
//! is a hard failure.
//!
//! No compression, no checksums.

use thiserror::Error;
use tracing::{debug, info};

use crate::MAX_PLAYERS;

use super::game::Skill;
use super::ticcmd::TicCmd;

/// Demo format version this build records and accepts.
pub const DEMO_VERSION: u8 = 109;

/// End-of-stream sentinel byte.
pub const DEMO_END: u8 = 0x80;

/// Errors raised while parsing a demo stream.
#[derive(Debug, Clone, Error)]
pub enum DemoError {
    /// The stream was recorded by an incompatible version.
    #[error("demo version {found} does not match supported version {expected}")]
    VersionMismatch {
        /// Version byte found in the stream.
        found: u8,
        /// Version this build supports.
        expected: u8,
    },

    /// The stream ended inside the header.
    #[error("demo header truncated ({len} of {expected} bytes)")]
    TruncatedHeader {
        /// Bytes available.
        len: usize,
        /// Bytes required.
        expected: usize,
    },

    /// The header names an undefined skill level.
    #[error("demo header has invalid skill {0}")]
    BadSkill(u8),

    /// The header names a console player outside the slot range.
    #[error("demo header has invalid console player {0}")]
    BadConsolePlayer(u8),
}

/// The fixed-layout configuration header at the front of every demo.
///
/// Together with the generator's cleared state this is everything needed
/// to reproduce the recorded game exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoHeader {
    /// Skill the game was played at.
    pub skill: Skill,
    /// Episode number (one-based).
    pub episode: u8,
    /// Map number (one-based).
    pub map: u8,
    /// Deathmatch mode: 0 = cooperative, 1 = deathmatch, 2 = altdeath.
    pub deathmatch: u8,
    /// Monsters respawn.
    pub respawn: bool,
    /// Monsters move at nightmare speed.
    pub fast: bool,
    /// Monsters are not spawned at all.
    pub no_monsters: bool,
    /// Slot of the recording player.
    pub console_player: u8,
    /// Which slots are occupied.
    pub in_game: [bool; MAX_PLAYERS],
}

impl DemoHeader {
    /// Header length on the wire, version byte included.
    pub const SIZE: usize = 13;

    /// Number of occupied slots; each tic record carries this many commands.
    pub fn player_count(&self) -> usize {
        self.in_game.iter().filter(|&&p| p).count()
    }

    /// Net-game mode is inferred, never stored: two or more players.
    pub fn netgame(&self) -> bool {
        self.player_count() >= 2
    }

    /// Append the header to a stream.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.push(DEMO_VERSION);
        out.push(self.skill as u8);
        out.push(self.episode);
        out.push(self.map);
        out.push(self.deathmatch);
        out.push(self.respawn as u8);
        out.push(self.fast as u8);
        out.push(self.no_monsters as u8);
        out.push(self.console_player);
        for &in_game in &self.in_game {
            out.push(in_game as u8);
        }
    }

    /// Parse a header from the front of a stream.
    pub fn parse(bytes: &[u8]) -> Result<Self, DemoError> {
        if bytes.len() < Self::SIZE {
            return Err(DemoError::TruncatedHeader {
                len: bytes.len(),
                expected: Self::SIZE,
            });
        }
        if bytes[0] != DEMO_VERSION {
            return Err(DemoError::VersionMismatch {
                found: bytes[0],
                expected: DEMO_VERSION,
            });
        }
        let skill = Skill::from_u8(bytes[1]).ok_or(DemoError::BadSkill(bytes[1]))?;
        if bytes[8] as usize >= MAX_PLAYERS {
            return Err(DemoError::BadConsolePlayer(bytes[8]));
        }
        let mut in_game = [false; MAX_PLAYERS];
        for (slot, flag) in in_game.iter_mut().enumerate() {
            *flag = bytes[9 + slot] != 0;
        }
        Ok(Self {
            skill,
            episode: bytes[2],
            map: bytes[3],
            deathmatch: bytes[4],
            respawn: bytes[5] != 0,
            fast: bytes[6] != 0,
            no_monsters: bytes[7] != 0,
            console_player: bytes[8],
            in_game,
        })
    }
}

/// Replays a demo stream one tic at a time.
#[derive(Debug, Clone)]
pub struct DemoPlayback {
    header: DemoHeader,
    bytes: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl DemoPlayback {
    /// Parse the header and position the cursor on the first tic record.
    pub fn new(bytes: Vec<u8>) -> Result<Self, DemoError> {
        let header = DemoHeader::parse(&bytes)?;
        info!(
            players = header.player_count(),
            netgame = header.netgame(),
            episode = header.episode,
            map = header.map,
            "demo playback started"
        );
        Ok(Self {
            header,
            bytes,
            pos: DemoHeader::SIZE,
            finished: false,
        })
    }

    /// The configuration header.
    pub fn header(&self) -> &DemoHeader {
        &self.header
    }

    /// True once playback has ended.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Read one tic record into the per-slot commands. Unoccupied slots are
    /// reset to idle. Returns `false` when playback has ended cleanly - on
    /// the end sentinel or on stream exhaustion.
    pub fn next_tic(&mut self, cmds: &mut [TicCmd; MAX_PLAYERS]) -> bool {
        if self.finished {
            return false;
        }
        let record_len = self.header.player_count() * TicCmd::SIZE;
        if self.pos >= self.bytes.len()
            || self.bytes[self.pos] == DEMO_END
            || self.pos + record_len > self.bytes.len()
        {
            debug!(at = self.pos, "demo playback ended");
            self.finished = true;
            return false;
        }

        for (slot, cmd) in cmds.iter_mut().enumerate() {
            if self.header.in_game[slot] {
                let at = self.pos;
                *cmd = TicCmd::decode([
                    self.bytes[at],
                    self.bytes[at + 1],
                    self.bytes[at + 2],
                    self.bytes[at + 3],
                ]);
                self.pos += TicCmd::SIZE;
            } else {
                *cmd = TicCmd::new();
            }
        }
        true
    }
}

/// Records a demo stream, the mirror image of [`DemoPlayback`].
#[derive(Debug, Clone)]
pub struct DemoRecorder {
    in_game: [bool; MAX_PLAYERS],
    bytes: Vec<u8>,
}

impl DemoRecorder {
    /// Start a stream with the given configuration header.
    pub fn new(header: &DemoHeader) -> Self {
        let mut bytes = Vec::new();
        header.write(&mut bytes);
        Self {
            in_game: header.in_game,
            bytes,
        }
    }

    /// Append one tic record: the occupied slots' commands in slot order.
    pub fn record_tic(&mut self, cmds: &[TicCmd; MAX_PLAYERS]) {
        for (slot, cmd) in cmds.iter().enumerate() {
            if self.in_game[slot] {
                self.bytes.extend(cmd.encode());
            }
        }
    }

    /// Terminate the stream with the end sentinel and return it.
    pub fn finish(mut self) -> Vec<u8> {
        self.bytes.push(DEMO_END);
        self.bytes
    }
}

// =============================================================================
// TESTS
// =============================================================================
