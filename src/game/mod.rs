//! Tic-Driven Game State Machine
//!
//! All simulation sequencing. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `ticcmd`: per-player per-tic commands with a fixed wire layout
//! - `demo`: demo stream header, playback and recording
//! - `player`: the four fixed player slots
//! - `world`: mobile-object arena and intrusive spatial membership
//! - `game`: the top-level tic loop and pending-action queue
//! - `intermission`: end-of-level tallies and finale sequencing
//! - `saveload`: all-or-nothing state snapshots

pub mod demo;
#[allow(clippy::module_inception)]
pub mod game;
pub mod intermission;
pub mod player;
pub mod saveload;
pub mod ticcmd;
pub mod world;

// Re-export key types
pub use demo::{DemoError, DemoHeader, DemoPlayback, DemoRecorder};
pub use game::{Game, GameError, GameMode, GameOptions, GameState, PendingAction, Skill};
pub use player::{Player, PlayerState};
pub use ticcmd::TicCmd;
pub use world::{Thing, World};
