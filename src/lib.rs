//! # Phobos Simulation Core
//!
//! Deterministic simulation core for a first-person action game: fixed-point
//! numerics, a binary map model with spatial indices, and a tic-driven game
//! state machine with demo recording and playback.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      PHOBOS SIM CORE                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── fixed.rs    - 16.16 fixed-point arithmetic              │
//! │  ├── angle.rs    - 32-bit binary angles                      │
//! │  ├── rng.rs      - Table-driven deterministic PRNG           │
//! │  └── hash.rs     - State hashing for replay verification     │
//! │                                                              │
//! │  level/          - Binary map model (load-time)              │
//! │  ├── lump.rs     - Named-lump store + texture lookup seams   │
//! │  ├── records.rs  - Fixed-stride binary record parsers        │
//! │  ├── map.rs      - Cross-linked level arena, BSP queries     │
//! │  ├── blockmap.rs - Uniform spatial grid                      │
//! │  ├── reject.rs   - Sector visibility bitmap                  │
//! │  └── preload.rs  - Parallel resource table construction      │
//! │                                                              │
//! │  game/           - Tic-driven state machine                  │
//! │  ├── ticcmd.rs   - Per-player per-tic commands               │
//! │  ├── demo.rs     - Demo streams (record + playback)          │
//! │  ├── player.rs   - Fixed player slots                        │
//! │  ├── world.rs    - Mobile objects, intrusive spatial lists   │
//! │  ├── game.rs     - Top-level tic loop and pending actions    │
//! │  └── saveload.rs - All-or-nothing state snapshots            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! The `core/` and `game/` modules are **100% deterministic**:
//! - No floating-point arithmetic in the tic loop
//! - All geometry owned by index arenas with fixed iteration order
//! - No system time dependencies
//! - All randomness from one explicitly threaded table generator
//!
//! Given identical inputs and generator state, the simulation produces
//! identical results on any platform, which is what makes demo playback
//! and save/restore bit-exact.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod level;

// Re-export commonly used types
pub use crate::core::angle::Angle;
pub use crate::core::fixed::{Fixed, FRACBITS, FRACUNIT};
pub use crate::core::rng::GameRng;
pub use game::demo::{DemoHeader, DemoPlayback, DemoRecorder};
pub use game::game::{Game, GameOptions, GameState, PendingAction};
pub use game::ticcmd::TicCmd;
pub use level::map::LevelMap;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tic rate (Hz)
pub const TICRATE: u32 = 35;

/// Number of player slots. Always allocated, regardless of how many are active.
pub const MAX_PLAYERS: usize = 4;
