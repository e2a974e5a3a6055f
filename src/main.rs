//! Headless Simulation Runner
//!
//! Drives the deterministic core without any presentation layer: loads the
//! built-in sample level, records a scripted session, replays it in an
//! independent game, and verifies the two runs land on identical state
//! hashes. Exits non-zero on divergence, which makes it usable as a
//! cross-platform determinism check in CI.

use anyhow::{bail, Result};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use phobos::game::game::{Game, GameOptions, Skill};
use phobos::game::ticcmd::TicCmd;
use phobos::level::preload::preload_tables;
use phobos::level::sample::sample_level;
use phobos::{MAX_PLAYERS, TICRATE, VERSION};

/// Tics the scripted session runs for.
const RUN_TICS: u32 = 35 * 30;

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Phobos Sim v{}", VERSION);
    info!("Tic Rate: {} Hz", TICRATE);

    let (store, textures) = sample_level();

    // Resource tables build concurrently, then the simulation starts.
    let tables = preload_tables(&store, &textures);
    info!(
        sprites = tables.sprite_names.len(),
        animations = tables.animations.len(),
        "resource tables ready"
    );

    // Record a scripted session.
    let mut game = Game::new(&store, &textures, GameOptions::default());
    game.defer_new_game(Skill::Medium, 1, 1);
    game.start_recording();

    info!("Running {} tics ({}s of game time)...", RUN_TICS, RUN_TICS / TICRATE);
    let mut cmds = [TicCmd::new(); MAX_PLAYERS];
    for tic in 0..RUN_TICS {
        cmds[0] = scripted_cmd(tic);
        game.run_tic(&cmds)?;
    }
    let recorded_hash = game.state_hash();
    let demo = game.stop_recording().expect("recorder active");
    info!(
        bytes = demo.len(),
        hash = %hex::encode(&recorded_hash[..8]),
        "session recorded"
    );

    // Replay it in an independent game and compare hashes.
    let mut replay = Game::new(&store, &textures, GameOptions::default());
    replay.play_demo(demo)?;
    let idle = [TicCmd::new(); MAX_PLAYERS];
    for _ in 0..RUN_TICS {
        replay.run_tic(&idle)?;
    }
    let replayed_hash = replay.state_hash();
    info!(hash = %hex::encode(&replayed_hash[..8]), "playback finished");

    if replayed_hash != recorded_hash {
        bail!(
            "determinism failure: recorded {} != replayed {}",
            hex::encode(recorded_hash),
            hex::encode(replayed_hash)
        );
    }
    info!("record/playback hashes match");
    Ok(())
}

/// A deterministic input script: wander the room in slow arcs.
fn scripted_cmd(tic: u32) -> TicCmd {
    let phase = tic % 140;
    TicCmd {
        forward: if phase < 100 { 20 } else { 0 },
        side: if phase >= 120 { 15 } else { 0 },
        turn: if phase % 2 == 0 { 0x200 } else { -0x100 },
        buttons: 0,
    }
}
