//! Skirmish headless arena runner.
//!
//! Drives the core services (pool registry, event bus, input router) with
//! scripted key presses inside a **bevy_ecs** world and prints a summary of
//! what happened.
//!
//! # Main Loop
//!
//! 1. Load `skirmish.ini` (defaults if missing) and apply CLI overrides
//! 2. Build the world: core context, cooldown registry, arena, key script and
//!    optional console command script
//! 3. Each frame: advance time, feed scripted keys, advance cooldowns, route
//!    input, submit console lines, expire explosions
//! 4. Stop on the `quit` action or after `max_frames`, then tear the arena
//!    down: listeners, bindings, console commands and pools
//!
//! # Running
//!
//! ```sh
//! cargo run --release -- --frames 120 --stats-json
//! ```

mod components;
mod events;
mod game;
mod resources;
mod systems;

use std::path::PathBuf;

use clap::Parser;
use log::{info, warn};

use crate::game::Arena;
use crate::resources::console::CommandScript;
use crate::resources::context::CoreContext;
use crate::resources::gameconfig::CoreConfig;
use crate::resources::input::KeyScript;

/// Skirmish arena core demo
#[derive(Parser)]
#[command(version, about = "Headless arena driving the pool, event bus and input router.")]
struct Cli {
    /// INI configuration file.
    #[arg(long, value_name = "PATH", default_value = "./skirmish.ini")]
    config: PathBuf,

    /// Override `[loop] max_frames`.
    #[arg(long, value_name = "N")]
    frames: Option<u64>,

    /// JSON key script replacing the built-in one.
    #[arg(long, value_name = "PATH")]
    script: Option<PathBuf>,

    /// JSON console script: `[{"frame": 2, "line": "spawn grunt 3"}]`.
    #[arg(long, value_name = "PATH")]
    commands: Option<PathBuf>,

    /// Seed for enemy placement.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Print the run summary as JSON instead of text.
    #[arg(long)]
    stats_json: bool,

    /// Write the effective configuration to the config path and exit.
    #[arg(long)]
    write_config: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = CoreConfig::with_path(&cli.config);
    if let Err(e) = config.load_from_file() {
        info!("{e}; using defaults");
    }
    if let Some(frames) = cli.frames {
        config.max_frames = frames;
    }

    // Early-exit: persist the configuration and quit
    if cli.write_config {
        if let Err(e) = config.save_to_file() {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        println!("Config written to {}", config.config_path.display());
        return;
    }

    let script = match &cli.script {
        Some(path) => {
            let loaded = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))
                .and_then(|json| KeyScript::from_json(&json));
            match loaded {
                Ok(script) => script,
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => game::default_script(),
    };
    let commands = match &cli.commands {
        Some(path) => {
            let loaded = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read {}: {}", path.display(), e))
                .and_then(|json| CommandScript::from_json(&json));
            match loaded {
                Ok(commands) => Some(commands),
                Err(e) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
            }
        }
        None => None,
    };
    if script.last_frame().is_some_and(|last| last > config.max_frames) {
        warn!(
            "Key script runs to frame {:?} but max_frames is {}",
            script.last_frame(),
            config.max_frames
        );
    }

    let mut world = game::build_world(config, script, cli.seed);
    if let Some(commands) = commands {
        info!("Console script with {} lines", commands.len());
        world.insert_resource(commands);
    }
    let mut update = game::build_schedule();

    let frames = game::run(&mut world, &mut update);
    info!("Stopped after {frames} frames");

    let summary = game::summary(&world);
    let destroyed = world
        .non_send_resource::<Arena>()
        .shutdown(world.non_send_resource::<CoreContext>());
    info!("Shutdown destroyed {destroyed} pooled instances");

    if cli.stats_json {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing summary: {e}");
                std::process::exit(1);
            }
        }
    } else {
        println!(
            "{} frames ({:.2}s), quit: {}, spawns: {}, kills: {}, key presses: {}, debug messages: {}, console lines: {}",
            summary.frames,
            summary.elapsed,
            summary.quit_requested,
            summary.spawns,
            summary.kills,
            summary.key_presses,
            summary.debug_messages,
            summary.console_lines
        );
        for pool in &summary.pools {
            println!(
                "  pool {:<6} available {:>2}  checked out {:>2}  created {:>2}",
                pool.kind, pool.available, pool.checked_out, pool.created
            );
        }
    }
}
