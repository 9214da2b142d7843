//! Long-lived data injected into the ECS world.
//!
//! Overview
//! - `bindings` – key-to-action router with the listening gate
//! - `console` – text command registry, history and scripted command lines
//! - `context` – shared handles to the event bus, input router and console
//! - `cooldowns` – registry of cooldown timers advanced each frame
//! - `gameconfig` – INI-backed configuration
//! - `input` – keys, per-frame key edges and scripted input
//! - `pool` – per-kind pools of reusable instances
//! - `worldtime` – simulation time, delta and frame count
pub mod bindings;
pub mod console;
pub mod context;
pub mod cooldowns;
pub mod gameconfig;
pub mod input;
pub mod pool;
pub mod worldtime;
