//! Per-frame systems.
//!
//! Submodules overview
//! - [`console`] – submit scripted command lines to the console
//! - [`cooldown`] – count cooldown timers down by the frame delta
//! - [`input`] – broadcast key presses and route bound actions
//! - [`script`] – feed scripted key edges into the frame
//! - [`time`] – update simulation time and frame count

pub mod console;
pub mod cooldown;
pub mod input;
pub mod script;
pub mod time;
