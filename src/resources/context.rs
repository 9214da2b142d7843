//! Shared handles to the core services.
//!
//! [`CoreContext`] is built once by the run loop and stored in the world as a
//! non-send resource. Systems borrow it with `NonSend<CoreContext>`; gameplay
//! objects keep `Weak` clones of the handles they need.
use std::rc::Rc;

use bevy_ecs::prelude::*;
use serde::Serialize;

use crate::events::bus::EventBus;
use crate::resources::bindings::{InputRouter, TickReport};
use crate::resources::console::Console;
use crate::resources::gameconfig::CoreConfig;

pub struct CoreContext {
    pub bus: Rc<EventBus>,
    pub input: Rc<InputRouter>,
    pub console: Rc<Console>,
}

impl CoreContext {
    pub fn new() -> Self {
        let input = Rc::new(InputRouter::new());
        CoreContext {
            bus: Rc::new(EventBus::new()),
            console: Rc::new(Console::new(&input)),
            input,
        }
    }

    /// Fresh services with the input gate set from `config`.
    pub fn from_config(config: &CoreConfig) -> Self {
        let ctx = Self::new();
        ctx.input.toggle_listening(config.listening);
        ctx
    }
}

impl Default for CoreContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Running totals of input routing, updated by
/// [`route_input`](crate::systems::input::route_input).
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InputStats {
    /// Frames that had at least one key edge.
    pub active_frames: u64,
    /// `KeyPress` events published.
    pub key_presses: u64,
    pub routing: TickReport,
}
