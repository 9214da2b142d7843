//! Gameplay payloads published on the [`EventBus`](crate::events::bus::EventBus).
//!
//! Producers and consumers only share these types; neither knows about the
//! other.

use serde::Serialize;

use crate::components::placement::Position;
use crate::events::bus::Event;
use crate::resources::input::Key;

/// A player entity finished setting up and can be targeted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRegistered {
    pub name: String,
}
impl Event for PlayerRegistered {
    fn event_name() -> &'static str {
        "PlayerRegistered"
    }
}

/// Request to bring `count` enemies of `kind` into the arena.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpawnEnemy {
    pub kind: String,
    pub count: u32,
}
impl Event for SpawnEnemy {
    fn event_name() -> &'static str {
        "SpawnEnemy"
    }
}

/// An enemy was taken from its pool and placed in the arena.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnemySpawned {
    pub serial: u32,
    pub kind: String,
}
impl Event for EnemySpawned {
    fn event_name() -> &'static str {
        "EnemySpawned"
    }
}

/// An enemy's health reached zero and it went back to its pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnemyDeath {
    pub serial: u32,
    pub kind: String,
    /// Where it died.
    pub position: Position,
}
impl Event for EnemyDeath {
    fn event_name() -> &'static str {
        "EnemyDeath"
    }
}

/// A skill was requested by name. Skills ignore names other than their own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillActivated {
    pub skill: String,
    /// Where the caster stood.
    pub origin: Position,
}
impl Event for SkillActivated {
    fn event_name() -> &'static str {
        "SkillActivated"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DebugMessage {
    pub message: String,
}
impl Event for DebugMessage {
    fn event_name() -> &'static str {
        "DebugMessage"
    }
}

/// Raw key press, broadcast before bindings are routed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KeyPress {
    pub key: Key,
}
impl Event for KeyPress {
    fn event_name() -> &'static str {
        "KeyPress"
    }
}
