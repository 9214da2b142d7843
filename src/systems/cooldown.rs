//! Cooldown countdown system.
use bevy_ecs::prelude::*;

use crate::resources::cooldowns::Cooldowns;
use crate::resources::worldtime::WorldTime;

/// Count every tracked cooldown down by the frame's scaled delta.
pub fn advance_cooldowns(time: Res<WorldTime>, mut cooldowns: NonSendMut<Cooldowns>) {
    cooldowns.advance(time.delta);
}
