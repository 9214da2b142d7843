//! Scripted input source for headless runs.
use bevy_ecs::prelude::*;
use log::trace;

use crate::resources::input::{FrameKeys, KeyScript};
use crate::resources::worldtime::WorldTime;

/// Replace this frame's key edges with the ones the [`KeyScript`] schedules
/// for the current frame. Without a script the frame stays empty.
pub fn feed_scripted_keys(
    time: Res<WorldTime>,
    script: Option<Res<KeyScript>>,
    mut keys: ResMut<FrameKeys>,
) {
    keys.clear();
    let Some(script) = script else {
        return;
    };
    for edge in script.edges_at(time.frame_count) {
        trace!("frame {}: {:?}", time.frame_count, edge);
        keys.push(edge);
    }
}
