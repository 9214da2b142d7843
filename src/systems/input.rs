//! Input routing system.
//!
//! [`route_input`] takes the edges collected in
//! [`FrameKeys`](crate::resources::input::FrameKeys), broadcasts each press as
//! a [`KeyPress`] event and then lets the
//! [`InputRouter`](crate::resources::bindings::InputRouter) dispatch bound
//! actions.
use bevy_ecs::prelude::*;
use log::warn;

use crate::events::gameplay::KeyPress;
use crate::resources::context::{CoreContext, InputStats};
use crate::resources::input::{FrameKeys, KeyEdge};

pub fn route_input(
    ctx: NonSend<CoreContext>,
    keys: Res<FrameKeys>,
    mut stats: ResMut<InputStats>,
) {
    if keys.edges.is_empty() {
        return;
    }
    stats.active_frames += 1;

    for edge in keys.edges.iter() {
        if let KeyEdge::Pressed(key) = *edge {
            stats.key_presses += 1;
            if let Err(e) = ctx.bus.publish(&KeyPress { key }) {
                warn!("{e}");
            }
        }
    }

    let report = ctx.input.tick(&keys.edges);
    stats.routing.absorb(report);
}
