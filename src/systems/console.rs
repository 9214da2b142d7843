//! Scripted console input for headless runs.
use bevy_ecs::prelude::*;

use crate::resources::console::CommandScript;
use crate::resources::context::CoreContext;
use crate::resources::worldtime::WorldTime;

/// Submit the lines the [`CommandScript`] schedules for the current frame to
/// the console. Without a script nothing happens.
pub fn feed_console_lines(
    time: Res<WorldTime>,
    script: Option<Res<CommandScript>>,
    ctx: NonSend<CoreContext>,
) {
    let Some(script) = script else {
        return;
    };
    for line in script.lines_at(time.frame_count) {
        ctx.console.submit(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submits_only_the_current_frame() {
        let mut world = World::new();
        world.insert_resource(WorldTime {
            frame_count: 2,
            ..WorldTime::default()
        });
        world.insert_resource(
            CommandScript::default()
                .line(1, "help")
                .line(2, "frobnicate")
                .line(3, "help"),
        );
        world.insert_non_send_resource(CoreContext::new());

        let mut schedule = Schedule::default();
        schedule.add_systems(feed_console_lines);
        schedule.run(&mut world);

        let ctx = world.non_send_resource::<CoreContext>();
        assert_eq!(
            ctx.console.history(),
            vec!["> frobnicate", "Error: Unknown command 'frobnicate'."]
        );
    }
}
