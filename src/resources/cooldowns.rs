//! Registry of live cooldown timers.
//!
//! Gameplay objects own their [`Cooldown`] inside an `Rc<Cell<_>>` and
//! register it here with [`Cooldowns::track`]. The
//! [`advance_cooldowns`](crate::systems::cooldown::advance_cooldowns) system
//! then counts every tracked timer down once per frame. Timers whose owner
//! dropped them are forgotten on the next advance.
use std::cell::Cell;
use std::rc::{Rc, Weak};

use log::trace;

use crate::components::cooldown::Cooldown;

#[derive(Default)]
pub struct Cooldowns {
    timers: Vec<Weak<Cell<Cooldown>>>,
}

impl Cooldowns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, timer: &Rc<Cell<Cooldown>>) {
        self.timers.push(Rc::downgrade(timer));
    }

    /// Advance every live timer by `dt` seconds. Returns how many were
    /// advanced.
    pub fn advance(&mut self, dt: f32) -> usize {
        let before = self.timers.len();
        self.timers.retain(|weak| match weak.upgrade() {
            Some(timer) => {
                let mut cooldown = timer.get();
                cooldown.advance(dt);
                timer.set(cooldown);
                true
            }
            None => false,
        });
        if self.timers.len() != before {
            trace!("Dropped {} expired cooldown handles", before - self.timers.len());
        }
        self.timers.len()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_tracked_and_forgets_dropped() {
        let mut set = Cooldowns::new();
        let kept = Rc::new(Cell::new(Cooldown::new(1.0)));
        let dropped = Rc::new(Cell::new(Cooldown::new(1.0)));
        set.track(&kept);
        set.track(&dropped);

        let mut cd = kept.get();
        cd.try_trigger();
        kept.set(cd);
        drop(dropped);

        assert_eq!(set.advance(0.25), 1);
        assert!((kept.get().remaining - 0.75).abs() < 1e-6);
        assert_eq!(set.len(), 1);
    }
}
