//! Caller-owned cooldown timer.
//!
//! A [`Cooldown`] gates how often something may fire. It is a plain value:
//! whoever owns it advances it once per tick (see
//! [`crate::systems::cooldown::advance_cooldowns`]) with the frame's scaled
//! delta, and asks [`Cooldown::try_trigger`] before acting.
//!
//! # Lifecycle
//!
//! 1. Created ready (`remaining == 0`).
//! 2. `try_trigger` succeeds and sets `remaining = duration`.
//! 3. `advance(dt)` counts down; further triggers fail until it reaches zero.

/// Countdown that blocks re-triggering for `duration` seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cooldown {
    /// Full cooldown length in seconds.
    pub duration: f32,
    /// Seconds left before the next trigger is allowed.
    pub remaining: f32,
}

impl Cooldown {
    /// Create a ready cooldown with the given length in seconds.
    pub fn new(duration: f32) -> Self {
        Cooldown {
            duration: duration.max(0.0),
            remaining: 0.0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.remaining <= 0.0
    }

    /// Start the cooldown if it is ready. Returns whether it was started.
    pub fn try_trigger(&mut self) -> bool {
        if !self.is_ready() {
            return false;
        }
        self.remaining = self.duration;
        true
    }

    /// Count down by `dt` seconds, clamping at zero.
    pub fn advance(&mut self, dt: f32) {
        if self.remaining > 0.0 {
            self.remaining = (self.remaining - dt).max(0.0);
        }
    }

    /// Fraction of the cooldown still pending, in `[0, 1]`.
    pub fn fraction_remaining(&self) -> f32 {
        if self.duration <= 0.0 {
            0.0
        } else {
            (self.remaining / self.duration).clamp(0.0, 1.0)
        }
    }

    pub fn reset(&mut self) {
        self.remaining = 0.0;
    }
}
