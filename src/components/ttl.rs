//! Time-to-live countdown for short-lived pooled effects.
//!
//! An instance carrying a [`Ttl`] is handed back to its pool once the
//! remaining time reaches zero. The countdown uses the scaled frame delta from
//! [`WorldTime`](crate::resources::worldtime::WorldTime), so slow motion
//! stretches it.
//!
//! # Related
//!
//! - [`crate::game::Explosions::advance`] – counts down and recycles expired
//!   explosions
//! - [`crate::game::expire_explosions`] – system driving it each frame

/// Remaining lifetime in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ttl {
    /// Remaining time in seconds before the owner expires.
    pub remaining: f32,
}

impl Ttl {
    /// Create a new Ttl with the given duration in seconds.
    ///
    /// # Arguments
    ///
    /// * `seconds` - Time in seconds before the owner expires
    pub fn new(seconds: f32) -> Self {
        Ttl { remaining: seconds }
    }

    /// Count down by `dt` seconds. Returns `true` once expired.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.remaining -= dt;
        self.is_expired()
    }

    pub fn is_expired(&self) -> bool {
        self.remaining <= 0.0
    }
}
