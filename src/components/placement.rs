//! Spatial placement values handed to pooled instances on activation.
//!
//! The pool does not interpret these; it only forwards them to
//! [`Activatable::activate`](crate::resources::pool::Activatable::activate).
//! The embedding renderer/physics layer maps them onto its own transform types.

use serde::{Deserialize, Serialize};

/// World-space position in engine units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub const ORIGIN: Position = Position {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Position { x, y, z }
    }

    /// Position on the ground plane (`y = 0`).
    pub fn on_ground(x: f32, z: f32) -> Self {
        Position { x, y: 0.0, z }
    }

    /// Straight-line distance to `other`.
    pub fn distance(&self, other: &Position) -> f32 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Same position, `height` units higher.
    pub fn raised(self, height: f32) -> Self {
        Position {
            y: self.y + height,
            ..self
        }
    }
}

/// Orientation as a unit quaternion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Orientation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Orientation {
    pub const IDENTITY: Orientation = Orientation {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Rotation around the vertical axis.
    ///
    /// # Arguments
    ///
    /// * `degrees` - Yaw angle in degrees, counter-clockwise seen from above
    pub fn from_yaw_degrees(degrees: f32) -> Self {
        let half = degrees.to_radians() * 0.5;
        Orientation {
            x: 0.0,
            y: half.sin(),
            z: 0.0,
            w: half.cos(),
        }
    }

    /// Yaw angle in degrees recovered from the quaternion.
    pub fn yaw_degrees(&self) -> f32 {
        (2.0 * self.y.atan2(self.w)).to_degrees()
    }
}
