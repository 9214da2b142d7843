//! Plain value types owned by gameplay objects.
//!
//! Submodules overview:
//! - [`cooldown`] – countdown that limits how often something may fire
//! - [`placement`] – position and orientation handed to pooled instances
//! - [`ttl`] – lifetime countdown for short-lived effects

pub mod cooldown;
pub mod placement;
pub mod ttl;
