//! Event bus and the event types exchanged over it.
//!
//! Events provide a decoupled way for gameplay objects to communicate without
//! holding references to each other.
//!
//! Submodules:
//! - [`bus`] – type-indexed synchronous publish/subscribe registry
//! - [`gameplay`] – payloads of the demo arena (spawns, deaths, skills, keys)
pub mod bus;
pub mod gameplay;
