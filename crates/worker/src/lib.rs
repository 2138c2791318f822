//! Shared task spawning for herald.
//!
//! Every task spawned through this crate carries a [`TaskClass`] so traces can
//! tell message handling apart from deferred post-execution callbacks.

mod class;
mod spawn;

pub use class::TaskClass;
pub use spawn::{spawn, spawn_after};
