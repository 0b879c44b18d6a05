//! Combat runtime for CLASH.
//!
//! Drives attack phases, resolves hits into damage, and owns the shared
//! hitstop freeze. Headless and single-threaded: every timer advances by
//! an explicit `dt`, so identical inputs and seeds replay identically.

pub mod attacks;
pub mod damage;
pub mod engine;
pub mod event_bus;
pub mod hitstop;
pub mod systems;
pub mod world_setup;

pub use clash_core as core;
pub use engine::CombatEngine;

#[cfg(test)]
mod tests;
