//! ECS systems run by the combat engine each tick.
//!
//! Systems are free functions over `&mut World`. State lives in components
//! and in the services passed in; systems own nothing.

pub mod attack_phase;
pub mod hit_reaction;
pub mod hits;
pub mod iframes;
pub mod poise;
