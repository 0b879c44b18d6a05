//! Damage resolution: turns a hitbox/hurtbox contact into a `DamageInfo`
//! and applies its side effects to the receiver.

pub mod geometry;
pub mod modifiers;
pub mod resolver;

pub use modifiers::DamageModifierChain;
pub use resolver::DamageResolver;
