//! Enumeration types used throughout the combat runtime.

use serde::{Deserialize, Serialize};

/// Phase of an attack in flight.
///
/// Transitions only along `None -> Startup -> Active -> Recovery -> None`,
/// with `Canceled` as a one-tick marker that always falls back to `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AttackPhase {
    /// Not attacking.
    #[default]
    None,
    /// Wind-up. Often cancelable.
    Startup,
    /// Hitboxes live.
    Active,
    /// Cool-down, usually vulnerable.
    Recovery,
    /// Interrupted this tick.
    Canceled,
}

/// Damage type for resistances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageType {
    #[default]
    Physical,
    Fire,
    Ice,
    Lightning,
}

/// Region a hurtbox represents. Content tunes its multipliers per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HurtboxKind {
    Head,
    #[default]
    Body,
    Limb,
    Armor,
    WeakPoint,
}

/// Why an entity is currently invincible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum IFrameSource {
    #[default]
    Dodge,
    Hit,
    Attack,
    Skill,
    Spawn,
    Custom,
}

/// Flinch played by a fighter that was hit, lightest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HitReactionType {
    #[default]
    None,
    Light,
    Medium,
    Heavy,
    Stagger,
}

impl HitReactionType {
    /// One level lighter. `Light` steps down to `None`.
    pub fn step_down(self) -> Self {
        match self {
            HitReactionType::Stagger => HitReactionType::Heavy,
            HitReactionType::Heavy => HitReactionType::Medium,
            HitReactionType::Medium => HitReactionType::Light,
            HitReactionType::Light | HitReactionType::None => HitReactionType::None,
        }
    }
}
