//! Hit records exchanged between the overlap detector, the damage
//! resolver and gameplay listeners.

use glam::Vec3;
use hecs::Entity;
use serde::{Deserialize, Serialize};

use crate::enums::{DamageType, HurtboxKind};

/// Outcome of one hit. Built once by the resolver; listeners read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageInfo {
    pub source: Entity,
    pub target: Entity,
    pub hit_point: Vec3,
    pub hit_normal: Vec3,
    pub hitbox_id: String,
    pub hurtbox_kind: HurtboxKind,
    pub damage_type: DamageType,

    pub raw_damage: f32,
    pub final_damage: f32,

    pub is_critical: bool,
    pub is_backstab: bool,
    pub is_parried: bool,
    pub is_blocked: bool,
    pub caused_stagger: bool,

    pub poise_damage: f32,
    pub knockback: Vec3,
}

impl DamageInfo {
    /// Empty record for a hit between `source` and `target`.
    pub fn new(source: Entity, target: Entity) -> Self {
        Self {
            source,
            target,
            hit_point: Vec3::ZERO,
            hit_normal: Vec3::ZERO,
            hitbox_id: String::new(),
            hurtbox_kind: HurtboxKind::default(),
            damage_type: DamageType::default(),
            raw_damage: 0.0,
            final_damage: 0.0,
            is_critical: false,
            is_backstab: false,
            is_parried: false,
            is_blocked: false,
            caused_stagger: false,
            poise_damage: 0.0,
            knockback: Vec3::ZERO,
        }
    }

    /// Damage a block absorbed (0 for unblocked hits).
    pub fn blocked_damage(&self) -> f32 {
        if self.is_blocked {
            (self.raw_damage - self.final_damage).max(0.0)
        } else {
            0.0
        }
    }
}

/// A hitbox/hurtbox overlap reported by the geometry layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub attacker: Entity,
    pub target: Entity,
    pub hitbox_id: String,
    pub hit_point: Vec3,
    pub hit_normal: Vec3,
}

impl Contact {
    pub fn new(attacker: Entity, target: Entity, hitbox_id: impl Into<String>) -> Self {
        Self {
            attacker,
            target,
            hitbox_id: hitbox_id.into(),
            hit_point: Vec3::ZERO,
            hit_normal: Vec3::Y,
        }
    }

    pub fn at(mut self, hit_point: Vec3, hit_normal: Vec3) -> Self {
        self.hit_point = hit_point;
        self.hit_normal = hit_normal;
        self
    }
}
