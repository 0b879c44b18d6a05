//! Entity spawn factories for combat participants.

use glam::{Quat, Vec3};
use hecs::{Entity, World};
use serde::{Deserialize, Serialize};

use clash_core::components::*;

/// Everything needed to put a fighter in the world. Factions set here
/// override whatever the hitboxes and hurtbox carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fighter {
    pub position: Vec3,
    pub rotation: Quat,
    pub faction: String,
    pub target_factions: Vec<String>,
    pub hitboxes: Vec<Hitbox>,
    pub hurtbox: Hurtbox,
    pub receiver: DamageReceiver,
    pub hit_reaction: HitReaction,
}

impl Default for Fighter {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            faction: "player".to_string(),
            target_factions: vec!["enemy".to_string()],
            hitboxes: vec![Hitbox::new("weapon")],
            hurtbox: Hurtbox::default(),
            receiver: DamageReceiver::default(),
            hit_reaction: HitReaction::default(),
        }
    }
}

impl Fighter {
    /// A default fighter in `faction` that can hit `hostile_to`.
    pub fn new(faction: &str, hostile_to: &str) -> Self {
        Self {
            faction: faction.to_string(),
            target_factions: vec![hostile_to.to_string()],
            ..Default::default()
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Turn to face `point` in the horizontal plane. Forward is -Z.
    pub fn facing(mut self, point: Vec3) -> Self {
        let flat = Vec3::new(point.x - self.position.x, 0.0, point.z - self.position.z);
        if let Some(dir) = flat.try_normalize() {
            self.rotation = Quat::from_rotation_arc(Vec3::NEG_Z, dir);
        }
        self
    }
}

/// Spawn a fighter with transforms, hitboxes, hurtbox, receiver, an idle
/// i-frame component and hit reactions.
pub fn spawn_fighter(world: &mut World, fighter: Fighter) -> Entity {
    let Fighter {
        position,
        rotation,
        faction,
        target_factions,
        mut hitboxes,
        mut hurtbox,
        receiver,
        hit_reaction,
    } = fighter;

    for hitbox in &mut hitboxes {
        hitbox.faction = faction.clone();
        hitbox.target_factions = target_factions.clone();
        hitbox.active = false;
    }
    hurtbox.faction = faction;

    world.spawn((
        LocalTransform {
            position,
            rotation,
            scale: Vec3::ONE,
        },
        WorldTransform::from_rotation_translation(rotation, position),
        Hitboxes::new(hitboxes),
        hurtbox,
        receiver,
        IFrames::default(),
        hit_reaction,
    ))
}
