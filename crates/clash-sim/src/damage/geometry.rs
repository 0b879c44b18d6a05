//! Transform lookups for backstab and knockback math.
//!
//! World transforms win over local ones. Entities with neither sit at the
//! origin facing -Z with no rotation.

use glam::Vec3;
use hecs::{Entity, World};

use clash_core::components::{LocalTransform, WorldTransform};

pub fn entity_position(world: &World, entity: Entity) -> Vec3 {
    if let Ok(transform) = world.get::<&WorldTransform>(entity) {
        return transform.position();
    }
    if let Ok(transform) = world.get::<&LocalTransform>(entity) {
        return transform.position;
    }
    Vec3::ZERO
}

pub fn entity_forward(world: &World, entity: Entity) -> Vec3 {
    if let Ok(transform) = world.get::<&WorldTransform>(entity) {
        return transform.forward();
    }
    if let Ok(transform) = world.get::<&LocalTransform>(entity) {
        return transform.forward();
    }
    Vec3::NEG_Z
}

/// Rotate a local-space direction by the entity's orientation.
pub fn to_world_direction(world: &World, entity: Entity, local: Vec3) -> Vec3 {
    if let Ok(transform) = world.get::<&WorldTransform>(entity) {
        return transform.matrix.transform_vector3(local);
    }
    if let Ok(transform) = world.get::<&LocalTransform>(entity) {
        return transform.rotation * local;
    }
    local
}

/// `dot(target_forward, dir(target -> attacker)) > cos(180° - threshold)`.
///
/// The comparison is kept exactly as tuned: it is true across the whole
/// frontal half-space plus a wide band beside the target, and false only
/// in a narrow cone directly behind it. Coincident positions never count.
pub fn check_backstab(world: &World, attacker: Entity, target: Entity, threshold_deg: f32) -> bool {
    let forward = entity_forward(world, target);
    let offset = entity_position(world, attacker) - entity_position(world, target);
    let Some(to_attacker) = offset.try_normalize() else {
        return false;
    };
    let threshold = (180.0 - threshold_deg).to_radians().cos();
    forward.dot(to_attacker) > threshold
}
