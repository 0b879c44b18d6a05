//! Hit to damage pipeline.

use glam::Vec3;
use hecs::{Entity, World};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use clash_core::components::{DamageReceiver, Hitbox, Hurtbox};
use clash_core::constants::{
    BACKSTAB_ANGLE_THRESHOLD_DEG, BLOCK_KNOCKBACK_FACTOR, BLOCK_POISE_FACTOR,
};
use clash_core::types::DamageInfo;

use super::geometry;
use super::modifiers::DamageModifierChain;

/// Resolves contacts into `DamageInfo` records. Owns the modifier chain and
/// the seeded RNG used for critical rolls.
#[derive(Debug)]
pub struct DamageResolver {
    modifiers: DamageModifierChain,
    rng: ChaCha8Rng,
}

impl DamageResolver {
    pub fn new(seed: u64) -> Self {
        Self {
            modifiers: DamageModifierChain::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Compute a hit without touching the receiver. The only state consumed
    /// is one RNG draw when the hitbox can crit.
    ///
    /// Steps run in a fixed order: base and hurtbox multiplier, resistance,
    /// crit, backstab, parry or block, poise, knockback, modifiers, clamp.
    #[allow(clippy::too_many_arguments)]
    pub fn calculate_damage(
        &mut self,
        world: &World,
        source: Entity,
        target: Entity,
        hitbox: &Hitbox,
        hurtbox: &Hurtbox,
        hit_point: Vec3,
        hit_normal: Vec3,
    ) -> DamageInfo {
        let mut info = DamageInfo::new(source, target);
        info.hit_point = hit_point;
        info.hit_normal = hit_normal;
        info.hitbox_id = hitbox.id.clone();
        info.hurtbox_kind = hurtbox.kind;
        info.damage_type = hitbox.damage_type;

        info.raw_damage = hitbox.base_damage;
        info.final_damage = info.raw_damage * hurtbox.damage_multiplier;
        info.final_damage *= 1.0 - hurtbox.resistance(hitbox.damage_type);

        if hitbox.critical_chance > 0.0 && self.rng.gen::<f32>() < hitbox.critical_chance {
            info.is_critical = true;
            info.final_damage *= hitbox.critical_multiplier;
        }

        let receiver = world
            .get::<&DamageReceiver>(target)
            .ok()
            .map(|r| (*r).clone());

        info.is_backstab =
            geometry::check_backstab(world, source, target, BACKSTAB_ANGLE_THRESHOLD_DEG);

        if let Some(receiver) = &receiver {
            if info.is_backstab && receiver.backstab_vulnerable {
                info.final_damage *= receiver.backstab_multiplier;
            }

            if receiver.is_parrying && receiver.parry_window > 0.0 {
                info.is_parried = true;
                info.final_damage = 0.0;
            } else if receiver.is_blocking {
                info.is_blocked = true;
                info.final_damage *= 1.0 - receiver.block_damage_reduction;
            }
        }

        info.poise_damage = hitbox.poise_damage * hurtbox.poise_multiplier;
        if info.is_blocked {
            info.poise_damage *= BLOCK_POISE_FACTOR;
        }

        let direction = geometry::to_world_direction(world, source, hitbox.knockback_direction);
        info.knockback = direction.normalize_or_zero() * hitbox.knockback_force;
        if info.is_blocked {
            info.knockback *= BLOCK_KNOCKBACK_FACTOR;
        }

        self.modifiers.apply(&mut info);

        info.final_damage = info.final_damage.max(0.0);

        trace!(
            attacker = ?source,
            defender = ?target,
            hitbox = %info.hitbox_id,
            raw = info.raw_damage,
            final_damage = info.final_damage,
            critical = info.is_critical,
            backstab = info.is_backstab,
            parried = info.is_parried,
            blocked = info.is_blocked,
            "damage calculated"
        );
        info
    }

    /// Apply poise damage to the target's receiver. Sets `caused_stagger`.
    /// Targets without a receiver are left alone.
    pub fn apply_damage(&self, world: &World, mut info: DamageInfo) -> DamageInfo {
        if let Ok(mut receiver) = world.get::<&mut DamageReceiver>(info.target) {
            if receiver.can_receive_damage && !info.is_parried && info.poise_damage > 0.0 {
                info.caused_stagger = receiver.apply_poise_damage(info.poise_damage);
            }
        }
        info
    }

    /// `calculate_damage` followed by `apply_damage`.
    #[allow(clippy::too_many_arguments)]
    pub fn deal_damage(
        &mut self,
        world: &World,
        source: Entity,
        target: Entity,
        hitbox: &Hitbox,
        hurtbox: &Hurtbox,
        hit_point: Vec3,
        hit_normal: Vec3,
    ) -> DamageInfo {
        let info =
            self.calculate_damage(world, source, target, hitbox, hurtbox, hit_point, hit_normal);
        self.apply_damage(world, info)
    }

    pub fn add_modifier<F>(&mut self, name: impl Into<String>, modifier: F, priority: i32)
    where
        F: Fn(&mut DamageInfo) + Send + Sync + 'static,
    {
        self.modifiers.add(name, modifier, priority);
    }

    pub fn remove_modifier(&mut self, name: &str) -> bool {
        self.modifiers.remove(name)
    }

    pub fn clear_modifiers(&mut self) {
        self.modifiers.clear();
    }

    pub fn modifiers(&self) -> &DamageModifierChain {
        &self.modifiers
    }
}
