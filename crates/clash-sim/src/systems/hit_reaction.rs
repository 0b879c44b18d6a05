//! Hit reactions: flinches picked from the size of a hit, softened by
//! super armor and rate limited by a cooldown.

use glam::Vec3;
use hecs::{Entity, World};
use tracing::debug;

use clash_core::components::HitReaction;
use clash_core::enums::HitReactionType;
use clash_core::events::CombatEvent;
use clash_core::types::DamageInfo;

use crate::event_bus::EventBus;

/// Tick reaction timers and cooldowns.
pub fn run(world: &mut World, dt: f32, events: &mut EventBus) {
    let mut ended: Vec<(Entity, HitReactionType)> = Vec::new();
    for (entity, reaction) in world.query_mut::<&mut HitReaction>() {
        if let Some(kind) = reaction.update(dt) {
            ended.push((entity, kind));
        }
    }

    ended.sort_by_key(|(entity, _)| entity.to_bits());
    for (entity, reaction) in ended {
        events.emit(CombatEvent::HitReactionEnded { entity, reaction });
    }
}

/// React to a landed hit. Returns the reaction started, or `None` when the
/// target has no reaction component, is cooling down, or armor absorbed it.
pub fn process_hit(
    world: &mut World,
    info: &DamageInfo,
    events: &mut EventBus,
) -> HitReactionType {
    let Ok(mut reaction) = world.get::<&mut HitReaction>(info.target) else {
        return HitReactionType::None;
    };
    if reaction.cooldown_remaining > 0.0 {
        return HitReactionType::None;
    }

    let damage_fraction = reaction.damage_fraction(info.final_damage);
    let kind = if info.caused_stagger {
        HitReactionType::Stagger
    } else {
        reaction.determine_type(damage_fraction)
    };
    if kind == HitReactionType::None {
        return kind;
    }

    let direction = hit_direction(info);
    reaction.start(kind, direction);
    drop(reaction);

    debug!(entity = ?info.target, ?kind, damage_fraction, "hit reaction");
    events.emit(CombatEvent::HitReactionStarted {
        entity: info.target,
        reaction: kind,
        direction,
        damage_fraction,
    });
    kind
}

/// Knockback when there is any, otherwise away from the hit surface.
fn hit_direction(info: &DamageInfo) -> Vec3 {
    let direction = if info.knockback.length() >= 0.001 {
        info.knockback
    } else {
        -info.hit_normal
    };
    if direction.length() > 0.001 {
        direction.normalize()
    } else {
        direction
    }
}

/// End the current reaction early. Returns false if there was none.
pub fn cancel_reaction(world: &mut World, entity: Entity, events: &mut EventBus) -> bool {
    let ended = match world.get::<&mut HitReaction>(entity) {
        Ok(mut reaction) if reaction.is_reacting => {
            let kind = reaction.current;
            reaction.end();
            kind
        }
        _ => return false,
    };
    events.emit(CombatEvent::HitReactionEnded {
        entity,
        reaction: ended,
    });
    true
}

/// Start `kind` regardless of cooldown, replacing any reaction in progress.
pub fn force_reaction(
    world: &mut World,
    entity: Entity,
    kind: HitReactionType,
    direction: Vec3,
    events: &mut EventBus,
) -> bool {
    if kind == HitReactionType::None {
        return cancel_reaction(world, entity, events);
    }
    let replaced = match world.get::<&mut HitReaction>(entity) {
        Ok(mut reaction) => {
            let replaced = reaction.is_reacting.then_some(reaction.current);
            reaction.end();
            reaction.cooldown_remaining = 0.0;
            reaction.start(kind, direction);
            replaced
        }
        Err(_) => return false,
    };

    if let Some(reaction) = replaced {
        events.emit(CombatEvent::HitReactionEnded { entity, reaction });
    }
    events.emit(CombatEvent::HitReactionStarted {
        entity,
        reaction: kind,
        direction,
        damage_fraction: 0.0,
    });
    true
}

pub fn is_reacting(world: &World, entity: Entity) -> bool {
    world
        .get::<&HitReaction>(entity)
        .is_ok_and(|reaction| reaction.is_reacting)
}

pub fn current_reaction(world: &World, entity: Entity) -> HitReactionType {
    world
        .get::<&HitReaction>(entity)
        .map_or(HitReactionType::None, |reaction| reaction.current)
}

pub fn reaction_progress(world: &World, entity: Entity) -> f32 {
    world
        .get::<&HitReaction>(entity)
        .map_or(0.0, |reaction| reaction.progress())
}
