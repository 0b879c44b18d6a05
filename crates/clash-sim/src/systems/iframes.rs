//! Invincibility frames: ticking, granting and querying.

use hecs::{Entity, World};
use tracing::debug;

use clash_core::components::IFrames;
use clash_core::enums::IFrameSource;
use clash_core::events::CombatEvent;

use crate::event_bus::EventBus;

/// Tick every i-frame component. Runs on unscaled time so invincibility
/// still wears off during hitstop.
pub fn run(world: &mut World, dt: f32, events: &mut EventBus) {
    let mut ended: Vec<(Entity, IFrameSource)> = Vec::new();
    for (entity, iframes) in world.query_mut::<&mut IFrames>() {
        let source = iframes.source;
        if iframes.update(dt) {
            ended.push((entity, source));
        }
    }

    ended.sort_by_key(|(entity, _)| entity.to_bits());
    for (entity, source) in ended {
        events.emit(CombatEvent::IFramesEnded { entity, source });
    }
}

/// Grant i-frames, adding the component if missing. Returns false if the
/// entity does not exist or a longer grant was already running.
pub fn grant_iframes(
    world: &mut World,
    entity: Entity,
    duration: f32,
    source: IFrameSource,
    events: &mut EventBus,
) -> bool {
    if !world.contains(entity) {
        return false;
    }
    let missing = world.get::<&IFrames>(entity).is_err();
    if missing && world.insert_one(entity, IFrames::default()).is_err() {
        return false;
    }

    let granted = match world.get::<&mut IFrames>(entity) {
        Ok(mut iframes) => {
            let before = *iframes;
            iframes.grant(duration, source);
            *iframes != before
        }
        Err(_) => false,
    };

    if granted {
        debug!(?entity, duration, ?source, "i-frames granted");
        events.emit(CombatEvent::IFramesStarted {
            entity,
            duration,
            source,
        });
    }
    granted
}

pub fn grant_default_iframes(
    world: &mut World,
    entity: Entity,
    source: IFrameSource,
    events: &mut EventBus,
) -> bool {
    grant_iframes(world, entity, IFrames::default_duration(source), source, events)
}

pub fn is_invincible(world: &World, entity: Entity) -> bool {
    world
        .get::<&IFrames>(entity)
        .is_ok_and(|iframes| iframes.is_invincible)
}
