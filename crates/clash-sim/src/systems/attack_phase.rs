//! Attack phase system: advances every in-flight attack by one tick.

use hecs::{Entity, World};

use clash_core::attack::AttackPhaseState;
use clash_core::enums::AttackPhase;

use crate::attacks::AttackPhaseManager;
use crate::event_bus::EventBus;

/// Advance every entity whose phase is not `None`. `scratch` is reused
/// across ticks to avoid reallocating the entity list.
pub fn run(
    world: &mut World,
    attacks: &AttackPhaseManager,
    dt: f32,
    scratch: &mut Vec<Entity>,
    events: &mut EventBus,
) {
    scratch.clear();
    scratch.extend(
        world
            .query_mut::<&AttackPhaseState>()
            .into_iter()
            .filter(|(_, state)| state.phase != AttackPhase::None)
            .map(|(entity, _)| entity),
    );
    // hecs iteration order is archetype-dependent; sort for replayability.
    scratch.sort_by_key(|entity| entity.to_bits());

    for &entity in scratch.iter() {
        attacks.advance_phase(world, entity, dt, events);
    }
}
