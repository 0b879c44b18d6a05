//! Combat engine: the single owner of the world and every combat service.
//!
//! `CombatEngine` runs all systems in a fixed order each tick and collects
//! the events they emit. Completely headless, so a fight replays exactly
//! for the same seed, catalog and inputs.

use glam::Vec3;
use hecs::{Entity, World};

use clash_core::attack::AttackPhaseState;
use clash_core::config::CombatConfig;
use clash_core::enums::{AttackPhase, HitReactionType, IFrameSource};
use clash_core::error::{AttackError, CatalogError};
use clash_core::events::CombatEvent;
use clash_core::types::{Contact, DamageInfo};

use crate::attacks::{AttackPhaseManager, InputOutcome};
use crate::damage::DamageResolver;
use crate::event_bus::{EventBus, SubscriberId};
use crate::hitstop::HitstopController;
use crate::systems;
use crate::world_setup::{self, Fighter};

pub struct CombatEngine {
    world: World,
    attacks: AttackPhaseManager,
    resolver: DamageResolver,
    hitstop: HitstopController,
    events: EventBus,
    config: CombatConfig,
    /// Unscaled seconds since the engine was created.
    time: f64,
    tick: u64,
    entity_scratch: Vec<Entity>,
    last_hits: Vec<DamageInfo>,
}

impl Default for CombatEngine {
    fn default() -> Self {
        Self::new(CombatConfig::default())
    }
}

impl CombatEngine {
    pub fn new(config: CombatConfig) -> Self {
        Self {
            world: World::new(),
            attacks: AttackPhaseManager::with_combo_window(config.combo_window_secs),
            resolver: DamageResolver::new(config.seed),
            hitstop: HitstopController::new(config.hitstop_enabled),
            events: EventBus::new(),
            config,
            time: 0.0,
            tick: 0,
            entity_scratch: Vec::new(),
            last_hits: Vec::new(),
        }
    }

    /// Advance the fight by `dt` seconds, resolving `contacts` reported by
    /// the overlap detector for this tick. Returns every event emitted since
    /// the previous tick, including those from input calls in between.
    pub fn tick(&mut self, dt: f32, contacts: &[Contact]) -> Vec<CombatEvent> {
        // 1. Global hitstop
        self.hitstop.update(dt);
        let scaled_dt = dt * self.hitstop.time_scale();
        // 2. I-frames (real time)
        systems::iframes::run(&mut self.world, dt, &mut self.events);
        // 3. Poise recovery, parry decay
        systems::poise::run(&mut self.world, scaled_dt);
        // 4. Hit reactions
        systems::hit_reaction::run(&mut self.world, scaled_dt, &mut self.events);
        // 5. Attack phases
        systems::attack_phase::run(
            &mut self.world,
            &self.attacks,
            scaled_dt,
            &mut self.entity_scratch,
            &mut self.events,
        );
        // 6. Contacts
        self.last_hits = systems::hits::resolve_contacts(
            &mut self.world,
            contacts,
            &self.attacks,
            &mut self.resolver,
            &mut self.hitstop,
            &self.config,
            &mut self.events,
        );

        self.time += f64::from(dt);
        self.tick += 1;
        self.events.drain()
    }

    // ---- Commands ----

    pub fn spawn_fighter(&mut self, fighter: Fighter) -> Entity {
        world_setup::spawn_fighter(&mut self.world, fighter)
    }

    pub fn process_attack_input(
        &mut self,
        entity: Entity,
        attack_name: &str,
    ) -> Result<InputOutcome, AttackError> {
        self.attacks
            .process_attack_input(&mut self.world, entity, attack_name, &mut self.events)
    }

    pub fn start_attack(&mut self, entity: Entity, attack_name: &str) -> Result<(), AttackError> {
        self.attacks
            .start_attack(&mut self.world, entity, attack_name, &mut self.events)
    }

    pub fn cancel_attack(&mut self, entity: Entity) -> bool {
        self.attacks
            .cancel_attack(&mut self.world, entity, &mut self.events)
    }

    pub fn grant_iframes(&mut self, entity: Entity, duration: f32, source: IFrameSource) -> bool {
        systems::iframes::grant_iframes(&mut self.world, entity, duration, source, &mut self.events)
    }

    pub fn force_reaction(
        &mut self,
        entity: Entity,
        reaction: HitReactionType,
        direction: Vec3,
    ) -> bool {
        systems::hit_reaction::force_reaction(
            &mut self.world,
            entity,
            reaction,
            direction,
            &mut self.events,
        )
    }

    pub fn cancel_reaction(&mut self, entity: Entity) -> bool {
        systems::hit_reaction::cancel_reaction(&mut self.world, entity, &mut self.events)
    }

    pub fn load_attacks_json(&mut self, json: &str) -> Result<usize, CatalogError> {
        self.attacks.load_attacks_json(json)
    }

    pub fn subscribe<F>(&mut self, subscriber: F) -> SubscriberId
    where
        F: FnMut(&CombatEvent) + 'static,
    {
        self.events.subscribe(subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.events.unsubscribe(id)
    }

    // ---- Queries ----

    pub fn phase_of(&self, entity: Entity) -> AttackPhase {
        self.attacks.phase_of(&self.world, entity)
    }

    pub fn current_reaction(&self, entity: Entity) -> HitReactionType {
        systems::hit_reaction::current_reaction(&self.world, entity)
    }

    /// Copy of the entity's attack record, if it has ever attacked.
    pub fn attack_state(&self, entity: Entity) -> Option<AttackPhaseState> {
        self.world
            .get::<&AttackPhaseState>(entity)
            .ok()
            .map(|state| (*state).clone())
    }

    /// Hits that landed during the most recent tick.
    pub fn last_hits(&self) -> &[DamageInfo] {
        &self.last_hits
    }

    pub fn time_scale(&self) -> f32 {
        self.hitstop.time_scale()
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn attacks(&self) -> &AttackPhaseManager {
        &self.attacks
    }

    /// Catalog edits are only safe between ticks.
    pub fn attacks_mut(&mut self) -> &mut AttackPhaseManager {
        &mut self.attacks
    }

    pub fn resolver(&self) -> &DamageResolver {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut DamageResolver {
        &mut self.resolver
    }

    pub fn hitstop(&self) -> &HitstopController {
        &self.hitstop
    }

    pub fn hitstop_mut(&mut self) -> &mut HitstopController {
        &mut self.hitstop
    }
}
