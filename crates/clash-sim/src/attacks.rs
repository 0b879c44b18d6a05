//! Attack phase manager: the attack catalog plus the per-entity phase
//! machine (startup, active, recovery, cancel, combo buffering).
//!
//! The catalog is only written through explicit registration calls. Do not
//! register or unregister attacks while a tick is in progress.

use std::collections::HashMap;

use hecs::{Entity, World};
use tracing::{debug, warn};

use clash_core::attack::{AttackDefinition, AttackPhaseState};
use clash_core::components::Hitboxes;
use clash_core::constants::DEFAULT_COMBO_WINDOW_SECS;
use clash_core::enums::AttackPhase;
use clash_core::error::{AttackError, CatalogError};
use clash_core::events::CombatEvent;

use crate::event_bus::EventBus;

/// What `process_attack_input` did with the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// Entity was idle; a fresh attack started.
    Started,
    /// Entity was inside a combo window; the next attack started.
    Chained,
    /// Held in the single-slot buffer until chaining is possible or the
    /// combo window expires.
    Buffered,
}

#[derive(Debug, Clone)]
pub struct AttackPhaseManager {
    attacks: HashMap<String, AttackDefinition>,
    /// Combo window given to attack states created by this manager.
    combo_window_secs: f32,
}

impl Default for AttackPhaseManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AttackPhaseManager {
    pub fn new() -> Self {
        Self::with_combo_window(DEFAULT_COMBO_WINDOW_SECS)
    }

    pub fn with_combo_window(combo_window_secs: f32) -> Self {
        Self {
            attacks: HashMap::new(),
            combo_window_secs,
        }
    }

    // ---- Catalog ----

    /// Register or overwrite a definition. Attacks already in flight keep
    /// the snapshot they started with.
    pub fn register_attack(&mut self, attack: AttackDefinition) {
        debug!(attack = %attack.name, "registered attack");
        self.attacks.insert(attack.name.clone(), attack);
    }

    pub fn register_attacks(&mut self, attacks: impl IntoIterator<Item = AttackDefinition>) {
        for attack in attacks {
            self.register_attack(attack);
        }
    }

    /// Load a JSON array of definitions. All entries are validated first;
    /// nothing is registered unless every entry is valid.
    pub fn load_attacks_json(&mut self, json: &str) -> Result<usize, CatalogError> {
        let attacks: Vec<AttackDefinition> = serde_json::from_str(json)?;
        for attack in &attacks {
            if let Err(source) = attack.validate() {
                warn!(attack = %attack.name, error = %source, "rejected attack catalog");
                return Err(CatalogError::Invalid {
                    name: attack.name.clone(),
                    source,
                });
            }
        }
        let count = attacks.len();
        self.register_attacks(attacks);
        Ok(count)
    }

    pub fn get_attack(&self, name: &str) -> Option<&AttackDefinition> {
        self.attacks.get(name)
    }

    /// Registered names, sorted.
    pub fn get_registered_attacks(&self) -> Vec<String> {
        let mut names: Vec<String> = self.attacks.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn unregister_attack(&mut self, name: &str) -> bool {
        self.attacks.remove(name).is_some()
    }

    pub fn clear_attacks(&mut self) {
        self.attacks.clear();
    }

    pub fn combo_window_secs(&self) -> f32 {
        self.combo_window_secs
    }

    // ---- Queries ----

    pub fn phase_of(&self, world: &World, entity: Entity) -> AttackPhase {
        world
            .get::<&AttackPhaseState>(entity)
            .map(|state| state.phase)
            .unwrap_or_default()
    }

    pub fn is_attacking(&self, world: &World, entity: Entity) -> bool {
        world
            .get::<&AttackPhaseState>(entity)
            .is_ok_and(|state| state.is_attacking())
    }

    // ---- Commands ----

    /// Start a registered attack by name.
    pub fn start_attack(
        &self,
        world: &mut World,
        entity: Entity,
        attack_name: &str,
        events: &mut EventBus,
    ) -> Result<(), AttackError> {
        let Some(attack) = self.attacks.get(attack_name) else {
            warn!(?entity, attack = attack_name, "attack not found");
            return Err(AttackError::UnknownAttack(attack_name.to_string()));
        };
        self.begin(world, entity, attack, false, events)
    }

    /// Start an attack from an inline definition that need not be registered.
    pub fn start_attack_with(
        &self,
        world: &mut World,
        entity: Entity,
        attack: &AttackDefinition,
        events: &mut EventBus,
    ) -> Result<(), AttackError> {
        self.begin(world, entity, attack, false, events)
    }

    /// Interrupt the running attack. Returns false if the entity was not
    /// attacking. The `Canceled` marker resolves to `None` on the next
    /// `advance_phase`.
    pub fn cancel_attack(&self, world: &mut World, entity: Entity, events: &mut EventBus) -> bool {
        let (old_phase, attack) = {
            let Ok(mut state) = world.get::<&mut AttackPhaseState>(entity) else {
                return false;
            };
            if !state.is_attacking() {
                return false;
            }
            let old_phase = state.phase;
            state.phase = AttackPhase::Canceled;
            state.phase_time = 0.0;
            state.phase_duration = 0.0;
            state.queued_attack = None;
            (old_phase, state.current_attack.clone().unwrap_or_default())
        };

        self.deactivate_hitboxes(world, entity, events);

        debug!(?entity, %attack, from = ?old_phase, "attack canceled");
        events.emit(CombatEvent::PhaseChanged {
            entity,
            old: old_phase,
            new: AttackPhase::Canceled,
            attack: Some(attack.clone()),
        });
        events.emit(CombatEvent::AttackEnded {
            entity,
            attack,
            was_canceled: true,
        });
        true
    }

    /// The "attack pressed" entry point: start, chain, or buffer.
    pub fn process_attack_input(
        &self,
        world: &mut World,
        entity: Entity,
        attack_name: &str,
        events: &mut EventBus,
    ) -> Result<InputOutcome, AttackError> {
        let status = world
            .get::<&AttackPhaseState>(entity)
            .ok()
            .map(|state| (state.is_attacking(), state.can_combo()));

        match status {
            None | Some((false, _)) => {
                self.start_attack(world, entity, attack_name, events)?;
                Ok(InputOutcome::Started)
            }
            Some((true, true)) => {
                self.chain(world, entity, attack_name, events)?;
                Ok(InputOutcome::Chained)
            }
            Some((true, false)) => {
                if let Ok(mut state) = world.get::<&mut AttackPhaseState>(entity) {
                    state.queue_attack(attack_name);
                    state.combo_window_timer = state.combo_window_duration;
                }
                debug!(?entity, attack = attack_name, "attack input buffered");
                events.emit(CombatEvent::InputBuffered {
                    entity,
                    attack: attack_name.to_string(),
                });
                Ok(InputOutcome::Buffered)
            }
        }
    }

    /// Freeze this entity's phase timers for `duration` seconds. Saturating:
    /// never shortens a longer freeze already in progress.
    pub fn apply_hitstop(&self, world: &mut World, entity: Entity, duration: f32) {
        if let Ok(mut state) = world.get::<&mut AttackPhaseState>(entity) {
            state.hitstop_remaining = state.hitstop_remaining.max(duration);
        }
    }

    // ---- Tick ----

    /// Advance one entity's attack by `dt`. At most one phase transition
    /// happens per call; time past the end of a phase is not carried over.
    pub fn advance_phase(&self, world: &mut World, entity: Entity, dt: f32, events: &mut EventBus) {
        let (phase, done, expired) = {
            let Ok(mut state) = world.get::<&mut AttackPhaseState>(entity) else {
                return;
            };

            if state.phase == AttackPhase::Canceled {
                state.clear();
                drop(state);
                events.emit(CombatEvent::PhaseChanged {
                    entity,
                    old: AttackPhase::Canceled,
                    new: AttackPhase::None,
                    attack: None,
                });
                return;
            }
            if !state.is_attacking() {
                return;
            }
            if state.hitstop_remaining > 0.0 {
                state.hitstop_remaining = (state.hitstop_remaining - dt).max(0.0);
                return;
            }

            state.phase_time += dt;

            let mut expired = None;
            if state.combo_window_timer > 0.0 {
                state.combo_window_timer = (state.combo_window_timer - dt).max(0.0);
            }
            // A closed window drops the buffer, including a zero-length one.
            if state.queued_attack.is_some() && state.combo_window_timer <= 0.0 {
                expired = state.queued_attack.take();
            }
            (state.phase, state.phase_time >= state.phase_duration, expired)
        };

        if let Some(attack) = expired {
            debug!(?entity, %attack, "buffered input expired");
            events.emit(CombatEvent::InputExpired { entity, attack });
        }

        match phase {
            AttackPhase::Startup if done => self.enter_active(world, entity, events),
            AttackPhase::Active if done => self.enter_recovery(world, entity, events),
            AttackPhase::Recovery => {
                let (queued, can_combo) = match world.get::<&AttackPhaseState>(entity) {
                    Ok(state) => (state.queued_attack.clone(), state.can_combo()),
                    Err(_) => return,
                };
                if let (Some(queued), true) = (&queued, can_combo) {
                    if self.chain(world, entity, queued, events).is_ok() {
                        return;
                    }
                }
                if done {
                    self.finish(world, entity, events);
                    // Input that could not chain still starts the next
                    // attack once this one is over.
                    if let Some(queued) = queued {
                        if let Err(error) = self.start_attack(world, entity, &queued, events) {
                            debug!(
                                ?entity,
                                attack = %queued,
                                %error,
                                "buffered attack not started"
                            );
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Enable the attack's hitboxes on `entity`.
    pub fn activate_hitboxes(
        &self,
        world: &mut World,
        entity: Entity,
        attack: &AttackDefinition,
        events: &mut EventBus,
    ) {
        let activated = match world.get::<&mut Hitboxes>(entity) {
            Ok(mut hitboxes) => hitboxes.activate_matching(&attack.hitbox_ids),
            Err(_) => return,
        };
        if !activated.is_empty() {
            events.emit(CombatEvent::HitboxesActivated {
                entity,
                hitbox_ids: activated,
            });
        }
    }

    /// Disable every hitbox on `entity`. Idempotent.
    pub fn deactivate_hitboxes(&self, world: &mut World, entity: Entity, events: &mut EventBus) {
        let deactivated = match world.get::<&mut Hitboxes>(entity) {
            Ok(mut hitboxes) => hitboxes.deactivate_all(),
            Err(_) => return,
        };
        if !deactivated.is_empty() {
            events.emit(CombatEvent::HitboxesDeactivated {
                entity,
                hitbox_ids: deactivated,
            });
        }
    }

    // ---- Internals ----

    /// Chain into the current attack's follow-up (or `pressed` if none is
    /// authored), carrying the combo count forward.
    fn chain(
        &self,
        world: &mut World,
        entity: Entity,
        pressed: &str,
        events: &mut EventBus,
    ) -> Result<(), AttackError> {
        let (from, next) = match world.get::<&AttackPhaseState>(entity) {
            Ok(state) => (
                state.current_attack.clone().unwrap_or_default(),
                state.attack_def.next_combo().unwrap_or(pressed).to_string(),
            ),
            Err(_) => return Err(AttackError::NoSuchEntity),
        };
        let Some(attack) = self.attacks.get(&next) else {
            warn!(?entity, attack = %next, "combo follow-up not found");
            return Err(AttackError::UnknownAttack(next));
        };

        self.begin(world, entity, attack, true, events)?;

        let combo_count = world
            .get::<&AttackPhaseState>(entity)
            .map(|state| state.combo_count)
            .unwrap_or_default();
        debug!(?entity, %from, to = %next, combo_count, "combo chained");
        events.emit(CombatEvent::ComboChained {
            entity,
            from,
            to: next,
            combo_count,
        });
        Ok(())
    }

    fn begin(
        &self,
        world: &mut World,
        entity: Entity,
        attack: &AttackDefinition,
        chained: bool,
        events: &mut EventBus,
    ) -> Result<(), AttackError> {
        if !world.contains(entity) {
            return Err(AttackError::NoSuchEntity);
        }
        if world.get::<&AttackPhaseState>(entity).is_err() {
            world
                .insert_one(entity, AttackPhaseState::with_combo_window(self.combo_window_secs))
                .map_err(|_| AttackError::NoSuchEntity)?;
        }

        let (old_phase, was_attacking, previous_count) = {
            let state = world
                .get::<&AttackPhaseState>(entity)
                .map_err(|_| AttackError::NoSuchEntity)?;
            if !chained && state.is_attacking() && !state.can_cancel() {
                return Err(AttackError::NotCancelable {
                    attack: state.current_attack.clone().unwrap_or_default(),
                    phase: state.phase,
                });
            }
            (state.phase, state.is_attacking(), state.combo_count)
        };

        if was_attacking {
            self.deactivate_hitboxes(world, entity, events);
        }

        let combo_count = if chained {
            (previous_count + 1).min(attack.max_combo_chain.max(1))
        } else {
            1
        };

        if let Ok(mut state) = world.get::<&mut AttackPhaseState>(entity) {
            state.attack_def = attack.clone();
            state.current_attack = Some(attack.name.clone());
            state.phase = AttackPhase::Startup;
            state.phase_time = 0.0;
            state.phase_duration = attack.startup_duration;
            state.queued_attack = None;
            state.combo_window_timer = 0.0;
            state.combo_count = combo_count;
        }

        debug!(?entity, attack = %attack.name, combo_count, "attack started");
        events.emit(CombatEvent::AttackStarted {
            entity,
            attack: attack.name.clone(),
            combo_count,
        });
        events.emit(CombatEvent::PhaseChanged {
            entity,
            old: old_phase,
            new: AttackPhase::Startup,
            attack: Some(attack.name.clone()),
        });
        Ok(())
    }

    fn enter_active(&self, world: &mut World, entity: Entity, events: &mut EventBus) {
        let (attack, name) = {
            let Ok(mut state) = world.get::<&mut AttackPhaseState>(entity) else {
                return;
            };
            state.phase = AttackPhase::Active;
            state.phase_time = 0.0;
            state.phase_duration = state.attack_def.active_duration;
            (state.attack_def.clone(), state.current_attack.clone())
        };

        self.activate_hitboxes(world, entity, &attack, events);
        debug!(?entity, attack = %attack.name, "active");
        events.emit(CombatEvent::PhaseChanged {
            entity,
            old: AttackPhase::Startup,
            new: AttackPhase::Active,
            attack: name,
        });
    }

    fn enter_recovery(&self, world: &mut World, entity: Entity, events: &mut EventBus) {
        let name = {
            let Ok(mut state) = world.get::<&mut AttackPhaseState>(entity) else {
                return;
            };
            state.phase = AttackPhase::Recovery;
            state.phase_time = 0.0;
            state.phase_duration = state.attack_def.recovery_duration;
            state.combo_window_timer = state.combo_window_duration;
            state.current_attack.clone()
        };

        self.deactivate_hitboxes(world, entity, events);
        events.emit(CombatEvent::PhaseChanged {
            entity,
            old: AttackPhase::Active,
            new: AttackPhase::Recovery,
            attack: name,
        });
    }

    fn finish(&self, world: &mut World, entity: Entity, events: &mut EventBus) {
        let attack = {
            let Ok(mut state) = world.get::<&mut AttackPhaseState>(entity) else {
                return;
            };
            let attack = state.current_attack.clone().unwrap_or_default();
            state.clear();
            attack
        };

        debug!(?entity, %attack, "attack finished");
        events.emit(CombatEvent::PhaseChanged {
            entity,
            old: AttackPhase::Recovery,
            new: AttackPhase::None,
            attack: Some(attack.clone()),
        });
        events.emit(CombatEvent::AttackEnded {
            entity,
            attack,
            was_canceled: false,
        });
    }
}
