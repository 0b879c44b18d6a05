//! Tests for the attack phase machine, damage pipeline, hitstop, systems
//! and the combat engine.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;
use hecs::{Entity, World};

use clash_core::attack::{AttackDefinition, AttackPhaseState};
use clash_core::components::*;
use clash_core::config::CombatConfig;
use clash_core::enums::*;
use clash_core::error::{AttackError, CatalogError};
use clash_core::events::CombatEvent;
use clash_core::types::{Contact, DamageInfo};

use crate::attacks::{AttackPhaseManager, InputOutcome};
use crate::damage::{geometry, DamageModifierChain, DamageResolver};
use crate::engine::CombatEngine;
use crate::event_bus::EventBus;
use crate::hitstop::HitstopController;
use crate::systems;
use crate::world_setup::Fighter;

const DT: f32 = 0.125;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

/// 0.25 startup, 0.25 active, 0.5 recovery. Exact in binary.
fn jab() -> AttackDefinition {
    AttackDefinition {
        startup_duration: 0.25,
        active_duration: 0.25,
        recovery_duration: 0.5,
        ..AttackDefinition::new("jab")
    }
}

/// Comboable, chains into itself.
fn slash() -> AttackDefinition {
    AttackDefinition {
        name: "slash".to_string(),
        can_cancel_into_attack: true,
        next_combo_attack: "slash".to_string(),
        max_combo_chain: 3,
        ..jab()
    }
}

/// Long, uncancelable active phase.
fn heavy() -> AttackDefinition {
    AttackDefinition {
        startup_duration: 0.125,
        active_duration: 1.0,
        recovery_duration: 0.5,
        can_cancel_startup: false,
        can_cancel_into_attack: true,
        next_combo_attack: "heavy".to_string(),
        ..AttackDefinition::new("heavy")
    }
}

fn manager() -> AttackPhaseManager {
    let mut manager = AttackPhaseManager::new();
    manager.register_attacks([jab(), slash(), heavy()]);
    manager
}

fn spawn_attacker(world: &mut World) -> Entity {
    world.spawn((Hitboxes::new(vec![Hitbox::new("weapon")]),))
}

fn state(world: &World, entity: Entity) -> AttackPhaseState {
    (*world.get::<&AttackPhaseState>(entity).unwrap()).clone()
}

fn count<F: Fn(&CombatEvent) -> bool>(events: &[CombatEvent], pred: F) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

// ---- Attack phases ----

#[test]
fn test_phase_sequence_and_progress() {
    let mut world = World::new();
    let attacks = manager();
    let mut events = EventBus::new();
    let e = spawn_attacker(&mut world);

    attacks.start_attack(&mut world, e, "jab", &mut events).unwrap();
    let mut phases = vec![state(&world, e).phase];
    let mut last_progress = state(&world, e).get_phase_progress();

    for _ in 0..8 {
        let before = state(&world, e).phase;
        attacks.advance_phase(&mut world, e, DT, &mut events);
        let s = state(&world, e);
        if s.phase != before {
            phases.push(s.phase);
            if s.is_attacking() {
                assert_eq!(s.phase_time, 0.0, "phase time resets on entry");
            }
        } else {
            assert!(s.get_phase_progress() >= last_progress);
        }
        last_progress = s.get_phase_progress();

        let live = world.get::<&Hitboxes>(e).unwrap().any_active();
        assert_eq!(live, s.phase == AttackPhase::Active);
    }

    assert_eq!(
        phases,
        vec![
            AttackPhase::Startup,
            AttackPhase::Active,
            AttackPhase::Recovery,
            AttackPhase::None
        ]
    );

    let log = events.drain();
    assert!(matches!(
        log.first(),
        Some(CombatEvent::AttackStarted { combo_count: 1, .. })
    ));
    assert_eq!(
        count(&log, |ev| matches!(
            ev,
            CombatEvent::AttackEnded {
                was_canceled: false,
                ..
            }
        )),
        1
    );
}

#[test]
fn test_one_transition_per_tick() {
    let mut world = World::new();
    let attacks = manager();
    let mut events = EventBus::new();
    let e = spawn_attacker(&mut world);

    attacks.start_attack(&mut world, e, "jab", &mut events).unwrap();
    attacks.advance_phase(&mut world, e, 10.0, &mut events);
    assert_eq!(state(&world, e).phase, AttackPhase::Active);
    attacks.advance_phase(&mut world, e, 10.0, &mut events);
    assert_eq!(state(&world, e).phase, AttackPhase::Recovery);
}

#[test]
fn test_unknown_attack_rejected() {
    let mut world = World::new();
    let attacks = manager();
    let mut events = EventBus::new();
    let e = spawn_attacker(&mut world);

    let result = attacks.start_attack(&mut world, e, "uppercut", &mut events);
    assert_eq!(result, Err(AttackError::UnknownAttack("uppercut".into())));
    assert_eq!(attacks.phase_of(&world, e), AttackPhase::None);
    assert!(events.is_empty());
}

#[test]
fn test_start_refused_while_not_cancelable() {
    let mut world = World::new();
    let attacks = manager();
    let mut events = EventBus::new();
    let e = spawn_attacker(&mut world);

    attacks.start_attack(&mut world, e, "jab", &mut events).unwrap();
    attacks.advance_phase(&mut world, e, 0.25, &mut events);
    let before = state(&world, e);
    assert_eq!(before.phase, AttackPhase::Active);

    let result = attacks.start_attack(&mut world, e, "slash", &mut events);
    assert!(matches!(result, Err(AttackError::NotCancelable { .. })));
    assert_eq!(state(&world, e), before);
}

#[test]
fn test_start_during_cancelable_startup_replaces_attack() {
    let mut world = World::new();
    let attacks = manager();
    let mut events = EventBus::new();
    let e = spawn_attacker(&mut world);

    attacks.start_attack(&mut world, e, "jab", &mut events).unwrap();
    attacks.advance_phase(&mut world, e, DT, &mut events);
    attacks.start_attack(&mut world, e, "slash", &mut events).unwrap();

    let s = state(&world, e);
    assert_eq!(s.current_attack.as_deref(), Some("slash"));
    assert_eq!(s.phase, AttackPhase::Startup);
    assert_eq!(s.phase_time, 0.0);
    assert_eq!(s.combo_count, 1);
}

#[test]
fn test_cancel_is_transient() {
    let mut world = World::new();
    let attacks = manager();
    let mut events = EventBus::new();
    let e = spawn_attacker(&mut world);

    assert!(!attacks.cancel_attack(&mut world, e, &mut events));

    attacks.start_attack(&mut world, e, "jab", &mut events).unwrap();
    attacks.advance_phase(&mut world, e, 0.25, &mut events);
    assert!(world.get::<&Hitboxes>(e).unwrap().any_active());

    assert!(attacks.cancel_attack(&mut world, e, &mut events));
    assert_eq!(state(&world, e).phase, AttackPhase::Canceled);
    assert!(!world.get::<&Hitboxes>(e).unwrap().any_active());
    assert!(!attacks.is_attacking(&world, e));
    assert!(!attacks.cancel_attack(&mut world, e, &mut events));

    attacks.advance_phase(&mut world, e, DT, &mut events);
    assert_eq!(state(&world, e).phase, AttackPhase::None);

    let log = events.drain();
    assert_eq!(
        count(&log, |ev| matches!(
            ev,
            CombatEvent::AttackEnded {
                was_canceled: true,
                ..
            }
        )),
        1
    );
    assert!(log.iter().any(|ev| matches!(
        ev,
        CombatEvent::PhaseChanged {
            old: AttackPhase::Canceled,
            new: AttackPhase::None,
            ..
        }
    )));
}

#[test]
fn test_in_flight_attack_keeps_snapshot() {
    let mut world = World::new();
    let mut attacks = manager();
    let mut events = EventBus::new();
    let e = spawn_attacker(&mut world);

    attacks.start_attack(&mut world, e, "jab", &mut events).unwrap();
    attacks.register_attack(AttackDefinition {
        startup_duration: 5.0,
        ..jab()
    });

    let s = state(&world, e);
    assert_eq!(s.phase_duration, 0.25);
    assert_eq!(s.attack_def.startup_duration, 0.25);
    assert_eq!(attacks.get_attack("jab").unwrap().startup_duration, 5.0);
}

#[test]
fn test_start_inline_definition() {
    let mut world = World::new();
    let attacks = AttackPhaseManager::new();
    let mut events = EventBus::new();
    let e = spawn_attacker(&mut world);

    let def = AttackDefinition::new("improvised");
    attacks
        .start_attack_with(&mut world, e, &def, &mut events)
        .unwrap();
    assert_eq!(
        state(&world, e).current_attack.as_deref(),
        Some("improvised")
    );
}

// ---- Combos and input buffering ----

#[test]
fn test_combo_count_capped() {
    let mut world = World::new();
    let attacks = manager();
    let mut events = EventBus::new();
    let e = spawn_attacker(&mut world);

    assert_eq!(
        attacks.process_attack_input(&mut world, e, "slash", &mut events),
        Ok(InputOutcome::Started)
    );
    assert_eq!(
        attacks.process_attack_input(&mut world, e, "slash", &mut events),
        Ok(InputOutcome::Chained)
    );
    assert_eq!(
        attacks.process_attack_input(&mut world, e, "slash", &mut events),
        Ok(InputOutcome::Chained)
    );
    assert_eq!(state(&world, e).combo_count, 3);

    for _ in 0..10 {
        let outcome = attacks.process_attack_input(&mut world, e, "slash", &mut events);
        assert_eq!(outcome, Ok(InputOutcome::Buffered));
        assert!(state(&world, e).combo_count <= 3);
    }
    assert_eq!(state(&world, e).queued_attack.as_deref(), Some("slash"));

    let log = events.drain();
    assert_eq!(
        count(&log, |ev| matches!(ev, CombatEvent::ComboChained { .. })),
        2
    );
}

#[test]
fn test_buffered_input_expires() {
    let mut world = World::new();
    let attacks = manager();
    let mut events = EventBus::new();
    let e = spawn_attacker(&mut world);

    attacks.start_attack(&mut world, e, "heavy", &mut events).unwrap();
    attacks.advance_phase(&mut world, e, DT, &mut events);
    assert_eq!(state(&world, e).phase, AttackPhase::Active);

    assert_eq!(
        attacks.process_attack_input(&mut world, e, "heavy", &mut events),
        Ok(InputOutcome::Buffered)
    );
    assert_eq!(state(&world, e).combo_window_timer, 0.5);

    // Window is 0.5 s; active lasts 1.0 s.
    for _ in 0..4 {
        attacks.advance_phase(&mut world, e, DT, &mut events);
    }
    assert_eq!(state(&world, e).queued_attack, None);
    assert_eq!(state(&world, e).phase, AttackPhase::Active);

    for _ in 0..20 {
        attacks.advance_phase(&mut world, e, DT, &mut events);
    }
    assert_eq!(state(&world, e).phase, AttackPhase::None);

    let log = events.drain();
    assert_eq!(
        count(&log, |ev| matches!(ev, CombatEvent::InputExpired { .. })),
        1
    );
    assert_eq!(
        count(&log, |ev| matches!(ev, CombatEvent::ComboChained { .. })),
        0
    );
    assert_eq!(
        count(&log, |ev| matches!(ev, CombatEvent::AttackStarted { .. })),
        1
    );
}

#[test]
fn test_buffered_input_fires_in_recovery() {
    let mut world = World::new();
    let mut attacks = AttackPhaseManager::with_combo_window(2.0);
    attacks.register_attack(heavy());
    let mut events = EventBus::new();
    let e = spawn_attacker(&mut world);

    attacks.start_attack(&mut world, e, "heavy", &mut events).unwrap();
    attacks.advance_phase(&mut world, e, DT, &mut events);
    attacks
        .process_attack_input(&mut world, e, "heavy", &mut events)
        .unwrap();

    // 8 ticks to finish Active, one more to chain from Recovery.
    for _ in 0..9 {
        attacks.advance_phase(&mut world, e, DT, &mut events);
    }

    let s = state(&world, e);
    assert_eq!(s.phase, AttackPhase::Startup);
    assert_eq!(s.combo_count, 2);
    assert_eq!(s.queued_attack, None);

    let log = events.drain();
    assert!(log.iter().any(|ev| matches!(
        ev,
        CombatEvent::ComboChained { combo_count: 2, .. }
    )));
}

#[test]
fn test_zero_combo_window_drops_buffered_input() {
    let mut world = World::new();
    let mut attacks = AttackPhaseManager::with_combo_window(0.0);
    attacks.register_attack(jab());
    let mut events = EventBus::new();
    let e = spawn_attacker(&mut world);

    attacks.start_attack(&mut world, e, "jab", &mut events).unwrap();
    attacks.advance_phase(&mut world, e, DT, &mut events);
    attacks.advance_phase(&mut world, e, DT, &mut events);
    assert_eq!(state(&world, e).phase, AttackPhase::Active);
    assert_eq!(
        attacks.process_attack_input(&mut world, e, "jab", &mut events),
        Ok(InputOutcome::Buffered)
    );

    for _ in 0..8 {
        attacks.advance_phase(&mut world, e, DT, &mut events);
    }
    assert_eq!(state(&world, e).phase, AttackPhase::None);
    assert_eq!(state(&world, e).queued_attack, None);

    let log = events.drain();
    assert_eq!(
        count(&log, |ev| matches!(ev, CombatEvent::AttackStarted { .. })),
        1
    );
    assert_eq!(
        count(&log, |ev| matches!(ev, CombatEvent::InputExpired { .. })),
        1
    );
}

#[test]
fn test_unknown_buffered_attack_leaves_entity_idle() {
    let mut world = World::new();
    let mut attacks = AttackPhaseManager::with_combo_window(2.0);
    attacks.register_attack(jab());
    let mut events = EventBus::new();
    let e = spawn_attacker(&mut world);

    attacks.start_attack(&mut world, e, "jab", &mut events).unwrap();
    attacks.advance_phase(&mut world, e, DT, &mut events);
    attacks.advance_phase(&mut world, e, DT, &mut events);
    assert_eq!(
        attacks.process_attack_input(&mut world, e, "missing", &mut events),
        Ok(InputOutcome::Buffered)
    );

    // 2 ticks of Active, 4 of Recovery.
    for _ in 0..6 {
        attacks.advance_phase(&mut world, e, DT, &mut events);
    }
    let s = state(&world, e);
    assert_eq!(s.phase, AttackPhase::None);
    assert_eq!(s.current_attack, None);
    assert_eq!(s.queued_attack, None);

    let log = events.drain();
    assert_eq!(
        count(&log, |ev| matches!(ev, CombatEvent::AttackStarted { .. })),
        1
    );
    assert_eq!(
        count(&log, |ev| matches!(
            ev,
            CombatEvent::AttackEnded { was_canceled: false, .. }
        )),
        1
    );
}

#[test]
fn test_per_entity_hitstop_freezes_phase() {
    let mut world = World::new();
    let attacks = manager();
    let mut events = EventBus::new();
    let e = spawn_attacker(&mut world);

    attacks.start_attack(&mut world, e, "jab", &mut events).unwrap();
    attacks.apply_hitstop(&mut world, e, 0.25);
    attacks.apply_hitstop(&mut world, e, 0.125);
    assert_eq!(state(&world, e).hitstop_remaining, 0.25);

    attacks.advance_phase(&mut world, e, DT, &mut events);
    attacks.advance_phase(&mut world, e, DT, &mut events);
    assert_eq!(state(&world, e).phase_time, 0.0);

    attacks.advance_phase(&mut world, e, DT, &mut events);
    assert_eq!(state(&world, e).phase_time, DT);
}

// ---- Catalog ----

#[test]
fn test_catalog_load_and_queries() {
    let mut attacks = AttackPhaseManager::new();
    let json = r#"[
        {"name": "thrust", "startup_duration": 0.2},
        {"name": "overhead", "recovery_duration": 0.6, "hitbox_ids": ["blade"]}
    ]"#;
    assert_eq!(attacks.load_attacks_json(json).unwrap(), 2);
    assert_eq!(attacks.get_registered_attacks(), vec!["overhead", "thrust"]);
    assert_eq!(attacks.get_attack("thrust").unwrap().active_duration, 0.2);
    assert_eq!(attacks.get_attack("overhead").unwrap().hitbox_ids, vec!["blade"]);

    assert!(attacks.unregister_attack("thrust"));
    assert!(!attacks.unregister_attack("thrust"));
    attacks.clear_attacks();
    assert!(attacks.get_registered_attacks().is_empty());
}

#[test]
fn test_catalog_load_is_all_or_nothing() {
    let mut attacks = AttackPhaseManager::new();
    let json = r#"[
        {"name": "fine"},
        {"name": "broken", "cancel_window_start": 0.95, "cancel_window_end": 0.9}
    ]"#;
    match attacks.load_attacks_json(json) {
        Err(CatalogError::Invalid { name, .. }) => assert_eq!(name, "broken"),
        other => panic!("expected invalid catalog, got {other:?}"),
    }
    assert!(attacks.get_registered_attacks().is_empty());

    assert!(matches!(
        attacks.load_attacks_json("{not json"),
        Err(CatalogError::Parse(_))
    ));
}

// ---- Damage ----

/// Attacker stands directly behind a target at the origin facing -Z, which
/// the backstab test never counts.
fn duel_world(receiver: Option<DamageReceiver>) -> (World, Entity, Entity) {
    let mut world = World::new();
    let attacker = world.spawn((WorldTransform::from_rotation_translation(
        glam::Quat::IDENTITY,
        Vec3::new(0.0, 0.0, 2.0),
    ),));
    let target = world.spawn((WorldTransform::default(),));
    if let Some(receiver) = receiver {
        world.insert_one(target, receiver).unwrap();
    }
    (world, attacker, target)
}

fn hit(
    resolver: &mut DamageResolver,
    world: &World,
    attacker: Entity,
    target: Entity,
    hitbox: &Hitbox,
    hurtbox: &Hurtbox,
) -> DamageInfo {
    resolver.calculate_damage(world, attacker, target, hitbox, hurtbox, Vec3::ZERO, Vec3::Y)
}

#[test]
fn test_blocked_hit_scenario() {
    let receiver = DamageReceiver {
        is_blocking: true,
        block_damage_reduction: 0.5,
        ..Default::default()
    };
    let (world, attacker, target) = duel_world(Some(receiver));
    let mut resolver = DamageResolver::new(1);

    let hitbox = Hitbox {
        base_damage: 100.0,
        ..Hitbox::new("weapon")
    };
    let hurtbox = Hurtbox {
        physical_resistance: 0.25,
        ..Default::default()
    };

    let info = hit(&mut resolver, &world, attacker, target, &hitbox, &hurtbox);
    assert!(!info.is_backstab);
    assert!(!info.is_critical);
    assert!(info.is_blocked);
    assert!(approx(info.final_damage, 37.5));
    assert!(approx(info.poise_damage, 5.0));
    assert!(approx(info.knockback.z, 1.5));
    assert!(approx(info.blocked_damage(), 62.5));
}

#[test]
fn test_resistance_is_monotonic() {
    let (world, attacker, target) = duel_world(Some(DamageReceiver::default()));
    let mut resolver = DamageResolver::new(1);
    let hitbox = Hitbox {
        base_damage: 40.0,
        damage_type: DamageType::Fire,
        ..Hitbox::new("weapon")
    };

    let mut previous = f32::INFINITY;
    for step in 0..=10 {
        let hurtbox = Hurtbox {
            fire_resistance: step as f32 / 10.0,
            ..Default::default()
        };
        let info = hit(&mut resolver, &world, attacker, target, &hitbox, &hurtbox);
        assert!(info.final_damage <= previous);
        previous = info.final_damage;
    }
    assert_eq!(previous, 0.0);
}

#[test]
fn test_parry_negates_everything() {
    let receiver = DamageReceiver {
        is_parrying: true,
        parry_window: 0.2,
        is_blocking: true,
        ..Default::default()
    };
    let mut world = World::new();
    // Attacker in front of the target: counts as a backstab.
    let attacker = world.spawn((WorldTransform::from_rotation_translation(
        glam::Quat::IDENTITY,
        Vec3::new(0.0, 0.0, -2.0),
    ),));
    let target = world.spawn((WorldTransform::default(), receiver));
    let mut resolver = DamageResolver::new(1);
    let hitbox = Hitbox {
        critical_chance: 1.0,
        ..Hitbox::new("weapon")
    };

    let info = resolver.deal_damage(
        &world,
        attacker,
        target,
        &hitbox,
        &Hurtbox::default(),
        Vec3::ZERO,
        Vec3::Y,
    );
    assert!(info.is_critical);
    assert!(info.is_backstab);
    assert!(info.is_parried);
    assert!(!info.is_blocked);
    assert_eq!(info.final_damage, 0.0);
    assert!(approx(info.poise_damage, 10.0));
    assert!(!info.caused_stagger);
    assert_eq!(
        world.get::<&DamageReceiver>(target).unwrap().current_poise,
        100.0
    );
}

#[test]
fn test_expired_parry_window_falls_through_to_block() {
    let receiver = DamageReceiver {
        is_parrying: true,
        parry_window: 0.0,
        is_blocking: true,
        ..Default::default()
    };
    let (world, attacker, target) = duel_world(Some(receiver));
    let mut resolver = DamageResolver::new(1);
    let info = hit(
        &mut resolver,
        &world,
        attacker,
        target,
        &Hitbox::new("weapon"),
        &Hurtbox::default(),
    );
    assert!(!info.is_parried);
    assert!(info.is_blocked);
    assert!(approx(info.final_damage, 5.0));
}

#[test]
fn test_backstab_multiplier() {
    let mut world = World::new();
    let attacker = world.spawn((LocalTransform::from_position(Vec3::new(0.0, 0.0, -2.0)),));
    let vulnerable = world.spawn((LocalTransform::default(), DamageReceiver::default()));
    let immune = world.spawn((
        LocalTransform::default(),
        DamageReceiver {
            backstab_vulnerable: false,
            ..Default::default()
        },
    ));
    let mut resolver = DamageResolver::new(1);
    let hitbox = Hitbox::new("weapon");
    let hurtbox = Hurtbox::default();

    let info = hit(&mut resolver, &world, attacker, vulnerable, &hitbox, &hurtbox);
    assert!(info.is_backstab);
    assert!(approx(info.final_damage, 20.0));

    let info = hit(&mut resolver, &world, attacker, immune, &hitbox, &hurtbox);
    assert!(info.is_backstab);
    assert!(approx(info.final_damage, 10.0));
}

#[test]
fn test_backstab_cone_boundaries() {
    let mut world = World::new();
    let target = world.spawn((LocalTransform::default(),));
    let behind = world.spawn((LocalTransform::from_position(Vec3::new(0.0, 0.0, 3.0)),));
    let beside = world.spawn((LocalTransform::from_position(Vec3::new(3.0, 0.0, 0.0)),));
    let front = world.spawn((LocalTransform::from_position(Vec3::new(0.0, 0.0, -3.0)),));
    let same_spot = world.spawn((LocalTransform::default(),));

    assert!(!geometry::check_backstab(&world, behind, target, 60.0));
    assert!(geometry::check_backstab(&world, beside, target, 60.0));
    assert!(geometry::check_backstab(&world, front, target, 60.0));
    assert!(!geometry::check_backstab(&world, same_spot, target, 60.0));
}

#[test]
fn test_missing_components_degrade() {
    let mut world = World::new();
    let attacker = world.spawn(());
    let target = world.spawn(());
    let mut resolver = DamageResolver::new(1);

    let info = resolver.deal_damage(
        &world,
        attacker,
        target,
        &Hitbox::new("weapon"),
        &Hurtbox::default(),
        Vec3::ZERO,
        Vec3::Y,
    );
    assert!(!info.is_backstab);
    assert!(!info.caused_stagger);
    assert!(approx(info.final_damage, 10.0));
    assert!(approx(info.knockback.z, 5.0));
}

#[test]
fn test_knockback_follows_attacker_orientation() {
    let mut world = World::new();
    let turned = glam::Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
    let attacker = world.spawn((WorldTransform::from_rotation_translation(
        turned,
        Vec3::new(0.0, 0.0, 2.0),
    ),));
    let target = world.spawn((WorldTransform::default(),));
    let mut resolver = DamageResolver::new(1);

    let info = hit(
        &mut resolver,
        &world,
        attacker,
        target,
        &Hitbox::new("weapon"),
        &Hurtbox::default(),
    );
    // +Z rotated a quarter turn about Y is +X.
    assert!(approx(info.knockback.x, 5.0));
    assert!(approx(info.knockback.z, 0.0));
}

#[test]
fn test_poise_break_staggers() {
    let (world, attacker, target) = duel_world(Some(DamageReceiver::default()));
    let mut resolver = DamageResolver::new(1);
    let hitbox = Hitbox {
        poise_damage: 60.0,
        ..Hitbox::new("weapon")
    };

    let first = resolver.deal_damage(
        &world,
        attacker,
        target,
        &hitbox,
        &Hurtbox::default(),
        Vec3::ZERO,
        Vec3::Y,
    );
    assert!(!first.caused_stagger);
    let second = resolver.deal_damage(
        &world,
        attacker,
        target,
        &hitbox,
        &Hurtbox::default(),
        Vec3::ZERO,
        Vec3::Y,
    );
    assert!(second.caused_stagger);

    let receiver = world.get::<&DamageReceiver>(target).unwrap();
    assert_eq!(receiver.current_poise, 0.0);
    assert!(receiver.is_staggered());
}

#[test]
fn test_same_seed_same_crits() {
    let (world, attacker, target) = duel_world(None);
    let hitbox = Hitbox {
        critical_chance: 0.5,
        ..Hitbox::new("weapon")
    };
    let hurtbox = Hurtbox::default();

    let mut a = DamageResolver::new(99);
    let mut b = DamageResolver::new(99);
    let rolls_a: Vec<bool> = (0..50)
        .map(|_| hit(&mut a, &world, attacker, target, &hitbox, &hurtbox).is_critical)
        .collect();
    let rolls_b: Vec<bool> = (0..50)
        .map(|_| hit(&mut b, &world, attacker, target, &hitbox, &hurtbox).is_critical)
        .collect();
    assert_eq!(rolls_a, rolls_b);
    assert!(rolls_a.contains(&true));
    assert!(rolls_a.contains(&false));
}

// ---- Modifiers ----

#[test]
fn test_modifiers_run_by_priority() {
    let (world, attacker, target) = duel_world(None);
    let mut resolver = DamageResolver::new(1);
    // Added low priority first; must still run last.
    resolver.add_modifier("cap", |info| info.final_damage = info.final_damage.min(100.0), 5);
    resolver.add_modifier("triple", |info| info.final_damage *= 3.0, 10);
    assert_eq!(resolver.modifiers().names(), vec!["triple", "cap"]);

    let hitbox = Hitbox {
        base_damage: 50.0,
        ..Hitbox::new("weapon")
    };
    let info = hit(&mut resolver, &world, attacker, target, &hitbox, &Hurtbox::default());
    assert!(approx(info.final_damage, 100.0));
}

#[test]
fn test_modifier_result_is_clamped() {
    let (world, attacker, target) = duel_world(None);
    let mut resolver = DamageResolver::new(1);
    resolver.add_modifier("drain", |info| info.final_damage -= 1000.0, 0);
    let info = hit(
        &mut resolver,
        &world,
        attacker,
        target,
        &Hitbox::new("weapon"),
        &Hurtbox::default(),
    );
    assert_eq!(info.final_damage, 0.0);

    assert!(resolver.remove_modifier("drain"));
    assert!(!resolver.remove_modifier("drain"));
}

#[test]
fn test_modifier_chain_replace_and_ties() {
    let mut chain = DamageModifierChain::new();
    chain.add("a", |_| {}, 1);
    chain.add("b", |_| {}, 1);
    chain.add("c", |_| {}, 1);
    assert_eq!(chain.names(), vec!["a", "b", "c"]);

    chain.add("a", |_| {}, 1);
    assert_eq!(chain.names(), vec!["b", "c", "a"]);
    assert_eq!(chain.len(), 3);
    assert!(chain.contains("b"));

    chain.clear();
    assert!(chain.is_empty());
}

// ---- Hitstop ----

#[test]
fn test_hitstop_saturates() {
    let mut hitstop = HitstopController::default();
    assert_eq!(hitstop.time_scale(), 1.0);

    hitstop.trigger(0.5);
    hitstop.trigger(0.2);
    assert_eq!(hitstop.remaining(), 0.5);
    hitstop.trigger(0.8);
    assert_eq!(hitstop.remaining(), 0.8);
    assert_eq!(hitstop.time_scale(), 0.0);

    hitstop.update(0.8);
    assert_eq!(hitstop.remaining(), 0.0);
    assert_eq!(hitstop.time_scale(), 1.0);
    hitstop.update(1.0);
    assert_eq!(hitstop.remaining(), 0.0);
}

#[test]
fn test_hitstop_disabled() {
    let mut hitstop = HitstopController::new(false);
    assert!(!hitstop.trigger(0.5));
    assert!(!hitstop.is_active());

    hitstop.set_enabled(true);
    assert!(hitstop.trigger(0.5));
    assert!(hitstop.is_active());
    hitstop.reset();
    assert!(!hitstop.is_active());
}

// ---- Event bus ----

#[test]
fn test_event_bus_fan_out() {
    let mut bus = EventBus::new();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let log = Rc::clone(&seen);
    let first = bus.subscribe(move |_| log.borrow_mut().push("first"));
    let log = Rc::clone(&seen);
    bus.subscribe(move |_| log.borrow_mut().push("second"));

    let e = World::new().spawn(());
    bus.emit(CombatEvent::InputBuffered {
        entity: e,
        attack: "jab".into(),
    });
    assert_eq!(*seen.borrow(), vec!["first", "second"]);

    assert!(bus.unsubscribe(first));
    assert!(!bus.unsubscribe(first));
    bus.emit(CombatEvent::InputExpired {
        entity: e,
        attack: "jab".into(),
    });
    assert_eq!(*seen.borrow(), vec!["first", "second", "second"]);

    assert_eq!(bus.len(), 2);
    assert_eq!(bus.drain().len(), 2);
    assert!(bus.is_empty());
}

// ---- Systems ----

#[test]
fn test_iframes_system() {
    let mut world = World::new();
    let mut events = EventBus::new();
    let e = world.spawn(());

    assert!(systems::iframes::grant_iframes(
        &mut world,
        e,
        0.25,
        IFrameSource::Dodge,
        &mut events
    ));
    assert!(!systems::iframes::grant_iframes(
        &mut world,
        e,
        0.125,
        IFrameSource::Hit,
        &mut events
    ));
    assert!(systems::iframes::is_invincible(&world, e));

    systems::iframes::run(&mut world, DT, &mut events);
    assert!(systems::iframes::is_invincible(&world, e));
    systems::iframes::run(&mut world, DT, &mut events);
    assert!(!systems::iframes::is_invincible(&world, e));

    let log = events.drain();
    assert_eq!(
        count(&log, |ev| matches!(
            ev,
            CombatEvent::IFramesEnded {
                source: IFrameSource::Dodge,
                ..
            }
        )),
        1
    );
}

#[test]
fn test_poise_system() {
    let mut world = World::new();
    let e = world.spawn((DamageReceiver {
        current_poise: 50.0,
        is_parrying: true,
        parry_window: 0.5,
        ..Default::default()
    },));

    systems::poise::run(&mut world, 1.0);
    systems::poise::run(&mut world, 1.0);
    assert_eq!(world.get::<&DamageReceiver>(e).unwrap().current_poise, 50.0);
    systems::poise::run(&mut world, 1.0);

    let receiver = world.get::<&DamageReceiver>(e).unwrap();
    assert_eq!(receiver.current_poise, 70.0);
    assert_eq!(receiver.parry_window, 0.0);
}

#[test]
fn test_contact_filters() {
    let mut world = World::new();
    let mut attacks = AttackPhaseManager::new();
    attacks.register_attack(jab());
    let mut resolver = DamageResolver::new(1);
    let mut hitstop = HitstopController::default();
    let config = CombatConfig::default();
    let mut events = EventBus::new();

    let attacker = crate::world_setup::spawn_fighter(
        &mut world,
        Fighter::new("player", "enemy").at(Vec3::new(0.0, 0.0, 2.0)),
    );
    let ally = crate::world_setup::spawn_fighter(
        &mut world,
        Fighter::new("player", "enemy").at(Vec3::new(0.0, 0.0, 4.0)),
    );
    let enemy = crate::world_setup::spawn_fighter(&mut world, Fighter::new("enemy", "player"));

    let contacts = [
        Contact::new(attacker, enemy, "weapon"),
        Contact::new(attacker, ally, "weapon"),
        Contact::new(attacker, attacker, "weapon"),
        Contact::new(attacker, enemy, "no-such-hitbox"),
    ];

    // Inactive hitbox: nothing lands.
    let hits = systems::hits::resolve_contacts(
        &mut world,
        &contacts,
        &attacks,
        &mut resolver,
        &mut hitstop,
        &config,
        &mut events,
    );
    assert!(hits.is_empty());

    world
        .get::<&mut Hitboxes>(attacker)
        .unwrap()
        .activate_matching(&[]);
    let hits = systems::hits::resolve_contacts(
        &mut world,
        &contacts,
        &attacks,
        &mut resolver,
        &mut hitstop,
        &config,
        &mut events,
    );
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].target, enemy);
    assert!(systems::iframes::is_invincible(&world, enemy));
    assert_eq!(hitstop.remaining(), config.hit_hitstop_secs);

    // Already hit by this activation.
    let hits = systems::hits::resolve_contacts(
        &mut world,
        &contacts,
        &attacks,
        &mut resolver,
        &mut hitstop,
        &config,
        &mut events,
    );
    assert!(hits.is_empty());
}

#[test]
fn test_invincible_target_is_skipped() {
    let mut world = World::new();
    let attacks = AttackPhaseManager::new();
    let mut resolver = DamageResolver::new(1);
    let mut hitstop = HitstopController::default();
    let config = CombatConfig::default();
    let mut events = EventBus::new();

    let attacker =
        crate::world_setup::spawn_fighter(&mut world, Fighter::new("player", "enemy"));
    let enemy = crate::world_setup::spawn_fighter(&mut world, Fighter::new("enemy", "player"));
    world
        .get::<&mut Hitboxes>(attacker)
        .unwrap()
        .activate_matching(&[]);
    systems::iframes::grant_default_iframes(&mut world, enemy, IFrameSource::Spawn, &mut events);

    let hits = systems::hits::resolve_contacts(
        &mut world,
        &[Contact::new(attacker, enemy, "weapon")],
        &attacks,
        &mut resolver,
        &mut hitstop,
        &config,
        &mut events,
    );
    assert!(hits.is_empty());
    assert!(!world.get::<&Hitboxes>(attacker).unwrap().boxes[0].was_hit(enemy));
}

// ---- Hit reactions ----

fn reacting_target(world: &mut World, reaction: HitReaction) -> Entity {
    world.spawn((reaction,))
}

fn landed(world: &World, target: Entity, final_damage: f32) -> DamageInfo {
    let source = world.reserve_entity();
    DamageInfo {
        final_damage,
        hit_normal: Vec3::Z,
        ..DamageInfo::new(source, target)
    }
}

#[test]
fn test_hit_reaction_scales_with_damage_and_super_armor() {
    let mut world = World::new();
    let mut events = EventBus::new();
    let measured = HitReaction {
        max_health: Some(100.0),
        ..Default::default()
    };
    let plain = reacting_target(&mut world, measured.clone());
    let armored = reacting_target(
        &mut world,
        HitReaction {
            super_armor_stacks: 1,
            ..measured.clone()
        },
    );
    let immovable = reacting_target(
        &mut world,
        HitReaction {
            super_armor_stacks: 4,
            ..measured
        },
    );

    for (target, expected) in [
        (plain, HitReactionType::Heavy),
        (armored, HitReactionType::Medium),
        (immovable, HitReactionType::None),
    ] {
        let info = landed(&world, target, 30.0);
        assert_eq!(
            systems::hit_reaction::process_hit(&mut world, &info, &mut events),
            expected
        );
        assert_eq!(
            systems::hit_reaction::current_reaction(&world, target),
            expected
        );
    }

    let log = events.drain();
    assert_eq!(
        count(&log, |ev| matches!(ev, CombatEvent::HitReactionStarted { .. })),
        2
    );
    assert!(!systems::hit_reaction::is_reacting(&world, immovable));
}

#[test]
fn test_hit_reaction_cooldown_suppresses_followups() {
    let mut world = World::new();
    let mut events = EventBus::new();
    let target = reacting_target(&mut world, HitReaction::default());

    let info = landed(&world, target, 10.0);
    assert_eq!(
        systems::hit_reaction::process_hit(&mut world, &info, &mut events),
        HitReactionType::Medium
    );
    assert_eq!(
        systems::hit_reaction::process_hit(&mut world, &info, &mut events),
        HitReactionType::None
    );

    // Cooldown is 0.1 s.
    systems::hit_reaction::run(&mut world, DT, &mut events);
    assert_eq!(
        systems::hit_reaction::process_hit(&mut world, &info, &mut events),
        HitReactionType::Medium
    );

    let log = events.drain();
    assert_eq!(
        count(&log, |ev| matches!(ev, CombatEvent::HitReactionStarted { .. })),
        2
    );
}

#[test]
fn test_stagger_overrides_reaction_and_direction_follows_knockback() {
    let mut world = World::new();
    let mut events = EventBus::new();
    let target = reacting_target(
        &mut world,
        HitReaction {
            super_armor_stacks: 2,
            ..Default::default()
        },
    );

    let info = DamageInfo {
        caused_stagger: true,
        knockback: Vec3::new(0.0, 0.0, -4.0),
        ..landed(&world, target, 1.0)
    };
    assert_eq!(
        systems::hit_reaction::process_hit(&mut world, &info, &mut events),
        HitReactionType::Stagger
    );
    let reaction = world.get::<&HitReaction>(target).unwrap();
    assert!(reaction.hit_direction.abs_diff_eq(Vec3::NEG_Z, 1e-5));
    drop(reaction);

    // No knockback: pushed away from the surface normal.
    let other = reacting_target(&mut world, HitReaction::default());
    let info = landed(&world, other, 1.0);
    systems::hit_reaction::process_hit(&mut world, &info, &mut events);
    let reaction = world.get::<&HitReaction>(other).unwrap();
    assert!(reaction.hit_direction.abs_diff_eq(Vec3::NEG_Z, 1e-5));
}

#[test]
fn test_hit_reaction_ends_after_duration() {
    let mut world = World::new();
    let mut events = EventBus::new();
    let target = reacting_target(&mut world, HitReaction::default());

    assert!(systems::hit_reaction::force_reaction(
        &mut world,
        target,
        HitReactionType::Light,
        Vec3::X,
        &mut events,
    ));
    systems::hit_reaction::run(&mut world, DT, &mut events);
    assert!(systems::hit_reaction::is_reacting(&world, target));
    let progress = systems::hit_reaction::reaction_progress(&world, target);
    assert!(approx(progress, 0.625));

    systems::hit_reaction::run(&mut world, DT, &mut events);
    assert!(!systems::hit_reaction::is_reacting(&world, target));
    assert_eq!(systems::hit_reaction::reaction_progress(&world, target), 0.0);

    let log = events.drain();
    assert!(log.iter().any(|ev| matches!(
        ev,
        CombatEvent::HitReactionEnded { reaction: HitReactionType::Light, .. }
    )));
    assert!(!systems::hit_reaction::cancel_reaction(&mut world, target, &mut events));
}

#[test]
fn test_force_reaction_ignores_cooldown_and_replaces() {
    let mut world = World::new();
    let mut events = EventBus::new();
    let target = reacting_target(&mut world, HitReaction::default());
    let info = landed(&world, target, 10.0);
    systems::hit_reaction::process_hit(&mut world, &info, &mut events);
    events.drain();

    assert!(systems::hit_reaction::force_reaction(
        &mut world,
        target,
        HitReactionType::Heavy,
        Vec3::X,
        &mut events,
    ));
    assert_eq!(
        systems::hit_reaction::current_reaction(&world, target),
        HitReactionType::Heavy
    );
    let log = events.drain();
    assert!(matches!(
        log.as_slice(),
        [
            CombatEvent::HitReactionEnded { reaction: HitReactionType::Medium, .. },
            CombatEvent::HitReactionStarted { reaction: HitReactionType::Heavy, .. },
        ]
    ));

    assert!(systems::hit_reaction::cancel_reaction(&mut world, target, &mut events));
    assert!(!systems::hit_reaction::is_reacting(&world, target));
}

// ---- Engine ----

fn duel_engine(config: CombatConfig) -> (CombatEngine, Entity, Entity) {
    let mut engine = CombatEngine::new(config);
    engine.attacks_mut().register_attacks([jab(), slash()]);
    let attacker = engine.spawn_fighter(
        Fighter::new("player", "enemy")
            .at(Vec3::new(0.0, 0.0, 2.0))
            .facing(Vec3::ZERO),
    );
    let target = engine.spawn_fighter(Fighter::new("enemy", "player"));
    (engine, attacker, target)
}

#[test]
fn test_engine_hit_lands_once_per_swing() {
    let (mut engine, attacker, target) = duel_engine(CombatConfig::default());
    let contact = [Contact::new(attacker, target, "weapon")];

    assert_eq!(
        engine.process_attack_input(attacker, "jab"),
        Ok(InputOutcome::Started)
    );

    let mut log = Vec::new();
    for _ in 0..8 {
        log.extend(engine.tick(DT, &contact));
    }

    assert_eq!(
        count(&log, |ev| matches!(ev, CombatEvent::DamageDealt { .. })),
        1
    );
    assert_eq!(
        count(&log, |ev| matches!(ev, CombatEvent::HitboxesActivated { .. })),
        1
    );
    assert_eq!(
        count(&log, |ev| matches!(ev, CombatEvent::HitboxesDeactivated { .. })),
        1
    );
    let receiver = engine.world().get::<&DamageReceiver>(target).unwrap();
    assert_eq!(receiver.current_poise, 90.0);
    assert_eq!(engine.phase_of(attacker), AttackPhase::None);
    assert_eq!(engine.tick_count(), 8);
}

#[test]
fn test_engine_hitstop_freezes_attacks() {
    let (mut engine, attacker, target) = duel_engine(CombatConfig::default());
    let contact = [Contact::new(attacker, target, "weapon")];

    engine.start_attack(attacker, "jab").unwrap();
    engine.tick(DT, &contact);
    let events = engine.tick(DT, &contact);
    assert!(events
        .iter()
        .any(|ev| matches!(ev, CombatEvent::HitstopTriggered { .. })));
    assert_eq!(engine.time_scale(), 0.0);

    let frozen = engine.attack_state(attacker).unwrap();
    engine.tick(0.01, &[]);
    let still = engine.attack_state(attacker).unwrap();
    assert_eq!(still.phase_time, frozen.phase_time);
    assert_eq!(still.phase, AttackPhase::Active);
}

#[test]
fn test_engine_block_skips_iframes() {
    let (mut engine, attacker, target) = duel_engine(CombatConfig::default());
    engine
        .world_mut()
        .get::<&mut DamageReceiver>(target)
        .unwrap()
        .is_blocking = true;
    let contact = [Contact::new(attacker, target, "weapon")];

    engine.start_attack(attacker, "jab").unwrap();
    let mut log = Vec::new();
    for _ in 0..3 {
        log.extend(engine.tick(DT, &contact));
    }

    let blocked = log.iter().find_map(|ev| match ev {
        CombatEvent::Blocked {
            blocked_damage,
            damage_taken,
            ..
        } => Some((*blocked_damage, *damage_taken)),
        _ => None,
    });
    let (blocked_damage, damage_taken) = blocked.unwrap();
    assert!(approx(blocked_damage, 5.0));
    assert!(approx(damage_taken, 5.0));
    assert!(!systems::iframes::is_invincible(engine.world(), target));
}

#[test]
fn test_engine_stagger_interrupts_attack() {
    let (mut engine, attacker, target) = duel_engine(CombatConfig::default());
    engine
        .world_mut()
        .get::<&mut Hitboxes>(attacker)
        .unwrap()
        .boxes[0]
        .poise_damage = 200.0;
    let contact = [Contact::new(attacker, target, "weapon")];

    engine.start_attack(attacker, "jab").unwrap();
    engine.start_attack(target, "jab").unwrap();
    engine.tick(DT, &contact);
    let events = engine.tick(DT, &contact);

    assert!(events
        .iter()
        .any(|ev| matches!(ev, CombatEvent::Staggered { entity, .. } if *entity == target)));
    assert!(events.iter().any(|ev| matches!(
        ev,
        CombatEvent::AttackEnded { entity, was_canceled: true, .. } if *entity == target
    )));
    assert_eq!(engine.phase_of(target), AttackPhase::Canceled);
    assert_eq!(engine.phase_of(attacker), AttackPhase::Active);

    engine.tick(DT, &[]);
    assert_eq!(engine.phase_of(target), AttackPhase::None);
}

#[test]
fn test_engine_subscribers_see_events() {
    let (mut engine, attacker, target) = duel_engine(CombatConfig::default());
    let hits = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&hits);
    engine.subscribe(move |ev| {
        if matches!(ev, CombatEvent::AttackHit { .. }) {
            *counter.borrow_mut() += 1;
        }
    });

    engine.start_attack(attacker, "jab").unwrap();
    for _ in 0..4 {
        engine.tick(DT, &[Contact::new(attacker, target, "weapon")]);
    }
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn test_engine_determinism_same_seed() {
    let run = |seed: u64| -> Vec<String> {
        let (mut engine, attacker, target) = duel_engine(CombatConfig {
            seed,
            ..Default::default()
        });
        engine
            .world_mut()
            .get::<&mut Hitboxes>(attacker)
            .unwrap()
            .boxes[0]
            .critical_chance = 0.5;
        let contact = [Contact::new(attacker, target, "weapon")];

        let mut frames = Vec::new();
        for tick in 0..120 {
            if tick % 10 == 0 {
                let _ = engine.process_attack_input(attacker, "slash");
            }
            let events = engine.tick(DT, &contact);
            frames.push(serde_json::to_string(&events).unwrap());
        }
        frames
    };

    assert_eq!(run(12345), run(12345));
}

#[test]
fn test_engine_hit_starts_reaction() {
    let (mut engine, attacker, target) = duel_engine(CombatConfig::default());
    let contact = [Contact::new(attacker, target, "weapon")];

    engine.start_attack(attacker, "jab").unwrap();
    let mut log = Vec::new();
    for _ in 0..3 {
        log.extend(engine.tick(DT, &contact));
    }

    assert!(log.iter().any(|ev| matches!(
        ev,
        CombatEvent::HitReactionStarted { entity, reaction: HitReactionType::Medium, .. }
            if *entity == target
    )));
    assert_eq!(engine.current_reaction(target), HitReactionType::Medium);
    assert_eq!(engine.current_reaction(attacker), HitReactionType::None);
}

#[test]
fn test_engine_parried_hit_causes_no_reaction() {
    let (mut engine, attacker, target) = duel_engine(CombatConfig::default());
    engine
        .world_mut()
        .get::<&mut DamageReceiver>(target)
        .unwrap()
        .start_parry(5.0);
    let contact = [Contact::new(attacker, target, "weapon")];

    engine.start_attack(attacker, "jab").unwrap();
    let mut log = Vec::new();
    for _ in 0..3 {
        log.extend(engine.tick(DT, &contact));
    }

    assert_eq!(
        count(&log, |ev| matches!(ev, CombatEvent::Parried { .. })),
        1
    );
    assert_eq!(
        count(&log, |ev| matches!(ev, CombatEvent::HitReactionStarted { .. })),
        0
    );
}
