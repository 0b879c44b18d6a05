//! Contact resolution: filters overlaps reported by the geometry layer and
//! runs the survivors through the damage pipeline.

use hecs::World;
use tracing::debug;

use clash_core::components::{Hitbox, Hitboxes, Hurtbox};
use clash_core::config::CombatConfig;
use clash_core::enums::IFrameSource;
use clash_core::events::CombatEvent;
use clash_core::types::{Contact, DamageInfo};

use crate::attacks::AttackPhaseManager;
use crate::damage::DamageResolver;
use crate::event_bus::EventBus;
use crate::hitstop::HitstopController;
use crate::systems::{hit_reaction, iframes};

/// Resolve contacts in the order given. Returns the hits that landed.
#[allow(clippy::too_many_arguments)]
pub fn resolve_contacts(
    world: &mut World,
    contacts: &[Contact],
    attacks: &AttackPhaseManager,
    resolver: &mut DamageResolver,
    hitstop: &mut HitstopController,
    config: &CombatConfig,
    events: &mut EventBus,
) -> Vec<DamageInfo> {
    let mut landed = Vec::new();

    for contact in contacts {
        let Some((hitbox, hurtbox)) = eligible(world, contact) else {
            continue;
        };

        if let Ok(mut hitboxes) = world.get::<&mut Hitboxes>(contact.attacker) {
            if let Some(live) = hitboxes.get_mut(&contact.hitbox_id) {
                live.already_hit.push(contact.target);
            }
        }
        events.emit(CombatEvent::AttackHit {
            attacker: contact.attacker,
            target: contact.target,
            hitbox_id: contact.hitbox_id.clone(),
        });

        let info = resolver.deal_damage(
            world,
            contact.attacker,
            contact.target,
            &hitbox,
            &hurtbox,
            contact.hit_point,
            contact.hit_normal,
        );
        events.emit(CombatEvent::DamageDealt { info: info.clone() });
        if !info.is_parried {
            hit_reaction::process_hit(world, &info, events);
        }

        if info.final_damage > 0.0 {
            if config.hit_iframes && !info.is_blocked {
                iframes::grant_default_iframes(world, contact.target, IFrameSource::Hit, events);
            }
            if hitstop.trigger(config.hit_hitstop_secs) {
                events.emit(CombatEvent::HitstopTriggered {
                    requested_secs: config.hit_hitstop_secs,
                    remaining_secs: hitstop.remaining(),
                });
            }
        }

        if info.is_parried {
            events.emit(CombatEvent::Parried {
                defender: contact.target,
                attacker: contact.attacker,
            });
        }
        if info.is_blocked {
            events.emit(CombatEvent::Blocked {
                defender: contact.target,
                attacker: contact.attacker,
                blocked_damage: info.blocked_damage(),
                damage_taken: info.final_damage,
            });
        }
        if info.caused_stagger {
            debug!(victim = ?contact.target, attacker = ?contact.attacker, "poise broken");
            events.emit(CombatEvent::Staggered {
                entity: contact.target,
                attacker: contact.attacker,
            });
            if config.stagger_interrupts_attack {
                attacks.cancel_attack(world, contact.target, events);
            }
        }

        landed.push(info);
    }

    landed
}

/// Copies of the hitbox and hurtbox when the contact should deal damage.
fn eligible(world: &World, contact: &Contact) -> Option<(Hitbox, Hurtbox)> {
    if contact.attacker == contact.target {
        return None;
    }

    let hitbox = {
        let hitboxes = world.get::<&Hitboxes>(contact.attacker).ok()?;
        let hitbox = hitboxes.get(&contact.hitbox_id)?;
        if !hitbox.active || hitbox.was_hit(contact.target) || hitbox.hit_limit_reached() {
            return None;
        }
        hitbox.clone()
    };

    let hurtbox = world.get::<&Hurtbox>(contact.target).ok()?;
    if !hurtbox.enabled || !hitbox.targets_faction(&hurtbox.faction) {
        return None;
    }
    if iframes::is_invincible(world, contact.target) {
        return None;
    }

    Some((hitbox, (*hurtbox).clone()))
}
