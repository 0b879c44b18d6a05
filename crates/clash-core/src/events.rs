//! Events emitted by the combat runtime for gameplay, audio and UI.

use glam::Vec3;
use hecs::Entity;
use serde::{Deserialize, Serialize};

use crate::enums::{AttackPhase, HitReactionType, IFrameSource};
use crate::types::DamageInfo;

/// Everything observable that the combat runtime does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CombatEvent {
    /// An attack entered Startup.
    AttackStarted {
        entity: Entity,
        attack: String,
        combo_count: u32,
    },
    PhaseChanged {
        entity: Entity,
        old: AttackPhase,
        new: AttackPhase,
        attack: Option<String>,
    },
    AttackEnded {
        entity: Entity,
        attack: String,
        was_canceled: bool,
    },
    HitboxesActivated {
        entity: Entity,
        hitbox_ids: Vec<String>,
    },
    HitboxesDeactivated {
        entity: Entity,
        hitbox_ids: Vec<String>,
    },
    /// A combo input chained into the next attack.
    ComboChained {
        entity: Entity,
        from: String,
        to: String,
        combo_count: u32,
    },
    /// Attack input held in the single-slot buffer.
    InputBuffered { entity: Entity, attack: String },
    /// Buffered input outlived the combo window and was dropped.
    InputExpired { entity: Entity, attack: String },
    /// A hitbox connected with a hurtbox.
    AttackHit {
        attacker: Entity,
        target: Entity,
        hitbox_id: String,
    },
    DamageDealt { info: DamageInfo },
    Staggered { entity: Entity, attacker: Entity },
    Parried { defender: Entity, attacker: Entity },
    Blocked {
        defender: Entity,
        attacker: Entity,
        blocked_damage: f32,
        damage_taken: f32,
    },
    HitstopTriggered { requested_secs: f32, remaining_secs: f32 },
    IFramesStarted {
        entity: Entity,
        duration: f32,
        source: IFrameSource,
    },
    IFramesEnded { entity: Entity, source: IFrameSource },
    /// A hit made the entity flinch. `direction` points the way it is pushed.
    HitReactionStarted {
        entity: Entity,
        reaction: HitReactionType,
        direction: Vec3,
        damage_fraction: f32,
    },
    HitReactionEnded {
        entity: Entity,
        reaction: HitReactionType,
    },
}
