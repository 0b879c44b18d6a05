//! ECS components for hecs entities.
//!
//! Components carry their own small bookkeeping helpers (hit lists, poise
//! arithmetic, i-frame timers). Cross-entity logic lives in the systems.

use glam::{Mat4, Quat, Vec3};
use hecs::Entity;
use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::enums::{DamageType, HitReactionType, HurtboxKind, IFrameSource};

// ---- Transforms ----

/// Transform relative to the parent, as authored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl LocalTransform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Facing direction. Forward is -Z.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }
}

/// Resolved world-space matrix, written by the scene hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldTransform {
    pub matrix: Mat4,
}

impl Default for WorldTransform {
    fn default() -> Self {
        Self {
            matrix: Mat4::IDENTITY,
        }
    }
}

impl WorldTransform {
    pub fn from_rotation_translation(rotation: Quat, translation: Vec3) -> Self {
        Self {
            matrix: Mat4::from_rotation_translation(rotation, translation),
        }
    }

    pub fn position(&self) -> Vec3 {
        self.matrix.w_axis.truncate()
    }

    /// Negated Z basis vector.
    pub fn forward(&self) -> Vec3 {
        (-self.matrix.z_axis.truncate())
            .try_normalize()
            .unwrap_or(Vec3::NEG_Z)
    }
}

// ---- Hitboxes ----

/// One attacker-owned damage volume. Geometry lives with the overlap
/// detector; this carries only what damage resolution needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hitbox {
    pub id: String,
    pub active: bool,

    pub base_damage: f32,
    pub damage_type: DamageType,
    pub knockback_force: f32,
    /// Local-space direction, rotated into world space by the attacker.
    pub knockback_direction: Vec3,
    pub poise_damage: f32,
    pub critical_multiplier: f32,
    /// Probability in [0, 1].
    pub critical_chance: f32,

    /// Targets struck since the last activation.
    #[serde(skip)]
    pub already_hit: Vec<Entity>,
    /// `None` means unlimited.
    pub max_hits: Option<u32>,

    pub faction: String,
    pub target_factions: Vec<String>,
}

impl Default for Hitbox {
    fn default() -> Self {
        Self {
            id: String::new(),
            active: false,
            base_damage: 10.0,
            damage_type: DamageType::Physical,
            knockback_force: 5.0,
            knockback_direction: Vec3::Z,
            poise_damage: 10.0,
            critical_multiplier: 1.5,
            critical_chance: 0.0,
            already_hit: Vec::new(),
            max_hits: None,
            faction: "player".to_string(),
            target_factions: vec!["enemy".to_string()],
        }
    }
}

impl Hitbox {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Go live. Each activation may hit every target once again.
    pub fn activate(&mut self) {
        self.active = true;
        self.already_hit.clear();
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn was_hit(&self, entity: Entity) -> bool {
        self.already_hit.contains(&entity)
    }

    pub fn clear_hit_list(&mut self) {
        self.already_hit.clear();
    }

    pub fn hit_limit_reached(&self) -> bool {
        self.max_hits
            .is_some_and(|max| self.already_hit.len() >= max as usize)
    }

    pub fn targets_faction(&self, faction: &str) -> bool {
        self.target_factions.iter().any(|f| f == faction)
    }
}

/// All hitboxes an entity owns (fists, weapon edge, weapon tip, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hitboxes {
    pub boxes: Vec<Hitbox>,
}

impl Hitboxes {
    pub fn new(boxes: Vec<Hitbox>) -> Self {
        Self { boxes }
    }

    pub fn get(&self, id: &str) -> Option<&Hitbox> {
        self.boxes.iter().find(|b| b.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Hitbox> {
        self.boxes.iter_mut().find(|b| b.id == id)
    }

    /// Activate the listed hitboxes, or all of them when `ids` is empty.
    /// Returns the ids that went live.
    pub fn activate_matching(&mut self, ids: &[String]) -> Vec<String> {
        let mut activated = Vec::new();
        for hitbox in &mut self.boxes {
            if ids.is_empty() || ids.contains(&hitbox.id) {
                hitbox.activate();
                activated.push(hitbox.id.clone());
            }
        }
        activated
    }

    /// Deactivate everything. Returns the ids that were live.
    pub fn deactivate_all(&mut self) -> Vec<String> {
        let mut deactivated = Vec::new();
        for hitbox in &mut self.boxes {
            if hitbox.active {
                hitbox.deactivate();
                deactivated.push(hitbox.id.clone());
            }
        }
        deactivated
    }

    pub fn any_active(&self) -> bool {
        self.boxes.iter().any(|b| b.active)
    }
}

// ---- Hurtboxes ----

/// Target-owned volume that receives hits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hurtbox {
    pub enabled: bool,
    pub kind: HurtboxKind,
    pub damage_multiplier: f32,
    pub poise_multiplier: f32,

    // Resistances in [0, 1]; 1 negates the type entirely.
    pub physical_resistance: f32,
    pub fire_resistance: f32,
    pub ice_resistance: f32,
    pub lightning_resistance: f32,

    pub faction: String,
}

impl Default for Hurtbox {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: HurtboxKind::Body,
            damage_multiplier: 1.0,
            poise_multiplier: 1.0,
            physical_resistance: 0.0,
            fire_resistance: 0.0,
            ice_resistance: 0.0,
            lightning_resistance: 0.0,
            faction: "enemy".to_string(),
        }
    }
}

impl Hurtbox {
    pub fn resistance(&self, damage_type: DamageType) -> f32 {
        match damage_type {
            DamageType::Physical => self.physical_resistance,
            DamageType::Fire => self.fire_resistance,
            DamageType::Ice => self.ice_resistance,
            DamageType::Lightning => self.lightning_resistance,
        }
    }
}

// ---- Receivers ----

/// Defensive state and poise of an entity that can be damaged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageReceiver {
    pub can_receive_damage: bool,

    // --- Poise ---
    pub max_poise: f32,
    pub current_poise: f32,
    /// Poise regained per second once the delay has elapsed.
    pub poise_recovery_rate: f32,
    pub poise_recovery_delay: f32,
    pub time_since_hit: f32,

    // --- Defense ---
    pub is_blocking: bool,
    pub is_parrying: bool,
    /// Fraction of damage removed by a block, in [0, 1].
    pub block_damage_reduction: f32,
    /// Seconds left in the active parry window.
    pub parry_window: f32,

    // --- Backstab ---
    pub backstab_vulnerable: bool,
    pub backstab_multiplier: f32,
    /// Authored per receiver but not read by damage resolution, which
    /// always uses `BACKSTAB_ANGLE_THRESHOLD_DEG`.
    pub backstab_angle_threshold: f32,
}

impl Default for DamageReceiver {
    fn default() -> Self {
        Self {
            can_receive_damage: true,
            max_poise: DEFAULT_MAX_POISE,
            current_poise: DEFAULT_MAX_POISE,
            poise_recovery_rate: DEFAULT_POISE_RECOVERY_RATE,
            poise_recovery_delay: DEFAULT_POISE_RECOVERY_DELAY_SECS,
            time_since_hit: 0.0,
            is_blocking: false,
            is_parrying: false,
            block_damage_reduction: 0.5,
            parry_window: 0.0,
            backstab_vulnerable: true,
            backstab_multiplier: 2.0,
            backstab_angle_threshold: BACKSTAB_ANGLE_THRESHOLD_DEG,
        }
    }
}

impl DamageReceiver {
    /// Subtract poise. Returns true when this hit broke poise (stagger).
    pub fn apply_poise_damage(&mut self, amount: f32) -> bool {
        self.current_poise -= amount;
        self.time_since_hit = 0.0;
        if self.current_poise <= 0.0 {
            self.current_poise = 0.0;
            return true;
        }
        false
    }

    pub fn recover_poise(&mut self, dt: f32) {
        if self.time_since_hit >= self.poise_recovery_delay {
            self.current_poise =
                (self.current_poise + self.poise_recovery_rate * dt).min(self.max_poise);
        }
        self.time_since_hit += dt;
    }

    /// Refill poise and allow recovery to start immediately.
    pub fn reset_poise(&mut self) {
        self.current_poise = self.max_poise;
        self.time_since_hit = self.poise_recovery_delay;
    }

    pub fn is_staggered(&self) -> bool {
        self.current_poise <= 0.0
    }

    /// Open a parry window of `duration` seconds.
    pub fn start_parry(&mut self, duration: f32) {
        self.is_parrying = true;
        self.parry_window = duration;
    }
}

// ---- Invincibility ----

/// Invincibility frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IFrames {
    pub is_invincible: bool,
    pub remaining: f32,
    pub source: IFrameSource,
}

impl IFrames {
    pub fn default_duration(source: IFrameSource) -> f32 {
        match source {
            IFrameSource::Dodge => IFRAME_DODGE_SECS,
            IFrameSource::Hit => IFRAME_HIT_SECS,
            IFrameSource::Spawn => IFRAME_SPAWN_SECS,
            IFrameSource::Attack | IFrameSource::Skill | IFrameSource::Custom => {
                IFRAME_FALLBACK_SECS
            }
        }
    }

    /// Grant invincibility. A shorter grant than what remains is ignored
    /// and does not change the source.
    pub fn grant(&mut self, duration: f32, source: IFrameSource) {
        if self.is_invincible && duration <= self.remaining {
            return;
        }
        self.is_invincible = true;
        self.remaining = duration;
        self.source = source;
    }

    pub fn grant_default(&mut self, source: IFrameSource) {
        self.grant(Self::default_duration(source), source);
    }

    /// Returns true on the tick invincibility ends.
    pub fn update(&mut self, dt: f32) -> bool {
        if !self.is_invincible {
            return false;
        }
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            self.cancel();
            return true;
        }
        false
    }

    pub fn cancel(&mut self) {
        self.is_invincible = false;
        self.remaining = 0.0;
    }
}

// ---- Hit reactions ----

/// Thresholds and durations for hit reactions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitReactionConfig {
    pub light_threshold: f32,
    pub medium_threshold: f32,
    pub heavy_threshold: f32,
    pub light_duration: f32,
    pub medium_duration: f32,
    pub heavy_duration: f32,
    pub stagger_duration: f32,
    /// Seconds after a reaction starts during which new hits cause none.
    pub cooldown: f32,
}

impl Default for HitReactionConfig {
    fn default() -> Self {
        Self {
            light_threshold: REACTION_LIGHT_THRESHOLD,
            medium_threshold: REACTION_MEDIUM_THRESHOLD,
            heavy_threshold: REACTION_HEAVY_THRESHOLD,
            light_duration: REACTION_LIGHT_SECS,
            medium_duration: REACTION_MEDIUM_SECS,
            heavy_duration: REACTION_HEAVY_SECS,
            stagger_duration: REACTION_STAGGER_SECS,
            cooldown: REACTION_COOLDOWN_SECS,
        }
    }
}

/// Flinch state of an entity that reacts to being hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitReaction {
    pub config: HitReactionConfig,
    /// Health the damage fraction is measured against. Without one every
    /// hit counts as `DEFAULT_HIT_DAMAGE_FRACTION`.
    pub max_health: Option<f32>,
    pub is_reacting: bool,
    pub current: HitReactionType,
    pub timer: f32,
    pub cooldown_remaining: f32,
    /// Each stack makes reactions one level lighter.
    pub super_armor_stacks: u32,
    pub hit_direction: Vec3,
}

impl Default for HitReaction {
    fn default() -> Self {
        Self {
            config: HitReactionConfig::default(),
            max_health: None,
            is_reacting: false,
            current: HitReactionType::None,
            timer: 0.0,
            cooldown_remaining: 0.0,
            super_armor_stacks: 0,
            hit_direction: Vec3::ZERO,
        }
    }
}

impl HitReaction {
    pub fn damage_fraction(&self, damage: f32) -> f32 {
        match self.max_health {
            Some(max) if max > 0.0 => damage / max,
            _ => DEFAULT_HIT_DAMAGE_FRACTION,
        }
    }

    /// Reaction for a hit of `damage_fraction`, after super armor.
    pub fn determine_type(&self, damage_fraction: f32) -> HitReactionType {
        let config = &self.config;
        let mut kind = if damage_fraction >= config.heavy_threshold {
            HitReactionType::Stagger
        } else if damage_fraction >= config.medium_threshold {
            HitReactionType::Heavy
        } else if damage_fraction >= config.light_threshold {
            HitReactionType::Medium
        } else {
            HitReactionType::Light
        };
        for _ in 0..self.super_armor_stacks {
            if kind == HitReactionType::None {
                break;
            }
            kind = kind.step_down();
        }
        kind
    }

    pub fn duration(&self, kind: HitReactionType) -> f32 {
        match kind {
            HitReactionType::None => 0.0,
            HitReactionType::Light => self.config.light_duration,
            HitReactionType::Medium => self.config.medium_duration,
            HitReactionType::Heavy => self.config.heavy_duration,
            HitReactionType::Stagger => self.config.stagger_duration,
        }
    }

    pub fn start(&mut self, kind: HitReactionType, direction: Vec3) {
        self.is_reacting = true;
        self.current = kind;
        self.timer = self.duration(kind);
        self.cooldown_remaining = self.config.cooldown;
        self.hit_direction = direction;
    }

    pub fn end(&mut self) {
        self.is_reacting = false;
        self.current = HitReactionType::None;
        self.timer = 0.0;
    }

    /// Tick timers. Returns the reaction that ended this tick, if any.
    pub fn update(&mut self, dt: f32) -> Option<HitReactionType> {
        if self.cooldown_remaining > 0.0 {
            self.cooldown_remaining = (self.cooldown_remaining - dt).max(0.0);
        }
        if !self.is_reacting {
            return None;
        }
        self.timer -= dt;
        if self.timer <= 0.0 {
            let ended = self.current;
            self.end();
            return Some(ended);
        }
        None
    }

    /// Fraction of the current reaction played, 0 when idle.
    pub fn progress(&self) -> f32 {
        let duration = self.duration(self.current);
        if !self.is_reacting || duration <= 0.0 {
            return 0.0;
        }
        1.0 - self.timer / duration
    }

    pub fn add_super_armor(&mut self, stacks: u32) {
        self.super_armor_stacks = self.super_armor_stacks.saturating_add(stacks);
    }

    pub fn remove_super_armor(&mut self, stacks: u32) {
        self.super_armor_stacks = self.super_armor_stacks.saturating_sub(stacks);
    }

    pub fn clear_super_armor(&mut self) {
        self.super_armor_stacks = 0;
    }
}
