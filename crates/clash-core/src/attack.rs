//! Attack tuning data and the per-entity phase record.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_COMBO_WINDOW_SECS;
use crate::enums::AttackPhase;
use crate::error::DefinitionError;

/// Static tuning for one attack. Loaded from data or built in code.
///
/// Entities never hold a reference into the catalog: starting an attack
/// copies the definition into the entity's `AttackPhaseState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackDefinition {
    pub name: String,

    // --- Phase durations (seconds) ---
    pub startup_duration: f32,
    pub active_duration: f32,
    pub recovery_duration: f32,

    // --- Cancel policy ---
    pub can_cancel_startup: bool,
    /// Advisory for the movement layer; the phase machine does not read it.
    pub can_cancel_into_dodge: bool,
    pub can_cancel_into_attack: bool,
    /// Recovery progress (0-1) at which the cancel window opens.
    pub cancel_window_start: f32,
    /// Recovery progress (0-1) at which the cancel window closes.
    pub cancel_window_end: f32,

    // --- Combo ---
    /// Attack chained into when combo input lands. Empty means "repeat the
    /// pressed attack".
    pub next_combo_attack: String,
    pub combo_position: u32,
    pub max_combo_chain: u32,

    // --- Movement hints ---
    pub forward_movement: f32,
    pub root_motion: bool,
    pub can_rotate: bool,

    /// Hitboxes enabled during Active. Empty enables every hitbox.
    pub hitbox_ids: Vec<String>,

    pub animation_name: String,
    pub animation_speed: f32,
}

impl Default for AttackDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            startup_duration: 0.1,
            active_duration: 0.2,
            recovery_duration: 0.3,
            can_cancel_startup: true,
            can_cancel_into_dodge: true,
            can_cancel_into_attack: false,
            cancel_window_start: 0.5,
            cancel_window_end: 0.9,
            next_combo_attack: String::new(),
            combo_position: 0,
            max_combo_chain: 3,
            forward_movement: 0.0,
            root_motion: false,
            can_rotate: false,
            hitbox_ids: Vec::new(),
            animation_name: String::new(),
            animation_speed: 1.0,
        }
    }
}

impl AttackDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sum of the three phase durations.
    pub fn total_duration(&self) -> f32 {
        self.startup_duration + self.active_duration + self.recovery_duration
    }

    /// The combo follow-up, if one is authored.
    pub fn next_combo(&self) -> Option<&str> {
        if self.next_combo_attack.is_empty() {
            None
        } else {
            Some(&self.next_combo_attack)
        }
    }

    /// Content-load-time validation. The phase machine itself trusts its
    /// input and never calls this.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.name.is_empty() {
            return Err(DefinitionError::EmptyName);
        }
        for (field, value) in [
            ("startup_duration", self.startup_duration),
            ("active_duration", self.active_duration),
            ("recovery_duration", self.recovery_duration),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(DefinitionError::NegativeDuration { field, value });
            }
        }
        for (field, value) in [
            ("cancel_window_start", self.cancel_window_start),
            ("cancel_window_end", self.cancel_window_end),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(DefinitionError::WindowOutOfRange { field, value });
            }
        }
        if self.cancel_window_start > self.cancel_window_end {
            return Err(DefinitionError::WindowInverted {
                start: self.cancel_window_start,
                end: self.cancel_window_end,
            });
        }
        if self.max_combo_chain == 0 {
            return Err(DefinitionError::ZeroComboChain);
        }
        Ok(())
    }
}

/// Mutable attack record, one per attacking entity (hecs component).
///
/// Created lazily the first time an entity attacks and reset with
/// `clear()`; it lives as long as the entity does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackPhaseState {
    pub phase: AttackPhase,
    /// Seconds spent in the current phase.
    pub phase_time: f32,
    /// Seconds allotted to the current phase.
    pub phase_duration: f32,

    pub current_attack: Option<String>,
    /// Snapshot of the running attack's definition.
    pub attack_def: AttackDefinition,

    pub combo_count: u32,
    /// Seconds left before buffered input expires / the combo window closes.
    pub combo_window_timer: f32,
    pub combo_window_duration: f32,
    /// Single-slot input buffer.
    pub queued_attack: Option<String>,

    /// Per-entity freeze, separate from the global hitstop.
    pub hitstop_remaining: f32,
}

impl Default for AttackPhaseState {
    fn default() -> Self {
        Self {
            phase: AttackPhase::None,
            phase_time: 0.0,
            phase_duration: 0.0,
            current_attack: None,
            attack_def: AttackDefinition::default(),
            combo_count: 0,
            combo_window_timer: 0.0,
            combo_window_duration: DEFAULT_COMBO_WINDOW_SECS,
            queued_attack: None,
            hitstop_remaining: 0.0,
        }
    }
}

impl AttackPhaseState {
    pub fn with_combo_window(combo_window_duration: f32) -> Self {
        Self {
            combo_window_duration,
            ..Default::default()
        }
    }

    pub fn is_attacking(&self) -> bool {
        !matches!(self.phase, AttackPhase::None | AttackPhase::Canceled)
    }

    pub fn is_in_startup(&self) -> bool {
        self.phase == AttackPhase::Startup
    }

    pub fn is_in_active(&self) -> bool {
        self.phase == AttackPhase::Active
    }

    pub fn is_in_recovery(&self) -> bool {
        self.phase == AttackPhase::Recovery
    }

    /// Normalized progress through the current phase, in [0, 1].
    /// A phase with no duration counts as complete.
    pub fn get_phase_progress(&self) -> f32 {
        if self.phase_duration <= 0.0 {
            return 1.0;
        }
        (self.phase_time / self.phase_duration).clamp(0.0, 1.0)
    }

    /// Progress across startup, active and recovery combined.
    pub fn get_total_progress(&self) -> f32 {
        if !self.is_attacking() {
            return 0.0;
        }
        let def = &self.attack_def;
        let total = def.total_duration();
        if total <= 0.0 {
            return 0.0;
        }

        let elapsed = match self.phase {
            AttackPhase::Startup => self.phase_time,
            AttackPhase::Active => def.startup_duration + self.phase_time,
            AttackPhase::Recovery => def.startup_duration + def.active_duration + self.phase_time,
            AttackPhase::None | AttackPhase::Canceled => 0.0,
        };
        elapsed / total
    }

    pub fn can_cancel(&self) -> bool {
        match self.phase {
            AttackPhase::Startup => self.attack_def.can_cancel_startup,
            AttackPhase::Recovery => {
                let progress = self.get_phase_progress();
                progress >= self.attack_def.cancel_window_start
                    && progress <= self.attack_def.cancel_window_end
            }
            _ => false,
        }
    }

    pub fn can_combo(&self) -> bool {
        if !self.attack_def.can_cancel_into_attack {
            return false;
        }
        if self.combo_count >= self.attack_def.max_combo_chain {
            return false;
        }
        self.can_cancel()
            || (self.phase == AttackPhase::Recovery && self.combo_window_timer > 0.0)
    }

    /// Buffer a follow-up input, replacing any earlier one.
    pub fn queue_attack(&mut self, attack_name: impl Into<String>) {
        self.queued_attack = Some(attack_name.into());
    }

    /// Return to `None`. Combo count and window duration survive so a
    /// chain can be inspected after it ends.
    pub fn clear(&mut self) {
        self.phase = AttackPhase::None;
        self.phase_time = 0.0;
        self.phase_duration = 0.0;
        self.current_attack = None;
        self.queued_attack = None;
        self.attack_def = AttackDefinition::default();
    }
}
