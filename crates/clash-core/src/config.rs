//! Runtime configuration for a combat session.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;

/// Knobs for starting a combat session. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    /// RNG seed for critical rolls. Same seed, same inputs = same fight.
    pub seed: u64,
    pub hitstop_enabled: bool,
    /// Global hitstop requested by every damaging hit.
    pub hit_hitstop_secs: f32,
    /// Combo window given to newly created attack states.
    pub combo_window_secs: f32,
    /// Grant hit i-frames to targets of unblocked damaging hits.
    pub hit_iframes: bool,
    /// A poise break cancels the victim's attack in flight.
    pub stagger_interrupts_attack: bool,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            hitstop_enabled: true,
            hit_hitstop_secs: DEFAULT_HIT_HITSTOP_SECS,
            combo_window_secs: DEFAULT_COMBO_WINDOW_SECS,
            hit_iframes: true,
            stagger_interrupts_attack: true,
        }
    }
}

impl CombatConfig {
    /// Parse and validate a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("hit_hitstop_secs", self.hit_hitstop_secs),
            ("combo_window_secs", self.combo_window_secs),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }
        Ok(())
    }
}
