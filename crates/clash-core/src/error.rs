//! Error types for the combat runtime.
//!
//! Nothing on the per-tick path returns an error: missing components fall
//! back to defaults. Errors are reserved for caller-facing requests that
//! can be refused (starting an attack) and for loading content.

use thiserror::Error;

use crate::enums::AttackPhase;

/// Why `start_attack` refused to start. State is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttackError {
    #[error("attack not registered: {0}")]
    UnknownAttack(String),

    #[error("attack {attack} cannot be canceled during {phase:?}")]
    NotCancelable { attack: String, phase: AttackPhase },

    #[error("entity does not exist")]
    NoSuchEntity,
}

/// Authoring mistakes in an `AttackDefinition`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DefinitionError {
    #[error("attack name is empty")]
    EmptyName,

    #[error("{field} must be >= 0, got {value}")]
    NegativeDuration { field: &'static str, value: f32 },

    #[error("cancel window bound {field} must lie in [0, 1], got {value}")]
    WindowOutOfRange { field: &'static str, value: f32 },

    #[error("cancel window start {start} is after end {end}")]
    WindowInverted { start: f32, end: f32 },

    #[error("max_combo_chain must be at least 1")]
    ZeroComboChain,
}

/// Failure to load an attack catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("malformed attack catalog: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid attack {name}: {source}")]
    Invalid {
        name: String,
        #[source]
        source: DefinitionError,
    },
}

/// Failure to load or validate a `CombatConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed combat config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{field} must be >= 0, got {value}")]
    Negative { field: &'static str, value: f32 },
}
