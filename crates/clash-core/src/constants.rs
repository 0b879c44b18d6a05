//! Combat constants and tuning parameters.

/// Default RNG seed for critical rolls.
pub const DEFAULT_SEED: u64 = 42;

// --- Damage resolution ---

/// Poise damage multiplier applied to blocked hits.
pub const BLOCK_POISE_FACTOR: f32 = 0.5;

/// Knockback multiplier applied to blocked hits.
pub const BLOCK_KNOCKBACK_FACTOR: f32 = 0.3;

/// Backstab cone threshold in degrees. Fixed: the receiver's own
/// `backstab_angle_threshold` is not consulted.
pub const BACKSTAB_ANGLE_THRESHOLD_DEG: f32 = 60.0;

// --- Timing ---

/// Global hitstop triggered by a damaging hit (seconds).
pub const DEFAULT_HIT_HITSTOP_SECS: f32 = 0.05;

/// Combo window armed on entering Recovery or buffering input (seconds).
pub const DEFAULT_COMBO_WINDOW_SECS: f32 = 0.5;

// --- Invincibility frames ---

pub const IFRAME_DODGE_SECS: f32 = 0.4;
pub const IFRAME_HIT_SECS: f32 = 0.5;
pub const IFRAME_SPAWN_SECS: f32 = 2.0;

/// Used by sources without a dedicated default.
pub const IFRAME_FALLBACK_SECS: f32 = 0.3;

// --- Receivers ---

pub const DEFAULT_MAX_POISE: f32 = 100.0;
pub const DEFAULT_POISE_RECOVERY_RATE: f32 = 20.0;
pub const DEFAULT_POISE_RECOVERY_DELAY_SECS: f32 = 2.0;

// --- Hit reactions ---

/// Damage fraction assumed when the target has no health reference.
pub const DEFAULT_HIT_DAMAGE_FRACTION: f32 = 0.1;

/// Damage fractions at which reactions escalate to Medium, Heavy, Stagger.
pub const REACTION_LIGHT_THRESHOLD: f32 = 0.1;
pub const REACTION_MEDIUM_THRESHOLD: f32 = 0.25;
pub const REACTION_HEAVY_THRESHOLD: f32 = 0.5;

pub const REACTION_LIGHT_SECS: f32 = 0.2;
pub const REACTION_MEDIUM_SECS: f32 = 0.4;
pub const REACTION_HEAVY_SECS: f32 = 0.6;
pub const REACTION_STAGGER_SECS: f32 = 1.0;

/// Minimum gap between two reactions (seconds).
pub const REACTION_COOLDOWN_SECS: f32 = 0.1;
