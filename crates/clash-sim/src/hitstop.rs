//! Global hitstop: a short, shared freeze of gameplay time on heavy hits.

use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitstopController {
    remaining: f32,
    enabled: bool,
}

impl Default for HitstopController {
    fn default() -> Self {
        Self {
            remaining: 0.0,
            enabled: true,
        }
    }
}

impl HitstopController {
    pub fn new(enabled: bool) -> Self {
        Self {
            remaining: 0.0,
            enabled,
        }
    }

    /// Request a freeze of `duration` seconds. Saturating: a shorter request
    /// never extends or shortens a longer freeze in progress. Returns false
    /// when disabled.
    pub fn trigger(&mut self, duration: f32) -> bool {
        if !self.enabled {
            return false;
        }
        if duration > self.remaining {
            debug!(duration, previous = self.remaining, "hitstop triggered");
            self.remaining = duration;
        }
        true
    }

    pub fn update(&mut self, dt: f32) {
        self.remaining = (self.remaining - dt).max(0.0);
    }

    /// 0 while frozen, 1 otherwise. Multiply gameplay `dt` by this.
    pub fn time_scale(&self) -> f32 {
        if self.remaining > 0.0 {
            0.0
        } else {
            1.0
        }
    }

    /// Disabling also drops any freeze in progress.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.remaining = 0.0;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    pub fn is_active(&self) -> bool {
        self.remaining > 0.0
    }

    pub fn reset(&mut self) {
        self.remaining = 0.0;
    }
}
