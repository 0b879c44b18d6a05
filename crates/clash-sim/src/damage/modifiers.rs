//! Ordered chain of named damage modifiers.

use std::fmt;

use tracing::debug;

use clash_core::types::DamageInfo;

/// A modifier may read and rewrite any field of the hit in progress.
pub type DamageModifierFn = Box<dyn Fn(&mut DamageInfo) + Send + Sync>;

struct DamageModifier {
    name: String,
    priority: i32,
    apply: DamageModifierFn,
}

/// Modifiers run highest priority first. Equal priorities keep insertion
/// order. Each modifier sees every earlier modifier's changes; nothing
/// isolates them from each other.
#[derive(Default)]
pub struct DamageModifierChain {
    modifiers: Vec<DamageModifier>,
}

impl fmt::Debug for DamageModifierChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.modifiers.iter().map(|m| (&m.name, m.priority)))
            .finish()
    }
}

impl DamageModifierChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a modifier, replacing any existing one with the same name.
    pub fn add<F>(&mut self, name: impl Into<String>, modifier: F, priority: i32)
    where
        F: Fn(&mut DamageInfo) + Send + Sync + 'static,
    {
        let name = name.into();
        self.modifiers.retain(|m| m.name != name);
        debug!(modifier = %name, priority, "damage modifier added");
        self.modifiers.push(DamageModifier {
            name,
            priority,
            apply: Box::new(modifier),
        });
        // Stable sort keeps insertion order among equal priorities.
        self.modifiers.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.modifiers.len();
        self.modifiers.retain(|m| m.name != name);
        let removed = self.modifiers.len() != before;
        if removed {
            debug!(modifier = name, "damage modifier removed");
        }
        removed
    }

    pub fn clear(&mut self) {
        self.modifiers.clear();
    }

    pub fn apply(&self, info: &mut DamageInfo) {
        for modifier in &self.modifiers {
            (modifier.apply)(info);
        }
    }

    pub fn len(&self) -> usize {
        self.modifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modifiers.iter().any(|m| m.name == name)
    }

    /// Names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.modifiers.iter().map(|m| m.name.as_str()).collect()
    }
}
