//! The ordered set of meal-type slots.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::{default_meal_types, MealTypeConfig};

/// Meal types in display order. Keys are unique and never removed; only the
/// `enabled` flag changes.
#[derive(Debug)]
pub struct MealTypeRegistry {
    types: Mutex<Vec<MealTypeConfig>>,
}

impl MealTypeRegistry {
    /// Builds a registry from `types`, keeping the first entry for a
    /// repeated key.
    pub fn new(types: Vec<MealTypeConfig>) -> Self {
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(types.len());
        for meal_type in types {
            if seen.insert(meal_type.key.clone()) {
                unique.push(meal_type);
            } else {
                tracing::warn!(key = %meal_type.key, "duplicate meal type ignored");
            }
        }

        Self {
            types: Mutex::new(unique),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_meal_types())
    }

    /// Builds the default registry and applies saved enabled flags.
    ///
    /// Saved entries for keys the registry does not know are ignored, so a
    /// stale settings file can never add or drop a slot.
    pub fn from_saved(saved: &[MealTypeConfig]) -> Self {
        let registry = Self::with_defaults();
        for entry in saved {
            registry.set_enabled(&entry.key, entry.enabled);
        }
        registry
    }

    pub fn list(&self) -> Vec<MealTypeConfig> {
        self.types().clone()
    }

    /// Every key, enabled or not, in order.
    pub fn keys(&self) -> Vec<String> {
        self.types().iter().map(|t| t.key.clone()).collect()
    }

    pub fn get(&self, key: &str) -> Option<MealTypeConfig> {
        self.types().iter().find(|t| t.key == key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.types().iter().any(|t| t.key == key)
    }

    pub fn label(&self, key: &str) -> Option<String> {
        self.get(key).map(|t| t.label)
    }

    /// Sets the enabled flag. Unknown keys are a no-op; returns whether the
    /// key was found.
    pub fn set_enabled(&self, key: &str, enabled: bool) -> bool {
        let mut types = self.types();
        match types.iter_mut().find(|t| t.key == key) {
            Some(meal_type) => {
                if meal_type.enabled != enabled {
                    tracing::debug!(key, enabled, "meal type toggled");
                }
                meal_type.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Keys currently shown. Only filters what is rendered or edited.
    pub fn enabled_keys(&self) -> HashSet<String> {
        self.types()
            .iter()
            .filter(|t| t.enabled)
            .map(|t| t.key.clone())
            .collect()
    }

    /// Enabled meal types in display order.
    pub fn enabled(&self) -> Vec<MealTypeConfig> {
        self.types().iter().filter(|t| t.enabled).cloned().collect()
    }

    fn types(&self) -> MutexGuard<'_, Vec<MealTypeConfig>> {
        self.types.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MealTypeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
