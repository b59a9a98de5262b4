use serde::{Deserialize, Serialize};
use std::fmt;

/// A meal-type slot in the planner (breakfast, lunch, ...).
///
/// The `enabled` flag only controls visibility. A disabled meal type keeps
/// its cells in every [`DaySlots`](super::DaySlots).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealTypeConfig {
    pub key: String,
    pub label: String,
    pub enabled: bool,
}

impl MealTypeConfig {
    pub fn new(key: impl Into<String>, label: impl Into<String>, enabled: bool) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            enabled,
        }
    }
}

impl fmt::Display for MealTypeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// The built-in meal types, in display order.
pub fn default_meal_types() -> Vec<MealTypeConfig> {
    vec![
        MealTypeConfig::new("breakfast", "Breakfast", true),
        MealTypeConfig::new("brunch", "Brunch", true),
        MealTypeConfig::new("elevenses", "Elevenses", false),
        MealTypeConfig::new("lunch", "Lunch", true),
        MealTypeConfig::new("afternoonTea", "Afternoon Tea", false),
        MealTypeConfig::new("highTea", "High Tea", false),
        MealTypeConfig::new("dinner", "Dinner", true),
        MealTypeConfig::new("supper", "Supper", false),
        MealTypeConfig::new("midnightSnack", "Midnight Snack", false),
    ]
}
