use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a meal definition, unique within a meal-type bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MealId(pub u64);

impl fmt::Display for MealId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A selectable meal: a name and its calorie count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealDefinition {
    pub id: MealId,
    pub name: String,
    pub calories: u32,
    /// True for meals created by the user rather than seeded.
    #[serde(default)]
    pub is_custom: bool,
}

impl MealDefinition {
    /// Creates a built-in meal definition.
    pub fn new(id: u64, name: impl Into<String>, calories: u32) -> Self {
        Self {
            id: MealId(id),
            name: name.into(),
            calories,
            is_custom: false,
        }
    }

    /// Creates a user-defined meal definition.
    pub fn custom(id: u64, name: impl Into<String>, calories: u32) -> Self {
        Self {
            is_custom: true,
            ..Self::new(id, name, calories)
        }
    }
}

impl fmt::Display for MealDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} cal)", self.name, self.calories)?;
        if self.is_custom {
            write!(f, " [custom]")?;
        }
        Ok(())
    }
}
