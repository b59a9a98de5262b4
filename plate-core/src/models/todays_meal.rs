use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::meal::MealDefinition;

/// One planned meal on today's list, with its eaten flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodaysMealItem {
    /// `<date>-<mealType>`, stable for the slot it came from
    pub id: String,
    pub meal_type: String,
    pub meal: MealDefinition,
    pub completed: bool,
}

impl TodaysMealItem {
    pub fn new(date: NaiveDate, meal_type: impl Into<String>, meal: MealDefinition) -> Self {
        let meal_type = meal_type.into();
        Self {
            id: Self::item_id(date, &meal_type),
            meal_type,
            meal,
            completed: false,
        }
    }

    pub fn item_id(date: NaiveDate, meal_type: &str) -> String {
        format!("{}-{}", date, meal_type)
    }
}

impl fmt::Display for TodaysMealItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.completed { "x" } else { " " };
        write!(f, "[{}] {:14} {}", mark, self.meal_type, self.meal)
    }
}

/// Completion state of a day as sent to (and read back from) the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub date: NaiveDate,
    pub items: Vec<TodaysMealItem>,
    pub total_calories: u32,
    pub saved_at: DateTime<Utc>,
}

impl CompletionRecord {
    pub fn is_completed(&self, item_id: &str) -> bool {
        self.items.iter().any(|i| i.id == item_id && i.completed)
    }
}
