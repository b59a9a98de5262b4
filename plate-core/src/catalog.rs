//! Selectable meals per meal type.
//!
//! The catalog is seeded once from a flat JSON list and then only grows:
//! custom meals are appended, nothing is edited or removed.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::ValidationError;
use crate::models::{MealDefinition, MealId};

/// The catalog shipped with the crate.
const SEED_CATALOG: &str = include_str!("../data/meals.json");

/// One entry of a seed file.
#[derive(Debug, Deserialize)]
struct SeedMeal {
    id: u64,
    meal_name: String,
    meal_type: String,
    calories: u32,
}

#[derive(Debug)]
pub struct MealCatalog {
    state: Mutex<CatalogState>,
}

#[derive(Debug)]
struct CatalogState {
    options: HashMap<String, Vec<MealDefinition>>,
    /// Next id handed to a custom meal; always above every known id.
    /// `None` once a known id is `u64::MAX`.
    next_id: Option<u64>,
}

impl MealCatalog {
    pub fn new(options: HashMap<String, Vec<MealDefinition>>) -> Self {
        let next_id = options
            .values()
            .flatten()
            .map(|m| m.id.0)
            .max()
            .map_or(Some(1), |max| max.checked_add(1));

        Self {
            state: Mutex::new(CatalogState { options, next_id }),
        }
    }

    pub fn empty() -> Self {
        Self::new(HashMap::new())
    }

    /// Parses a seed document: a JSON list of
    /// `{id, meal_name, meal_type, calories}`, grouped here by meal type.
    pub fn from_seed_json(json: &str) -> Result<Self, serde_json::Error> {
        let seed: Vec<SeedMeal> = serde_json::from_str(json)?;

        let mut options: HashMap<String, Vec<MealDefinition>> = HashMap::new();
        for entry in seed {
            options
                .entry(entry.meal_type)
                .or_default()
                .push(MealDefinition::new(entry.id, entry.meal_name, entry.calories));
        }
        Ok(Self::new(options))
    }

    /// The embedded seed catalog.
    pub fn with_defaults() -> Self {
        match Self::from_seed_json(SEED_CATALOG) {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::error!("embedded meal catalog is invalid: {}", e);
                Self::empty()
            }
        }
    }

    /// Meals for a meal type; empty for unknown keys.
    pub fn options_for(&self, meal_type: &str) -> Vec<MealDefinition> {
        self.state()
            .options
            .get(meal_type)
            .cloned()
            .unwrap_or_default()
    }

    pub fn find(&self, meal_type: &str, id: MealId) -> Option<MealDefinition> {
        self.state()
            .options
            .get(meal_type)
            .and_then(|meals| meals.iter().find(|m| m.id == id))
            .cloned()
    }

    /// Looks a meal up by exact name, ignoring case.
    pub fn find_by_name(&self, meal_type: &str, name: &str) -> Option<MealDefinition> {
        let name = name.trim().to_lowercase();
        self.state()
            .options
            .get(meal_type)
            .and_then(|meals| meals.iter().find(|m| m.name.to_lowercase() == name))
            .cloned()
    }

    /// Case-insensitive substring match on the name. A blank term matches
    /// everything.
    pub fn search(&self, meal_type: &str, term: &str) -> Vec<MealDefinition> {
        let term = term.trim().to_lowercase();
        self.options_for(meal_type)
            .into_iter()
            .filter(|m| term.is_empty() || m.name.to_lowercase().contains(&term))
            .collect()
    }

    /// Appends a user-defined meal and returns it.
    pub fn add_custom(
        &self,
        meal_type: &str,
        name: &str,
        calories: u32,
    ) -> Result<MealDefinition, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyMealName);
        }

        let mut state = self.state();
        let Some(id) = state.next_id else {
            tracing::warn!(meal_type, "no custom meal ids left");
            return Err(ValidationError::MealIdsExhausted);
        };
        let meal = MealDefinition::custom(id, name, calories);
        state.next_id = id.checked_add(1);
        state
            .options
            .entry(meal_type.to_string())
            .or_default()
            .push(meal.clone());

        tracing::debug!(meal_type, id = %meal.id, name, "custom meal added");
        Ok(meal)
    }

    /// All custom meals, grouped by meal type.
    pub fn custom_meals(&self) -> BTreeMap<String, Vec<MealDefinition>> {
        self.state()
            .options
            .iter()
            .map(|(key, meals)| {
                let custom: Vec<_> = meals.iter().filter(|m| m.is_custom).cloned().collect();
                (key.clone(), custom)
            })
            .filter(|(_, meals)| !meals.is_empty())
            .collect()
    }

    /// Re-adds previously exported custom meals. Ids already present in a
    /// bucket are skipped.
    pub fn restore_custom(&self, custom: BTreeMap<String, Vec<MealDefinition>>) {
        let mut state = self.state();
        for (meal_type, meals) in custom {
            for mut meal in meals {
                meal.is_custom = true;
                state.next_id = match state.next_id {
                    Some(next) if meal.id.0 < next => Some(next),
                    Some(_) => meal.id.0.checked_add(1),
                    None => None,
                };

                let bucket = state.options.entry(meal_type.clone()).or_default();
                if !bucket.iter().any(|m| m.id == meal.id) {
                    bucket.push(meal);
                }
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MealCatalog {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Parses user-entered calories: a whole number, zero or more.
pub fn parse_calories(input: &str) -> Result<u32, ValidationError> {
    input
        .trim()
        .parse::<u32>()
        .map_err(|_| ValidationError::InvalidCalories(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_group_by_meal_type() {
        let catalog = MealCatalog::with_defaults();

        let breakfast = catalog.options_for("breakfast");
        assert!(!breakfast.is_empty());
        assert!(breakfast.iter().all(|m| !m.is_custom));
        assert!(catalog
            .options_for("dinner")
            .iter()
            .any(|m| m.name == "Grilled Salmon with Rice" && m.calories == 520));
    }

    #[test]
    fn test_options_for_unknown_key_is_empty() {
        let catalog = MealCatalog::with_defaults();
        assert!(catalog.options_for("second-breakfast").is_empty());
    }

    #[test]
    fn test_add_custom_then_listed() {
        let catalog = MealCatalog::with_defaults();
        let calories = parse_calories("600").unwrap();

        let meal = catalog.add_custom("dinner", "Stir Fry", calories).unwrap();
        assert_eq!(meal.calories, 600);
        assert!(meal.is_custom);
        assert!(catalog.options_for("dinner").contains(&meal));
    }

    #[test]
    fn test_add_custom_trims_and_rejects_blank_name() {
        let catalog = MealCatalog::empty();

        let meal = catalog.add_custom("lunch", "  Wrap  ", 400).unwrap();
        assert_eq!(meal.name, "Wrap");

        let result = catalog.add_custom("lunch", "   ", 400);
        assert_eq!(result, Err(ValidationError::EmptyMealName));
        assert_eq!(catalog.options_for("lunch").len(), 1);
    }

    #[test]
    fn test_add_custom_ids_are_unique_and_increasing() {
        let catalog = MealCatalog::with_defaults();
        let max_seed = catalog
            .options_for("dinner")
            .iter()
            .map(|m| m.id)
            .max()
            .unwrap();

        let first = catalog.add_custom("dinner", "A", 1).unwrap();
        let second = catalog.add_custom("dinner", "B", 2).unwrap();
        assert!(first.id > max_seed);
        assert!(second.id > first.id);
    }

    #[test]
    fn test_add_custom_is_append_only() {
        let catalog = MealCatalog::with_defaults();
        let before = catalog.options_for("lunch");

        catalog.add_custom("lunch", "Grilled Chicken Salad", 999).unwrap();
        let after = catalog.options_for("lunch");

        assert_eq!(&after[..before.len()], &before[..]);
        assert_eq!(after.len(), before.len() + 1);
    }

    #[test]
    fn test_parse_calories() {
        assert_eq!(parse_calories("0"), Ok(0));
        assert_eq!(parse_calories(" 250 "), Ok(250));
        assert!(parse_calories("-5").is_err());
        assert!(parse_calories("12.5").is_err());
        assert!(parse_calories("lots").is_err());
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let catalog = MealCatalog::with_defaults();

        let hits = catalog.search("dinner", "RICE");
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|m| m.name.to_lowercase().contains("rice")));
        assert_eq!(catalog.search("dinner", "").len(), catalog.options_for("dinner").len());
    }

    #[test]
    fn test_find_by_name() {
        let catalog = MealCatalog::with_defaults();
        let meal = catalog.find_by_name("breakfast", "oatmeal with berries").unwrap();
        assert_eq!(meal.id, MealId(1));
        assert_eq!(catalog.find("breakfast", MealId(1)), Some(meal));
    }

    #[test]
    fn test_custom_meals_restore_keeps_counter_monotonic() {
        let source = MealCatalog::empty();
        let stir_fry = source.add_custom("dinner", "Stir Fry", 600).unwrap();
        let exported = source.custom_meals();

        let restored = MealCatalog::with_defaults();
        restored.restore_custom(exported.clone());
        restored.restore_custom(exported);

        assert_eq!(
            restored.options_for("dinner").iter().filter(|m| m.is_custom).count(),
            1
        );
        let next = restored.add_custom("dinner", "Tacos", 700).unwrap();
        assert!(next.id > stir_fry.id);
    }

    #[test]
    fn test_restore_highest_id_stops_new_custom_meals() {
        let catalog = MealCatalog::with_defaults();
        let mut exported = BTreeMap::new();
        exported.insert(
            "dinner".to_string(),
            vec![MealDefinition::custom(u64::MAX, "Last Supper", 900)],
        );

        catalog.restore_custom(exported);
        assert_eq!(catalog.find("dinner", MealId(u64::MAX)).map(|m| m.calories), Some(900));
        assert_eq!(
            catalog.add_custom("dinner", "Tacos", 700),
            Err(ValidationError::MealIdsExhausted)
        );
        assert_eq!(catalog.custom_meals()["dinner"].len(), 1);
    }

    #[test]
    fn test_add_custom_takes_the_last_id_once() {
        let mut options = HashMap::new();
        options.insert(
            "lunch".to_string(),
            vec![MealDefinition::new(u64::MAX - 1, "Salad", 350)],
        );
        let catalog = MealCatalog::new(options);

        let last = catalog.add_custom("lunch", "Wrap", 450).unwrap();
        assert_eq!(last.id, MealId(u64::MAX));
        assert_eq!(
            catalog.add_custom("lunch", "Soup", 300),
            Err(ValidationError::MealIdsExhausted)
        );
    }

    #[test]
    fn test_from_seed_json_invalid() {
        assert!(MealCatalog::from_seed_json("{not json").is_err());
    }
}
