//! Editing a single slot of the current week.

use chrono::NaiveDate;

use crate::catalog::{parse_calories, MealCatalog};
use crate::error::{LedgerError, ValidationError};
use crate::models::{MealDefinition, MealId};
use crate::store::WeekPlanStore;

/// A transient edit of one `(date, meal type)` cell.
///
/// Nothing reaches the store until [`commit`](Self::commit),
/// [`commit_selected`](Self::commit_selected) or [`remove`](Self::remove),
/// each of which consumes the session.
pub struct PlanEditingSession<'a, B> {
    store: &'a WeekPlanStore<B>,
    catalog: &'a MealCatalog,
    date: NaiveDate,
    meal_type: String,
    current: Option<MealDefinition>,
    selected: Option<MealDefinition>,
}

impl<'a, B> PlanEditingSession<'a, B> {
    pub fn open(
        store: &'a WeekPlanStore<B>,
        catalog: &'a MealCatalog,
        date: NaiveDate,
        meal_type: &str,
    ) -> Result<Self, LedgerError> {
        store.check_slot(date, meal_type)?;
        let current = store.slot(date, meal_type);
        tracing::debug!(%date, meal_type, "editing session opened");

        Ok(Self {
            store,
            catalog,
            date,
            meal_type: meal_type.to_string(),
            selected: current.clone(),
            current,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn meal_type(&self) -> &str {
        &self.meal_type
    }

    /// The meal the cell held when the session opened.
    pub fn current(&self) -> Option<&MealDefinition> {
        self.current.as_ref()
    }

    pub fn selected(&self) -> Option<&MealDefinition> {
        self.selected.as_ref()
    }

    pub fn options(&self) -> Vec<MealDefinition> {
        self.catalog.options_for(&self.meal_type)
    }

    pub fn search(&self, term: &str) -> Vec<MealDefinition> {
        self.catalog.search(&self.meal_type, term)
    }

    pub fn select(&mut self, id: MealId) -> Result<&MealDefinition, ValidationError> {
        let meal = self
            .catalog
            .find(&self.meal_type, id)
            .ok_or_else(|| ValidationError::UnknownMeal {
                meal_type: self.meal_type.clone(),
                id,
            })?;
        Ok(&*self.selected.insert(meal))
    }

    /// Adds a custom meal to the catalog and selects it. The cell is not
    /// written until the session commits.
    pub fn create_custom_and_select(
        &mut self,
        name: &str,
        calories: &str,
    ) -> Result<MealDefinition, ValidationError> {
        let calories = parse_calories(calories)?;
        let meal = self.catalog.add_custom(&self.meal_type, name, calories)?;
        self.selected = Some(meal.clone());
        Ok(meal)
    }

    pub fn commit(self, meal: MealDefinition) -> Result<(), LedgerError> {
        self.store.assign(self.date, &self.meal_type, Some(meal))
    }

    pub fn commit_selected(self) -> Result<MealDefinition, LedgerError> {
        let meal = self.selected.clone().ok_or(ValidationError::NothingSelected)?;
        self.store
            .assign(self.date, &self.meal_type, Some(meal.clone()))?;
        Ok(meal)
    }

    /// Clears the cell and returns what it held.
    pub fn remove(self) -> Result<Option<MealDefinition>, LedgerError> {
        self.store.assign(self.date, &self.meal_type, None)?;
        Ok(self.current)
    }

    pub fn cancel(self) {
        tracing::debug!(date = %self.date, meal_type = %self.meal_type, "editing session cancelled");
    }
}
