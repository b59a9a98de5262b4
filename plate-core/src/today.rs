//! Today's meals: the planned meals for the current date with eaten flags.
//!
//! The list is derived from the week plan's cells for today and published
//! through a [`watch`] channel. Completion flags are session state until
//! [`TodaysMeals::save_completions`] persists them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::backend::PlanBackend;
use crate::clock::Clock;
use crate::error::{LedgerError, ValidationError};
use crate::models::{CompletionRecord, DaySlots, TodaysMealItem, WeekPlan};
use crate::registry::MealTypeRegistry;

/// The published state of today's list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodaysMealsSnapshot {
    pub date: NaiveDate,
    pub items: Vec<TodaysMealItem>,
}

impl TodaysMealsSnapshot {
    /// Sum of calories of the completed items.
    pub fn completed_calories(&self) -> u32 {
        self.items
            .iter()
            .filter(|i| i.completed)
            .map(|i| i.meal.calories)
            .sum()
    }
}

/// How many of today's meals are eaten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64 * 100.0
    }
}

pub struct TodaysMeals<B> {
    registry: Arc<MealTypeRegistry>,
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    items: watch::Sender<TodaysMealsSnapshot>,
    last_saved_at: Mutex<Option<DateTime<Utc>>>,
}

impl<B> TodaysMeals<B> {
    pub fn new(registry: Arc<MealTypeRegistry>, backend: Arc<B>, clock: Arc<dyn Clock>) -> Self {
        let (items, _) = watch::channel(TodaysMealsSnapshot {
            date: clock.today(),
            items: Vec::new(),
        });
        Self {
            registry,
            backend,
            clock,
            items,
            last_saved_at: Mutex::new(None),
        }
    }

    /// A receiver that observes every change to the list.
    pub fn subscribe(&self) -> watch::Receiver<TodaysMealsSnapshot> {
        self.items.subscribe()
    }

    pub fn date(&self) -> NaiveDate {
        self.items.borrow().date
    }

    pub fn items(&self) -> Vec<TodaysMealItem> {
        self.items.borrow().items.clone()
    }

    pub fn snapshot(&self) -> TodaysMealsSnapshot {
        self.items.borrow().clone()
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        *self.saved_at()
    }

    /// Replaces the list with the planned meals of `slots`, taking eaten
    /// flags from `saved` when present.
    pub fn seed(&self, date: NaiveDate, slots: &DaySlots, saved: Option<&CompletionRecord>) {
        let mut items = self.derive_items(date, slots);
        if let Some(record) = saved {
            for item in &mut items {
                item.completed = record.is_completed(&item.id);
            }
        }
        tracing::debug!(%date, count = items.len(), "today's meals seeded");
        self.items.send_replace(TodaysMealsSnapshot { date, items });
    }

    /// Rebuilds the list after the plan for `date` was saved again. An item
    /// keeps its eaten flag only if its slot still holds the same meal.
    pub fn sync_from_plan(&self, date: NaiveDate, slots: &DaySlots) {
        let fresh = self.derive_items(date, slots);
        self.items.send_modify(|snapshot| {
            let previous = if snapshot.date == date {
                std::mem::take(&mut snapshot.items)
            } else {
                Vec::new()
            };

            snapshot.items = fresh
                .into_iter()
                .map(|mut item| {
                    item.completed = previous
                        .iter()
                        .any(|p| p.id == item.id && p.meal.id == item.meal.id && p.completed);
                    item
                })
                .collect();
            snapshot.date = date;
        });
        tracing::debug!(%date, "today's meals resynced from plan");
    }

    /// Flips the eaten flag of an item and returns the new value.
    pub fn toggle(&self, id: &str) -> Result<bool, ValidationError> {
        let mut toggled = None;
        self.items.send_if_modified(|snapshot| {
            match snapshot.items.iter_mut().find(|i| i.id == id) {
                Some(item) => {
                    item.completed = !item.completed;
                    toggled = Some(item.completed);
                    true
                }
                None => false,
            }
        });
        toggled.ok_or_else(|| ValidationError::UnknownTodaysMeal(id.to_string()))
    }

    pub fn set_completed(&self, id: &str, completed: bool) -> Result<(), ValidationError> {
        let mut found = false;
        self.items.send_if_modified(|snapshot| {
            let Some(item) = snapshot.items.iter_mut().find(|i| i.id == id) else {
                return false;
            };
            found = true;
            let changed = item.completed != completed;
            item.completed = completed;
            changed
        });

        if found {
            Ok(())
        } else {
            Err(ValidationError::UnknownTodaysMeal(id.to_string()))
        }
    }

    pub fn find_by_meal_type(&self, meal_type: &str) -> Option<TodaysMealItem> {
        self.items
            .borrow()
            .items
            .iter()
            .find(|i| i.meal_type == meal_type)
            .cloned()
    }

    pub fn completed_calories(&self) -> u32 {
        self.items.borrow().completed_calories()
    }

    pub fn completed_count(&self) -> usize {
        self.items.borrow().items.iter().filter(|i| i.completed).count()
    }

    pub fn progress(&self) -> Progress {
        let snapshot = self.items.borrow();
        Progress {
            completed: snapshot.items.iter().filter(|i| i.completed).count(),
            total: snapshot.items.len(),
        }
    }

    /// Non-empty cells in registry order.
    fn derive_items(&self, date: NaiveDate, slots: &DaySlots) -> Vec<TodaysMealItem> {
        self.registry
            .keys()
            .into_iter()
            .filter_map(|key| {
                slots
                    .get(&key)
                    .cloned()
                    .map(|meal| TodaysMealItem::new(date, key, meal))
            })
            .collect()
    }

    fn saved_at(&self) -> MutexGuard<'_, Option<DateTime<Utc>>> {
        self.last_saved_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<B: PlanBackend> TodaysMeals<B> {
    /// Seeds the list from today's cells of `plan` and the completions the
    /// backend has for today.
    pub async fn load(&self, plan: &WeekPlan) -> Result<(), LedgerError> {
        let today = self.clock.today();
        let Some(slots) = plan.day(today) else {
            tracing::debug!(%today, week_start = %plan.week_start, "plan does not cover today");
            self.seed(today, &DaySlots::default(), None);
            return Ok(());
        };

        let saved = self.backend.load_completions(today).await?;
        self.seed(today, slots, saved.as_ref());
        Ok(())
    }

    /// Persists the current eaten flags and today's total.
    pub async fn save_completions(&self) -> Result<CompletionRecord, LedgerError> {
        let snapshot = self.snapshot();
        let record = CompletionRecord {
            date: snapshot.date,
            total_calories: snapshot.completed_calories(),
            items: snapshot.items,
            saved_at: self.clock.now(),
        };

        if let Err(e) = self.backend.persist_completions(&record).await {
            tracing::warn!(date = %record.date, "saving completions failed: {}", e);
            return Err(e.into());
        }

        *self.saved_at() = Some(record.saved_at);
        tracing::info!(
            date = %record.date,
            total_calories = record.total_calories,
            "meal progress saved"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::clock::FixedClock;
    use crate::models::MealDefinition;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today_view(today: NaiveDate) -> (TodaysMeals<MemoryBackend>, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let view = TodaysMeals::new(
            Arc::new(MealTypeRegistry::with_defaults()),
            backend.clone(),
            Arc::new(FixedClock::on(today)),
        );
        (view, backend)
    }

    fn slots() -> DaySlots {
        let mut slots = DaySlots::with_keys(MealTypeRegistry::with_defaults().keys());
        slots.set("dinner", Some(MealDefinition::new(23, "Grilled Salmon with Rice", 520)));
        slots.set("breakfast", Some(MealDefinition::new(1, "Oatmeal with Berries", 250)));
        slots
    }

    #[test]
    fn test_seed_skips_empty_cells_in_registry_order() {
        let today = date(2024, 6, 10);
        let (view, _) = today_view(today);

        view.seed(today, &slots(), None);
        let items = view.items();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].meal_type, "breakfast");
        assert_eq!(items[1].meal_type, "dinner");
        assert_eq!(items[1].id, "2024-06-10-dinner");
        assert!(items.iter().all(|i| !i.completed));
    }

    #[test]
    fn test_toggle_updates_totals_and_progress() {
        let today = date(2024, 6, 10);
        let (view, _) = today_view(today);
        view.seed(today, &slots(), None);

        assert_eq!(view.toggle("2024-06-10-breakfast"), Ok(true));
        assert_eq!(view.completed_calories(), 250);
        assert_eq!(view.progress(), Progress { completed: 1, total: 2 });
        assert_eq!(view.progress().percentage(), 50.0);

        assert_eq!(view.toggle("2024-06-10-breakfast"), Ok(false));
        assert_eq!(view.completed_calories(), 0);
    }

    #[test]
    fn test_toggle_unknown_item() {
        let today = date(2024, 6, 10);
        let (view, _) = today_view(today);
        view.seed(today, &slots(), None);

        assert_eq!(
            view.toggle("2024-06-10-lunch"),
            Err(ValidationError::UnknownTodaysMeal("2024-06-10-lunch".to_string()))
        );
    }

    #[test]
    fn test_subscribers_see_changes() {
        let today = date(2024, 6, 10);
        let (view, _) = today_view(today);
        let mut rx = view.subscribe();
        view.seed(today, &slots(), None);
        rx.borrow_and_update();

        view.set_completed("2024-06-10-dinner", true).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().completed_calories(), 520);

        // Setting the same value again is not a change
        view.set_completed("2024-06-10-dinner", true).unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_sync_from_plan_keeps_flags_for_unchanged_meals() {
        let today = date(2024, 6, 10);
        let (view, _) = today_view(today);
        view.seed(today, &slots(), None);
        view.set_completed("2024-06-10-breakfast", true).unwrap();
        view.set_completed("2024-06-10-dinner", true).unwrap();

        let mut edited = slots();
        edited.set("dinner", Some(MealDefinition::new(20, "Spaghetti Bolognese", 650)));
        edited.set("lunch", Some(MealDefinition::new(10, "Grilled Chicken Salad", 350)));
        view.sync_from_plan(today, &edited);

        let items = view.items();
        assert_eq!(items.len(), 3);
        assert!(view.find_by_meal_type("breakfast").unwrap().completed);
        assert!(!view.find_by_meal_type("dinner").unwrap().completed);
        assert!(!view.find_by_meal_type("lunch").unwrap().completed);
        assert_eq!(view.completed_calories(), 250);
    }

    #[tokio::test]
    async fn test_load_restores_saved_completions() {
        let today = date(2024, 6, 10);
        let (view, backend) = today_view(today);
        let keys = MealTypeRegistry::with_defaults().keys();
        let mut plan = WeekPlan::empty(today, 0, &keys).unwrap();
        plan.set_slot(today, "breakfast", Some(MealDefinition::new(1, "Oats", 250)));
        plan.set_slot(today, "lunch", Some(MealDefinition::new(10, "Salad", 350)));

        view.load(&plan).await.unwrap();
        view.toggle("2024-06-10-lunch").unwrap();
        let record = view.save_completions().await.unwrap();
        assert_eq!(record.total_calories, 350);
        assert_eq!(view.last_saved_at(), Some(record.saved_at));

        let (reloaded, _) = today_view(today);
        let saved = backend.saved_completions(today);
        reloaded.seed(today, plan.day(today).unwrap(), saved.as_ref());
        assert!(reloaded.find_by_meal_type("lunch").unwrap().completed);
        assert!(!reloaded.find_by_meal_type("breakfast").unwrap().completed);
    }

    #[tokio::test]
    async fn test_save_completions_failure_keeps_flags() {
        let today = date(2024, 6, 10);
        let (view, backend) = today_view(today);
        view.seed(today, &slots(), None);
        view.toggle("2024-06-10-dinner").unwrap();
        backend.set_failing(true);

        assert!(matches!(
            view.save_completions().await,
            Err(LedgerError::Persistence(_))
        ));
        assert_eq!(view.completed_calories(), 520);
        assert!(view.last_saved_at().is_none());
    }

    #[tokio::test]
    async fn test_load_plan_without_today_seeds_empty() {
        let today = date(2024, 6, 10);
        let (view, _) = today_view(today);
        let plan = WeekPlan::empty(today, 1, &MealTypeRegistry::with_defaults().keys()).unwrap();

        view.load(&plan).await.unwrap();
        assert!(view.items().is_empty());
        assert_eq!(view.date(), today);
    }
}
