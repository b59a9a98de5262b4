//! The asynchronous persistence boundary.
//!
//! The ledger never retries a failed call; failures surface to the caller
//! as [`LedgerError::Persistence`](crate::LedgerError::Persistence) with
//! local state left as it was.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::Notify;

use crate::models::{CompletionRecord, WeekPlan};

/// Errors reported by a persistence backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Rejected by backend: {0}")]
    Rejected(String),
}

/// Acknowledgement of a persisted week plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistAck {
    pub saved_at: DateTime<Utc>,
    pub acknowledged: bool,
}

/// Where week plans, completions and past calorie totals live.
#[allow(async_fn_in_trait)]
pub trait PlanBackend {
    async fn persist_week_plan(
        &self,
        week_offset: i32,
        plan: &WeekPlan,
    ) -> Result<PersistAck, BackendError>;

    /// Returns the last persisted plan for the week starting `week_start`.
    async fn load_week_plan(&self, week_start: NaiveDate)
        -> Result<Option<WeekPlan>, BackendError>;

    /// Authoritative consumed-calorie total for a past date.
    async fn fetch_calories_for_date(&self, date: NaiveDate) -> Result<u32, BackendError>;

    async fn persist_completions(&self, record: &CompletionRecord) -> Result<(), BackendError>;

    async fn load_completions(
        &self,
        date: NaiveDate,
    ) -> Result<Option<CompletionRecord>, BackendError>;
}

/// In-process backend. Counts calls, and can be told to fail or to hold
/// saves open until released.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    weeks: HashMap<NaiveDate, WeekPlan>,
    calories: HashMap<NaiveDate, u32>,
    completions: HashMap<NaiveDate, CompletionRecord>,
    persist_calls: usize,
    fetch_calls: usize,
    failing: bool,
    save_gate: Option<Arc<Notify>>,
    fetch_gate: Option<Arc<Notify>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the calorie total returned for `date`.
    pub fn with_calories(self, date: NaiveDate, calories: u32) -> Self {
        self.state().calories.insert(date, calories);
        self
    }

    pub fn with_week(self, plan: WeekPlan) -> Self {
        self.state().weeks.insert(plan.week_start, plan);
        self
    }

    pub fn with_completions(self, record: CompletionRecord) -> Self {
        self.state().completions.insert(record.date, record);
        self
    }

    /// Makes every following call fail with [`BackendError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.state().failing = failing;
    }

    /// Holds each save open until `gate` is notified.
    pub fn hold_saves(&self, gate: Arc<Notify>) {
        self.state().save_gate = Some(gate);
    }

    /// Holds each calorie fetch open until `gate` is notified.
    pub fn hold_fetches(&self, gate: Arc<Notify>) {
        self.state().fetch_gate = Some(gate);
    }

    pub fn persist_calls(&self) -> usize {
        self.state().persist_calls
    }

    pub fn fetch_calls(&self) -> usize {
        self.state().fetch_calls
    }

    pub fn saved_week(&self, week_start: NaiveDate) -> Option<WeekPlan> {
        self.state().weeks.get(&week_start).cloned()
    }

    pub fn saved_completions(&self, date: NaiveDate) -> Option<CompletionRecord> {
        self.state().completions.get(&date).cloned()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), BackendError> {
        if self.state().failing {
            return Err(BackendError::Unavailable("memory backend offline".to_string()));
        }
        Ok(())
    }
}

impl PlanBackend for MemoryBackend {
    async fn persist_week_plan(
        &self,
        week_offset: i32,
        plan: &WeekPlan,
    ) -> Result<PersistAck, BackendError> {
        let gate = {
            let mut state = self.state();
            state.persist_calls += 1;
            state.save_gate.clone()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.check_available()?;

        let saved_at = Utc::now();
        let mut stored = plan.clone();
        stored.week_offset = week_offset;
        stored.mark_saved(saved_at);
        self.state().weeks.insert(plan.week_start, stored);

        Ok(PersistAck {
            saved_at,
            acknowledged: true,
        })
    }

    async fn load_week_plan(
        &self,
        week_start: NaiveDate,
    ) -> Result<Option<WeekPlan>, BackendError> {
        self.check_available()?;
        Ok(self.state().weeks.get(&week_start).cloned())
    }

    async fn fetch_calories_for_date(&self, date: NaiveDate) -> Result<u32, BackendError> {
        let gate = {
            let mut state = self.state();
            state.fetch_calls += 1;
            state.fetch_gate.clone()
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.check_available()?;

        let state = self.state();
        let calories = match state.calories.get(&date) {
            Some(calories) => *calories,
            None => state
                .completions
                .get(&date)
                .map(|r| r.total_calories)
                .unwrap_or(0),
        };
        Ok(calories)
    }

    async fn persist_completions(&self, record: &CompletionRecord) -> Result<(), BackendError> {
        self.check_available()?;
        self.state().completions.insert(record.date, record.clone());
        Ok(())
    }

    async fn load_completions(
        &self,
        date: NaiveDate,
    ) -> Result<Option<CompletionRecord>, BackendError> {
        self.check_available()?;
        Ok(self.state().completions.get(&date).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MealDefinition;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_memory_backend_persist_and_load_week() {
        let backend = MemoryBackend::new();
        let mut plan = WeekPlan::empty(date(2024, 6, 5), 0, &["dinner".to_string()]).unwrap();
        plan.set_slot(date(2024, 6, 5), "dinner", Some(MealDefinition::new(2, "Stew", 700)));

        let ack = backend.persist_week_plan(0, &plan).await.unwrap();
        assert!(ack.acknowledged);
        assert_eq!(backend.persist_calls(), 1);

        let loaded = backend.load_week_plan(date(2024, 6, 3)).await.unwrap().unwrap();
        assert!(!loaded.is_dirty());
        assert_eq!(loaded.last_saved_at, Some(ack.saved_at));
        assert_eq!(loaded.slot(date(2024, 6, 5), "dinner").map(|m| m.calories), Some(700));
    }

    #[tokio::test]
    async fn test_memory_backend_fetch_counts_calls() {
        let backend = MemoryBackend::new().with_calories(date(2024, 6, 1), 1800);

        assert_eq!(backend.fetch_calories_for_date(date(2024, 6, 1)).await, Ok(1800));
        assert_eq!(backend.fetch_calories_for_date(date(2024, 6, 2)).await, Ok(0));
        assert_eq!(backend.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_memory_backend_failing() {
        let backend = MemoryBackend::new();
        backend.set_failing(true);

        let result = backend.fetch_calories_for_date(date(2024, 6, 1)).await;
        assert!(matches!(result, Err(BackendError::Unavailable(_))));

        backend.set_failing(false);
        assert!(backend.load_week_plan(date(2024, 6, 3)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_backend_fetch_falls_back_to_completions() {
        let record = CompletionRecord {
            date: date(2024, 6, 2),
            items: Vec::new(),
            total_calories: 1430,
            saved_at: Utc::now(),
        };
        let backend = MemoryBackend::new().with_completions(record);

        assert_eq!(backend.fetch_calories_for_date(date(2024, 6, 2)).await, Ok(1430));
    }
}
