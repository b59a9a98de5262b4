//! The week plan store: owner of the canonical per-date slot data.
//!
//! A plan is resolved from a week offset relative to the real current week,
//! edited in place, and persisted only on an explicit [`WeekPlanStore::save`].

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{BackendError, PlanBackend};
use crate::clock::Clock;
use crate::error::{LedgerError, ValidationError};
use crate::models::{MealDefinition, WeekPlan};
use crate::registry::MealTypeRegistry;

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReceipt {
    pub week_offset: i32,
    pub week_start: NaiveDate,
    pub saved_at: DateTime<Utc>,
    /// Non-empty cells in the snapshot that was saved
    pub total_assigned_meals: usize,
}

pub struct WeekPlanStore<B> {
    registry: Arc<MealTypeRegistry>,
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    state: Mutex<StoreState>,
}

struct StoreState {
    current: WeekPlan,
    /// Bumped whenever `current` is replaced by another resolved plan.
    instance: u64,
    /// Last successfully saved (or loaded) snapshot per week start.
    saved: HashMap<NaiveDate, WeekPlan>,
    /// Weeks with a save in flight.
    in_flight: HashSet<NaiveDate>,
}

impl<B> WeekPlanStore<B> {
    /// Creates a store showing the current week (offset 0).
    pub fn new(
        registry: Arc<MealTypeRegistry>,
        backend: Arc<B>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ValidationError> {
        let current = WeekPlan::empty(clock.today(), 0, &registry.keys())?;
        Ok(Self {
            registry,
            backend,
            clock,
            state: Mutex::new(StoreState {
                current,
                instance: 0,
                saved: HashMap::new(),
                in_flight: HashSet::new(),
            }),
        })
    }

    /// Resolves the week `week_offset` weeks from the current real week and
    /// makes it the plan being edited.
    ///
    /// Cells saved earlier in this session are restored. Unsaved edits of a
    /// different week are dropped. An offset whose week falls outside the
    /// calendar range fails and leaves the current plan untouched.
    pub fn resolve_week(&self, week_offset: i32) -> Result<WeekPlan, ValidationError> {
        let mut plan = WeekPlan::empty(self.clock.today(), week_offset, &self.registry.keys())
            .inspect_err(|_| tracing::warn!(week_offset, "week offset out of range"))?;
        let mut state = self.state();

        if state.current.week_start == plan.week_start {
            state.current.week_offset = week_offset;
            return Ok(state.current.clone());
        }

        if let Some(saved) = state.saved.get(&plan.week_start) {
            plan.overlay(saved);
        }
        if state.current.is_dirty() {
            tracing::warn!(
                week_start = %state.current.week_start,
                "discarding unsaved edits on navigation"
            );
        }
        tracing::debug!(week_offset, week_start = %plan.week_start, "week resolved");

        state.current = plan.clone();
        state.instance += 1;
        Ok(plan)
    }

    pub fn current(&self) -> WeekPlan {
        self.state().current.clone()
    }

    pub fn current_offset(&self) -> i32 {
        self.state().current.week_offset
    }

    pub fn is_dirty(&self) -> bool {
        self.state().current.is_dirty()
    }

    /// True while a save of the current week is in flight.
    pub fn is_saving(&self) -> bool {
        let state = self.state();
        state.in_flight.contains(&state.current.week_start)
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.state().current.last_saved_at
    }

    pub fn slot(&self, date: NaiveDate, meal_type: &str) -> Option<MealDefinition> {
        self.state().current.slot(date, meal_type).cloned()
    }

    /// Last saved snapshot of the week starting `week_start`, if any.
    pub fn saved_week(&self, week_start: NaiveDate) -> Option<WeekPlan> {
        self.state().saved.get(&week_start).cloned()
    }

    /// Writes a cell of the current week. `None` clears it.
    ///
    /// The edit is visible to every later read immediately and marks the
    /// plan dirty.
    pub fn assign(
        &self,
        date: NaiveDate,
        meal_type: &str,
        meal: Option<MealDefinition>,
    ) -> Result<(), LedgerError> {
        self.check_slot(date, meal_type)?;

        let mut state = self.state();
        let name = meal.as_ref().map(|m| m.name.clone());
        state.current.set_slot(date, meal_type, meal);
        tracing::debug!(%date, meal_type, meal = ?name, "slot assigned");
        Ok(())
    }

    /// Fails unless `(date, meal_type)` is a cell of the current week.
    pub fn check_slot(&self, date: NaiveDate, meal_type: &str) -> Result<(), ValidationError> {
        if !self.registry.contains(meal_type) {
            return Err(ValidationError::UnknownMealType(meal_type.to_string()));
        }

        let state = self.state();
        if !state.current.contains_date(date) {
            return Err(ValidationError::DateNotInWeek {
                date,
                week_start: state.current.week_start,
            });
        }
        Ok(())
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<B: PlanBackend> WeekPlanStore<B> {
    /// Resolves a week and fills it with what the backend last persisted for
    /// it, unless this session already knows a saved snapshot.
    pub async fn load_week(&self, week_offset: i32) -> Result<WeekPlan, LedgerError> {
        let plan = self.resolve_week(week_offset)?;
        let instance = {
            let state = self.state();
            if state.saved.contains_key(&plan.week_start) {
                return Ok(plan);
            }
            state.instance
        };

        let loaded = self.backend.load_week_plan(plan.week_start).await?;

        let mut state = self.state();
        if let Some(saved) = loaded {
            let untouched = state.instance == instance && state.current.revision() == 0;
            if untouched {
                state.current.overlay(&saved);
            } else {
                tracing::warn!(
                    week_start = %plan.week_start,
                    "plan changed while loading, persisted cells not applied"
                );
            }
            state.saved.entry(plan.week_start).or_insert(saved);
        }

        if state.current.week_start == plan.week_start {
            Ok(state.current.clone())
        } else {
            Ok(plan)
        }
    }

    /// Persists a snapshot of the current week.
    ///
    /// Edits made while the save is in flight are not part of it and leave
    /// the plan dirty. A second save of the same week while one is in flight
    /// is rejected with [`LedgerError::SaveInFlight`]. On failure the plan
    /// stays dirty and nothing is rolled back.
    pub async fn save(&self) -> Result<SaveReceipt, LedgerError> {
        let (snapshot, instance) = {
            let mut state = self.state();
            let week_start = state.current.week_start;
            if !state.in_flight.insert(week_start) {
                let week_offset = state.current.week_offset;
                tracing::warn!(week_offset, "save rejected, another save is in flight");
                return Err(LedgerError::SaveInFlight { week_offset });
            }
            (state.current.clone(), state.instance)
        };
        let total_assigned_meals = snapshot.assigned_count();

        let result = self
            .backend
            .persist_week_plan(snapshot.week_offset, &snapshot)
            .await;

        let mut state = self.state();
        state.in_flight.remove(&snapshot.week_start);

        let ack = match result {
            Ok(ack) if ack.acknowledged => ack,
            Ok(_) => {
                tracing::warn!(week_start = %snapshot.week_start, "save not acknowledged");
                return Err(BackendError::Rejected("save was not acknowledged".to_string()).into());
            }
            Err(e) => {
                tracing::warn!(week_start = %snapshot.week_start, "save failed: {}", e);
                return Err(e.into());
            }
        };

        let mut saved = snapshot;
        saved.mark_saved(ack.saved_at);

        if state.current.week_start == saved.week_start {
            if state.instance == instance && state.current.revision() == saved.revision() {
                state.current.mark_saved(ack.saved_at);
            } else if state.instance == instance {
                // edited while in flight: still dirty
                state.current.last_saved_at = Some(ack.saved_at);
            } else if !state.current.is_dirty() {
                state.current.overlay(&saved);
            }
        }
        state.saved.insert(saved.week_start, saved.clone());

        tracing::info!(
            week_offset = saved.week_offset,
            week_start = %saved.week_start,
            total_assigned_meals,
            "week plan saved"
        );

        Ok(SaveReceipt {
            week_offset: saved.week_offset,
            week_start: saved.week_start,
            saved_at: ack.saved_at,
            total_assigned_meals,
        })
    }

    /// Fills the empty cells of the current week from the previous week's
    /// saved plan, weekday by weekday. Assigned cells are never overwritten.
    ///
    /// Returns the number of cells copied, or
    /// [`LedgerError::NothingToCopy`] when the previous week was never saved.
    pub async fn copy_from_previous_week(&self) -> Result<usize, LedgerError> {
        let (instance, previous_start, cached) = {
            let state = self.state();
            let week_start = state.current.week_start;
            let Some(previous_start) = week_start.checked_sub_signed(Duration::weeks(1)) else {
                return Err(LedgerError::NothingToCopy { week_start });
            };
            let cached = state.saved.get(&previous_start).cloned();
            (state.instance, previous_start, cached)
        };

        let source = match cached {
            Some(plan) => Some(plan),
            None => self.backend.load_week_plan(previous_start).await?,
        };
        let Some(source) = source else {
            tracing::warn!(week_start = %previous_start, "no previous week to copy from");
            return Err(LedgerError::NothingToCopy {
                week_start: previous_start,
            });
        };

        let keys = self.registry.keys();
        let mut state = self.state();
        state
            .saved
            .entry(previous_start)
            .or_insert_with(|| source.clone());

        if state.instance != instance {
            tracing::warn!("week changed while copying, nothing copied");
            return Ok(0);
        }

        let mut copied = 0;
        for date in state.current.dates() {
            let from = date - Duration::weeks(1);
            for key in &keys {
                if state.current.slot(date, key).is_some() {
                    continue;
                }
                if let Some(meal) = source.slot(from, key) {
                    if state.current.set_slot(date, key, Some(meal.clone())) {
                        copied += 1;
                    }
                }
            }
        }

        tracing::info!(copied, from = %previous_start, "copied previous week");
        Ok(copied)
    }
}
