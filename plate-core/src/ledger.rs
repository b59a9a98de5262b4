//! Consumed calories per date.
//!
//! Today's value is live: it is summed from the completed items published
//! by [`TodaysMeals`](crate::TodaysMeals) every time it is read. Any past
//! date is fetched from the backend once and cached for the session. Dates
//! after today are out of range.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use crate::backend::PlanBackend;
use crate::clock::Clock;
use crate::error::{LedgerError, ValidationError};
use crate::today::TodaysMealsSnapshot;

/// Where a calorie figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "calories", rename_all = "lowercase")]
pub enum CalorieReading {
    /// Derived from today's completed meals.
    Live(u32),
    /// Fetched from the backend earlier in this session.
    Cached(u32),
    /// Not fetched yet, or a fetch is in flight.
    Pending,
}

impl CalorieReading {
    pub fn calories(&self) -> Option<u32> {
        match self {
            CalorieReading::Live(calories) | CalorieReading::Cached(calories) => Some(*calories),
            CalorieReading::Pending => None,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, CalorieReading::Live(_))
    }
}

impl fmt::Display for CalorieReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalorieReading::Live(calories) => write!(f, "{} cal (live)", calories),
            CalorieReading::Cached(calories) => write!(f, "{} cal", calories),
            CalorieReading::Pending => write!(f, "loading"),
        }
    }
}

/// Daily calorie goal. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CalorieTarget(u32);

impl CalorieTarget {
    pub const DEFAULT: u32 = 2000;

    pub fn new(calories: u32) -> Result<Self, ValidationError> {
        if calories == 0 {
            return Err(ValidationError::ZeroCalorieTarget);
        }
        Ok(Self(calories))
    }

    pub fn calories(&self) -> u32 {
        self.0
    }

    /// Share of the target consumed, capped at 100.
    pub fn percentage(&self, consumed: u32) -> f64 {
        (consumed as f64 / self.0 as f64 * 100.0).min(100.0)
    }

    pub fn remaining(&self, consumed: u32) -> u32 {
        self.0.saturating_sub(consumed)
    }
}

impl Default for CalorieTarget {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Prev,
    Next,
}

/// How a date is shown in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLabel {
    Today,
    Yesterday,
    Date(NaiveDate),
}

impl fmt::Display for DateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateLabel::Today => write!(f, "Today"),
            DateLabel::Yesterday => write!(f, "Yesterday"),
            DateLabel::Date(date) => write!(f, "{}", date.format("%A, %b %-d")),
        }
    }
}

/// Result of refreshing the selected date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    Current {
        date: NaiveDate,
        reading: CalorieReading,
    },
    /// The selection moved or the ledger was torn down while the fetch was
    /// in flight; the result was dropped.
    Stale { date: NaiveDate },
}

pub struct CalorieLedger<B> {
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    todays: watch::Receiver<TodaysMealsSnapshot>,
    state: Mutex<LedgerState>,
}

struct LedgerState {
    selected: NaiveDate,
    /// Bumped on every selection change and on teardown.
    generation: u64,
    torn_down: bool,
    cache: HashMap<NaiveDate, u32>,
    in_flight: HashSet<NaiveDate>,
    target: CalorieTarget,
}

impl<B> CalorieLedger<B> {
    pub fn new(
        backend: Arc<B>,
        clock: Arc<dyn Clock>,
        todays: watch::Receiver<TodaysMealsSnapshot>,
        target: CalorieTarget,
    ) -> Self {
        let selected = clock.today();
        Self {
            backend,
            clock,
            todays,
            state: Mutex::new(LedgerState {
                selected,
                generation: 0,
                torn_down: false,
                cache: HashMap::new(),
                in_flight: HashSet::new(),
                target,
            }),
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn selected(&self) -> NaiveDate {
        self.state().selected
    }

    pub fn target(&self) -> CalorieTarget {
        self.state().target
    }

    pub fn set_target(&self, calories: u32) -> Result<(), ValidationError> {
        let target = CalorieTarget::new(calories)?;
        self.state().target = target;
        Ok(())
    }

    /// The current reading for `date` without fetching.
    pub fn reading(&self, date: NaiveDate) -> Result<CalorieReading, LedgerError> {
        let today = self.clock.today();
        let state = self.state();
        self.reading_at(&state, date, today)
    }

    /// Moves the selection one day. Moving past today is a no-op.
    pub fn navigate(&self, direction: Direction) -> NaiveDate {
        let today = self.clock.today();
        let mut state = self.state();
        let target = match direction {
            Direction::Prev => state.selected.pred_opt(),
            Direction::Next => state.selected.succ_opt().filter(|next| *next <= today),
        };

        match target {
            Some(date) => {
                state.selected = date;
                state.generation += 1;
                tracing::debug!(%date, "calorie date selected");
            }
            None => tracing::debug!(selected = %state.selected, "navigation clamped at today"),
        }
        state.selected
    }

    pub fn can_navigate_next(&self) -> bool {
        self.state().selected < self.clock.today()
    }

    pub fn select(&self, date: NaiveDate) -> Result<NaiveDate, LedgerError> {
        let today = self.clock.today();
        if date > today {
            return Err(LedgerError::OutOfRange { date, today });
        }

        let mut state = self.state();
        if state.selected != date {
            state.selected = date;
            state.generation += 1;
        }
        Ok(date)
    }

    pub fn date_label(&self, date: NaiveDate) -> DateLabel {
        let today = self.clock.today();
        if date == today {
            DateLabel::Today
        } else if date == today - Duration::days(1) {
            DateLabel::Yesterday
        } else {
            DateLabel::Date(date)
        }
    }

    /// Drops the cached total for `date` so the next read fetches again.
    pub fn invalidate(&self, date: NaiveDate) -> bool {
        self.state().cache.remove(&date).is_some()
    }

    /// Marks fetches in flight as stale. Their results are returned to the
    /// caller but never cached.
    pub fn teardown(&self) {
        let mut state = self.state();
        state.generation += 1;
        state.torn_down = true;
        tracing::debug!(in_flight = state.in_flight.len(), "calorie ledger torn down");
    }

    fn reading_at(
        &self,
        state: &LedgerState,
        date: NaiveDate,
        today: NaiveDate,
    ) -> Result<CalorieReading, LedgerError> {
        if date > today {
            return Err(LedgerError::OutOfRange { date, today });
        }
        if date == today {
            return Ok(CalorieReading::Live(self.live_calories(today)));
        }
        Ok(match state.cache.get(&date) {
            Some(calories) => CalorieReading::Cached(*calories),
            None => CalorieReading::Pending,
        })
    }

    /// Completed calories from today's list. A list seeded for another day
    /// counts as nothing.
    fn live_calories(&self, today: NaiveDate) -> u32 {
        let snapshot = self.todays.borrow();
        if snapshot.date == today {
            snapshot.completed_calories()
        } else {
            0
        }
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<B: PlanBackend> CalorieLedger<B> {
    /// Consumed calories for `date`. Past dates are fetched at most once; a
    /// second caller while that fetch is in flight gets
    /// [`CalorieReading::Pending`].
    pub async fn consumed_calories(&self, date: NaiveDate) -> Result<CalorieReading, LedgerError> {
        let today = self.clock.today();
        {
            let mut state = self.state();
            match self.reading_at(&state, date, today)? {
                CalorieReading::Pending => {}
                reading => return Ok(reading),
            }
            if !state.in_flight.insert(date) {
                return Ok(CalorieReading::Pending);
            }
        }

        let result = self.fetch_past(date, today).await;

        let mut state = self.state();
        state.in_flight.remove(&date);
        let fetched = result?;
        if state.torn_down {
            tracing::debug!(%date, "ledger torn down during fetch, result not cached");
            return Ok(CalorieReading::Cached(fetched));
        }
        let calories = *state.cache.entry(date).or_insert(fetched);
        Ok(CalorieReading::Cached(calories))
    }

    /// Reading for the selected date, fetching it if needed. A fetch that
    /// completes after the selection moved is discarded.
    pub async fn refresh_selected(&self) -> Result<SelectionOutcome, LedgerError> {
        let today = self.clock.today();
        let (date, generation) = {
            let mut state = self.state();
            let date = state.selected;
            match self.reading_at(&state, date, today)? {
                CalorieReading::Pending => {}
                reading => return Ok(SelectionOutcome::Current { date, reading }),
            }
            if !state.in_flight.insert(date) {
                return Ok(SelectionOutcome::Current {
                    date,
                    reading: CalorieReading::Pending,
                });
            }
            (date, state.generation)
        };

        let result = self.fetch_past(date, today).await;

        let mut state = self.state();
        state.in_flight.remove(&date);
        let calories = result?;
        if state.generation != generation {
            tracing::debug!(%date, "selection changed during fetch, result discarded");
            return Ok(SelectionOutcome::Stale { date });
        }

        state.cache.insert(date, calories);
        Ok(SelectionOutcome::Current {
            date,
            reading: CalorieReading::Cached(calories),
        })
    }

    async fn fetch_past(&self, date: NaiveDate, today: NaiveDate) -> Result<u32, LedgerError> {
        if date >= today {
            tracing::error!(%date, %today, "calorie fetch requested for a date that is not in the past");
            debug_assert!(date < today, "calorie fetch requested for {date}, today is {today}");
            return Err(LedgerError::OutOfRange { date, today });
        }

        tracing::info!(%date, "fetching consumed calories");
        match self.backend.fetch_calories_for_date(date).await {
            Ok(calories) => Ok(calories),
            Err(e) => {
                tracing::warn!(%date, "calorie fetch failed: {}", e);
                Err(e.into())
            }
        }
    }
}
