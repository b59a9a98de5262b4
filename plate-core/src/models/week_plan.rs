use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::meal::MealDefinition;
use crate::error::ValidationError;

const DAYS_PER_WEEK: i64 = 7;

/// Returns the Monday of the week containing `date`, or the earliest
/// representable date when that Monday is before it.
pub fn start_of_week(date: NaiveDate) -> NaiveDate {
    let back = Days::new(u64::from(date.weekday().num_days_from_monday()));
    date.checked_sub_days(back).unwrap_or(NaiveDate::MIN)
}

/// Returns Monday..Sunday of the week `week_offset` weeks away from the week
/// containing `today`, or `None` when that week leaves the calendar range.
///
/// The anchor is always the real current week, never the week last viewed.
pub fn week_dates(today: NaiveDate, week_offset: i32) -> Option<[NaiveDate; 7]> {
    let start = start_of_week(today).checked_add_signed(Duration::weeks(i64::from(week_offset)))?;
    start.checked_add_signed(Duration::days(DAYS_PER_WEEK - 1))?;
    Some(std::array::from_fn(|i| start + Duration::days(i as i64)))
}

/// Returns the week offset, relative to the week containing `today`, of the
/// week containing `date`.
pub fn week_offset_of(today: NaiveDate, date: NaiveDate) -> i32 {
    let days = (start_of_week(date) - start_of_week(today)).num_days();
    (days / DAYS_PER_WEEK) as i32
}

/// Meal-type key to assigned meal for one day. `None` marks a cleared cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DaySlots(BTreeMap<String, Option<MealDefinition>>);

impl DaySlots {
    /// Creates a day with an empty cell for every key.
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keys.into_iter().map(|k| (k.into(), None)).collect())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Returns the meal assigned to `key`, if any.
    pub fn get(&self, key: &str) -> Option<&MealDefinition> {
        self.0.get(key).and_then(Option::as_ref)
    }

    /// Writes a cell. Returns false (and writes nothing) for unknown keys.
    pub fn set(&mut self, key: &str, meal: Option<MealDefinition>) -> bool {
        match self.0.get_mut(key) {
            Some(cell) => {
                *cell = meal;
                true
            }
            None => false,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&MealDefinition>)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_ref()))
    }

    /// Number of non-empty cells.
    pub fn assigned_count(&self) -> usize {
        self.0.values().filter(|m| m.is_some()).count()
    }
}

/// Whether a week plan has edits that were not yet persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    #[default]
    Clean,
    Dirty,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStatus::Clean => write!(f, "clean"),
            PlanStatus::Dirty => write!(f, "dirty"),
        }
    }
}

/// The 7-day grid of a week: date to [`DaySlots`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekPlan {
    pub week_offset: i32,
    pub week_start: NaiveDate,
    days: BTreeMap<NaiveDate, DaySlots>,
    #[serde(default)]
    pub status: PlanStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_saved_at: Option<DateTime<Utc>>,
    /// Bumped on every edit; lets a finished save tell whether the plan
    /// changed while it was in flight.
    #[serde(skip)]
    revision: u64,
}

impl WeekPlan {
    /// Creates an empty plan for the week `week_offset` weeks from `today`,
    /// with a cell for every key.
    pub fn empty(
        today: NaiveDate,
        week_offset: i32,
        keys: &[String],
    ) -> Result<Self, ValidationError> {
        let dates = week_dates(today, week_offset)
            .ok_or(ValidationError::WeekOutOfRange { week_offset })?;
        let days = dates
            .iter()
            .map(|date| (*date, DaySlots::with_keys(keys.iter().cloned())))
            .collect();

        Ok(Self {
            week_offset,
            week_start: dates[0],
            days,
            status: PlanStatus::Clean,
            last_saved_at: None,
            revision: 0,
        })
    }

    pub fn week_end(&self) -> NaiveDate {
        self.week_start + Duration::days(DAYS_PER_WEEK - 1)
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.days.keys().copied().collect()
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.days.contains_key(&date)
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DaySlots> {
        self.days.get(&date)
    }

    pub fn days(&self) -> impl Iterator<Item = (NaiveDate, &DaySlots)> {
        self.days.iter().map(|(d, s)| (*d, s))
    }

    pub fn slot(&self, date: NaiveDate, key: &str) -> Option<&MealDefinition> {
        self.days.get(&date).and_then(|day| day.get(key))
    }

    /// Count of non-empty cells across the whole week.
    pub fn assigned_count(&self) -> usize {
        self.days.values().map(DaySlots::assigned_count).sum()
    }

    pub fn is_dirty(&self) -> bool {
        self.status == PlanStatus::Dirty
    }

    pub(crate) fn revision(&self) -> u64 {
        self.revision
    }

    /// Writes a cell and marks the plan dirty. Returns false if the date or
    /// key is not part of this plan.
    pub(crate) fn set_slot(
        &mut self,
        date: NaiveDate,
        key: &str,
        meal: Option<MealDefinition>,
    ) -> bool {
        let written = self
            .days
            .get_mut(&date)
            .map(|day| day.set(key, meal))
            .unwrap_or(false);

        if written {
            self.status = PlanStatus::Dirty;
            self.revision += 1;
        }
        written
    }

    pub(crate) fn mark_saved(&mut self, saved_at: DateTime<Utc>) {
        self.status = PlanStatus::Clean;
        self.last_saved_at = Some(saved_at);
    }

    /// Copies the cells of a previously saved snapshot of the same week into
    /// this plan. Keys this plan does not know are dropped; keys the
    /// snapshot lacks stay empty.
    pub(crate) fn overlay(&mut self, saved: &WeekPlan) {
        for (date, day) in self.days.iter_mut() {
            let Some(saved_day) = saved.days.get(date) else {
                continue;
            };
            for (key, meal) in saved_day.iter() {
                day.set(key, meal.cloned());
            }
        }
        if saved.last_saved_at.is_some() {
            self.last_saved_at = saved.last_saved_at;
        }
    }
}
