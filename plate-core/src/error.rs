//! Error types for ledger operations.

use chrono::NaiveDate;
use thiserror::Error;

use crate::backend::BackendError;
use crate::models::MealId;

/// Invalid input from the caller. Recovered locally, never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Meal name cannot be empty")]
    EmptyMealName,

    #[error("Invalid calories '{0}'. Use a whole number of zero or more.")]
    InvalidCalories(String),

    #[error("Calorie target must be greater than zero")]
    ZeroCalorieTarget,

    #[error("Unknown meal type '{0}'")]
    UnknownMealType(String),

    #[error("Date {date} is not part of the week starting {week_start}")]
    DateNotInWeek {
        date: NaiveDate,
        week_start: NaiveDate,
    },

    #[error("Week offset {week_offset} is outside the supported calendar range")]
    WeekOutOfRange { week_offset: i32 },

    #[error("No {meal_type} meal with id {id}")]
    UnknownMeal { meal_type: String, id: MealId },

    #[error("No meal with id '{0}' on today's list")]
    UnknownTodaysMeal(String),

    #[error("No custom meal ids left")]
    MealIdsExhausted,

    #[error("No meal selected")]
    NothingSelected,
}

/// Errors returned by the ledger components.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A date after today, or the cached path asked for today.
    #[error("Date {date} is out of range (today is {today})")]
    OutOfRange { date: NaiveDate, today: NaiveDate },

    #[error("Persistence failed: {0}")]
    Persistence(#[from] BackendError),

    #[error("A save for week offset {week_offset} is already in progress")]
    SaveInFlight { week_offset: i32 },

    #[error("No saved plan for the week starting {week_start} to copy from")]
    NothingToCopy { week_start: NaiveDate },
}

impl LedgerError {
    /// True when local state is intact and the caller can retry or correct
    /// input. Out-of-range access is a programming error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, LedgerError::OutOfRange { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_converts_into_ledger_error() {
        let err: LedgerError = ValidationError::EmptyMealName.into();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::EmptyMealName)
        ));
        assert_eq!(err.to_string(), "Meal name cannot be empty");
    }

    #[test]
    fn test_out_of_range_is_not_recoverable() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let err = LedgerError::OutOfRange {
            date: today.succ_opt().unwrap(),
            today,
        };
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("2024-06-11"));
    }

    #[test]
    fn test_persistence_is_recoverable() {
        let err: LedgerError = BackendError::Unavailable("timeout".to_string()).into();
        assert!(err.is_recoverable());
        assert!(err.to_string().starts_with("Persistence failed"));
    }
}
