//! Plate Core Library
//!
//! Weekly meal planning and a per-day calorie ledger, shared by Plate
//! applications.

pub mod backend;
pub mod catalog;
pub mod clock;
pub mod editing;
pub mod error;
pub mod greeting;
pub mod ledger;
pub mod models;
pub mod registry;
pub mod session;
pub mod store;
pub mod today;

pub use backend::{BackendError, MemoryBackend, PersistAck, PlanBackend};
pub use catalog::{parse_calories, MealCatalog};
pub use clock::{Clock, FixedClock, SystemClock};
pub use editing::PlanEditingSession;
pub use error::{LedgerError, ValidationError};
pub use greeting::{GreetingTimer, TimeOfDay};
pub use ledger::{
    CalorieLedger, CalorieReading, CalorieTarget, DateLabel, Direction, SelectionOutcome,
};
pub use models::{
    start_of_week, week_dates, week_offset_of, CompletionRecord, DaySlots, MealDefinition, MealId,
    MealTypeConfig, PlanStatus, TodaysMealItem, WeekPlan,
};
pub use registry::MealTypeRegistry;
pub use session::PlannerSession;
pub use store::{SaveReceipt, WeekPlanStore};
pub use today::{Progress, TodaysMeals, TodaysMealsSnapshot};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
