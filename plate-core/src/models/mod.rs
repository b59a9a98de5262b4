mod meal;
mod meal_type;
mod todays_meal;
mod week_plan;

pub use meal::{MealDefinition, MealId};
pub use meal_type::{default_meal_types, MealTypeConfig};
pub use todays_meal::{CompletionRecord, TodaysMealItem};
pub use week_plan::{
    start_of_week, week_dates, week_offset_of, DaySlots, PlanStatus, WeekPlan,
};
