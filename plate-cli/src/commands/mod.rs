mod calories;
mod config_cmd;
mod meals;
mod today;
mod types;
mod week;

pub use calories::CaloriesCommand;
pub use config_cmd::ConfigCommand;
pub use meals::MealsCommand;
pub use today::TodayCommand;
pub use types::TypesCommand;
pub use week::WeekCommand;

use chrono::NaiveDate;
use clap::ValueEnum;
use std::sync::Arc;

use plate_core::{
    CalorieTarget, MealCatalog, MealTypeRegistry, PlannerSession, SystemClock,
};

use crate::config::Config;
use crate::storage::LocalStore;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Builds a planner session over the configured data directory, restoring
/// saved meal type settings and custom meals.
pub fn open_session(
    config: &Config,
) -> Result<(PlannerSession<LocalStore>, Arc<LocalStore>), Box<dyn std::error::Error>> {
    let storage = Arc::new(LocalStore::new(config.data_dir.value.clone()));

    let registry = match storage.load_meal_types()? {
        Some(saved) => MealTypeRegistry::from_saved(&saved),
        None => MealTypeRegistry::with_defaults(),
    };

    let catalog = match &config.catalog_path.value {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read catalog '{}': {}", path.display(), e))?;
            MealCatalog::from_seed_json(&json)
                .map_err(|e| format!("Failed to parse catalog '{}': {}", path.display(), e))?
        }
        None => MealCatalog::with_defaults(),
    };
    catalog.restore_custom(storage.load_custom_meals()?);

    let target = CalorieTarget::new(config.calorie_target.value)?;
    let session = PlannerSession::new(
        Arc::new(registry),
        Arc::new(catalog),
        storage.clone(),
        Arc::new(SystemClock),
        target,
    )?;
    Ok((session, storage))
}

pub fn parse_date(input: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date format '{}'. Use YYYY-MM-DD.", input))
}
