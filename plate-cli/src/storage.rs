//! JSON file storage for the CLI.
//!
//! Layout under the data directory:
//! - `weeks/<monday>.json`: last saved plan of each week
//! - `completions/<date>.json`: eaten flags and total for a day
//! - `meal_types.json`: enabled flags of the meal types
//! - `custom_meals.json`: user-defined meals by meal type

use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use plate_core::{
    BackendError, CompletionRecord, MealDefinition, MealTypeConfig, PersistAck, PlanBackend,
    PlanStatus, WeekPlan,
};

const WEEKS_DIR: &str = "weeks";
const COMPLETIONS_DIR: &str = "completions";
const MEAL_TYPES_FILE: &str = "meal_types.json";
const CUSTOM_MEALS_FILE: &str = "custom_meals.json";

/// File-backed persistence rooted at a data directory.
#[derive(Clone, Debug)]
pub struct LocalStore {
    data_dir: PathBuf,
}

impl LocalStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn week_path(&self, week_start: NaiveDate) -> PathBuf {
        self.data_dir
            .join(WEEKS_DIR)
            .join(format!("{}.json", week_start))
    }

    pub fn completions_path(&self, date: NaiveDate) -> PathBuf {
        self.data_dir
            .join(COMPLETIONS_DIR)
            .join(format!("{}.json", date))
    }

    pub fn load_meal_types(&self) -> Result<Option<Vec<MealTypeConfig>>, StorageError> {
        read_json(&self.data_dir.join(MEAL_TYPES_FILE))
    }

    pub fn save_meal_types(&self, types: &[MealTypeConfig]) -> Result<(), StorageError> {
        write_json(&self.data_dir.join(MEAL_TYPES_FILE), types)
    }

    /// Custom meals by meal type; empty when none were saved.
    pub fn load_custom_meals(
        &self,
    ) -> Result<BTreeMap<String, Vec<MealDefinition>>, StorageError> {
        Ok(read_json(&self.data_dir.join(CUSTOM_MEALS_FILE))?.unwrap_or_default())
    }

    pub fn save_custom_meals(
        &self,
        meals: &BTreeMap<String, Vec<MealDefinition>>,
    ) -> Result<(), StorageError> {
        write_json(&self.data_dir.join(CUSTOM_MEALS_FILE), meals)
    }
}

/// Reads a JSON file, returning `None` if it does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    parse_json(path, fs::read_to_string(path))
}

/// Writes a JSON file, creating its directory if needed.
fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::IoError(parent.to_path_buf(), e))?;
    }
    let json = to_json(path, value)?;
    fs::write(path, json).map_err(|e| StorageError::IoError(path.to_path_buf(), e))
}

/// [`read_json`] on the runtime's blocking pool, for the backend's async paths.
async fn read_json_async<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    parse_json(path, tokio::fs::read_to_string(path).await)
}

async fn write_json_async<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StorageError::IoError(parent.to_path_buf(), e))?;
    }
    let json = to_json(path, value)?;
    tokio::fs::write(path, json)
        .await
        .map_err(|e| StorageError::IoError(path.to_path_buf(), e))
}

fn parse_json<T: DeserializeOwned>(
    path: &Path,
    contents: io::Result<String>,
) -> Result<Option<T>, StorageError> {
    match contents {
        Ok(contents) => {
            let value = serde_json::from_str(&contents)
                .map_err(|e| StorageError::LoadError(path.to_path_buf(), e.to_string()))?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::IoError(path.to_path_buf(), e)),
    }
}

fn to_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<String, StorageError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| StorageError::LoadError(path.to_path_buf(), e.to_string()))
}

impl PlanBackend for LocalStore {
    async fn persist_week_plan(
        &self,
        week_offset: i32,
        plan: &WeekPlan,
    ) -> Result<PersistAck, BackendError> {
        let saved_at = Utc::now();
        let mut stored = plan.clone();
        stored.week_offset = week_offset;
        stored.status = PlanStatus::Clean;
        stored.last_saved_at = Some(saved_at);

        write_json_async(&self.week_path(plan.week_start), &stored).await?;
        tracing::debug!(week_start = %plan.week_start, "week plan written");

        Ok(PersistAck {
            saved_at,
            acknowledged: true,
        })
    }

    async fn load_week_plan(
        &self,
        week_start: NaiveDate,
    ) -> Result<Option<WeekPlan>, BackendError> {
        Ok(read_json_async(&self.week_path(week_start)).await?)
    }

    async fn fetch_calories_for_date(&self, date: NaiveDate) -> Result<u32, BackendError> {
        let record: Option<CompletionRecord> =
            read_json_async(&self.completions_path(date)).await?;
        Ok(record.map_or(0, |r| r.total_calories))
    }

    async fn persist_completions(&self, record: &CompletionRecord) -> Result<(), BackendError> {
        write_json_async(&self.completions_path(record.date), record).await?;
        Ok(())
    }

    async fn load_completions(
        &self,
        date: NaiveDate,
    ) -> Result<Option<CompletionRecord>, BackendError> {
        Ok(read_json_async(&self.completions_path(date)).await?)
    }
}

/// Errors that can occur reading or writing data files.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error reading or writing a file.
    IoError(PathBuf, io::Error),
    /// The file exists but is not valid JSON for its type.
    LoadError(PathBuf, String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            StorageError::LoadError(path, e) => {
                write!(f, "Failed to load {}: {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::IoError(_, e) => Some(e),
            StorageError::LoadError(_, _) => None,
        }
    }
}

impl From<StorageError> for BackendError {
    fn from(e: StorageError) -> Self {
        BackendError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plate_core::{MealTypeRegistry, TodaysMealItem};
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_store() -> (LocalStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path().to_path_buf());
        (store, temp_dir)
    }

    #[test]
    fn test_paths() {
        let (store, _temp) = test_store();
        assert!(store
            .week_path(date(2024, 6, 10))
            .ends_with("weeks/2024-06-10.json"));
        assert!(store
            .completions_path(date(2024, 6, 12))
            .ends_with("completions/2024-06-12.json"));
    }

    #[tokio::test]
    async fn test_missing_files_are_empty() {
        let (store, _temp) = test_store();

        assert!(store.load_meal_types().unwrap().is_none());
        assert!(store.load_custom_meals().unwrap().is_empty());
        assert!(store.load_week_plan(date(2024, 6, 10)).await.unwrap().is_none());
        assert_eq!(store.fetch_calories_for_date(date(2024, 6, 9)).await, Ok(0));
    }

    #[tokio::test]
    async fn test_week_plan_written_clean() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path().join("nested").join("data"));
        let keys = MealTypeRegistry::with_defaults().keys();
        let plan = WeekPlan::empty(date(2024, 6, 12), 0, &keys).unwrap();

        let ack = store.persist_week_plan(0, &plan).await.unwrap();
        assert!(ack.acknowledged);

        let loaded = store.load_week_plan(date(2024, 6, 10)).await.unwrap().unwrap();
        assert_eq!(loaded.status, PlanStatus::Clean);
        assert_eq!(loaded.last_saved_at, Some(ack.saved_at));
        assert_eq!(loaded.dates(), plan.dates());
    }

    #[tokio::test]
    async fn test_fetch_reads_completions_total() {
        let (store, _temp) = test_store();
        let day = date(2024, 6, 9);
        let item = TodaysMealItem {
            completed: true,
            ..TodaysMealItem::new(day, "lunch", MealDefinition::new(10, "Salad", 350))
        };
        let record = CompletionRecord {
            date: day,
            items: vec![item],
            total_calories: 350,
            saved_at: Utc::now(),
        };

        store.persist_completions(&record).await.unwrap();
        assert_eq!(store.fetch_calories_for_date(day).await, Ok(350));
        assert_eq!(store.load_completions(day).await.unwrap(), Some(record));
    }

    #[test]
    fn test_corrupt_file_is_load_error() {
        let (store, temp) = test_store();
        fs::write(temp.path().join(MEAL_TYPES_FILE), "{not json").unwrap();

        let err = store.load_meal_types().unwrap_err();
        assert!(matches!(err, StorageError::LoadError(_, _)));
        assert!(err.to_string().contains("meal_types.json"));
    }

    #[tokio::test]
    async fn test_corrupt_week_file_is_backend_error() {
        let (store, _temp) = test_store();
        let path = store.week_path(date(2024, 6, 10));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "[1, 2").unwrap();

        match store.load_week_plan(date(2024, 6, 10)).await {
            Err(BackendError::Storage(message)) => assert!(message.contains("2024-06-10.json")),
            other => panic!("expected a storage error, got {:?}", other),
        }
    }

    #[test]
    fn test_settings_persist() {
        let (store, _temp) = test_store();
        let registry = MealTypeRegistry::with_defaults();
        registry.set_enabled("supper", true);
        store.save_meal_types(&registry.list()).unwrap();

        let mut custom = BTreeMap::new();
        custom.insert(
            "dinner".to_string(),
            vec![MealDefinition::custom(40, "Stir Fry", 600)],
        );
        store.save_custom_meals(&custom).unwrap();

        let restored = MealTypeRegistry::from_saved(&store.load_meal_types().unwrap().unwrap());
        assert!(restored.enabled_keys().contains("supper"));
        assert_eq!(store.load_custom_meals().unwrap(), custom);
    }
}
