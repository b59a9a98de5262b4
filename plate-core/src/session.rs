//! One planner session: the components wired together over a shared
//! backend and clock.

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::PlanBackend;
use crate::catalog::MealCatalog;
use crate::clock::Clock;
use crate::editing::PlanEditingSession;
use crate::error::LedgerError;
use crate::greeting::{GreetingTimer, TimeOfDay};
use crate::ledger::{CalorieLedger, CalorieTarget};
use crate::registry::MealTypeRegistry;
use crate::store::{SaveReceipt, WeekPlanStore};
use crate::today::TodaysMeals;

pub struct PlannerSession<B> {
    registry: Arc<MealTypeRegistry>,
    catalog: Arc<MealCatalog>,
    clock: Arc<dyn Clock>,
    store: WeekPlanStore<B>,
    today: TodaysMeals<B>,
    ledger: CalorieLedger<B>,
    greeting: Option<GreetingTimer>,
}

impl<B> PlannerSession<B> {
    pub fn new(
        registry: Arc<MealTypeRegistry>,
        catalog: Arc<MealCatalog>,
        backend: Arc<B>,
        clock: Arc<dyn Clock>,
        target: CalorieTarget,
    ) -> Result<Self, LedgerError> {
        let store = WeekPlanStore::new(registry.clone(), backend.clone(), clock.clone())?;
        let today = TodaysMeals::new(registry.clone(), backend.clone(), clock.clone());
        let ledger = CalorieLedger::new(backend, clock.clone(), today.subscribe(), target);

        Ok(Self {
            registry,
            catalog,
            clock,
            store,
            today,
            ledger,
            greeting: None,
        })
    }

    pub fn registry(&self) -> &MealTypeRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &MealCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &WeekPlanStore<B> {
        &self.store
    }

    pub fn today(&self) -> &TodaysMeals<B> {
        &self.today
    }

    pub fn ledger(&self) -> &CalorieLedger<B> {
        &self.ledger
    }

    pub fn edit(
        &self,
        date: NaiveDate,
        meal_type: &str,
    ) -> Result<PlanEditingSession<'_, B>, LedgerError> {
        PlanEditingSession::open(&self.store, &self.catalog, date, meal_type)
    }

    /// Starts the greeting refresher. Needs a running tokio runtime.
    pub fn start_greeting(&mut self, period: Duration) -> TimeOfDay {
        let timer = GreetingTimer::start(self.clock.clone(), period);
        let current = timer.current();
        self.greeting = Some(timer);
        current
    }

    pub fn greeting(&self) -> TimeOfDay {
        match &self.greeting {
            Some(timer) => timer.current(),
            None => TimeOfDay::from_hour(self.clock.hour()),
        }
    }

    /// Drops in-flight fetch results and stops the greeting timer.
    pub fn teardown(&mut self) {
        self.ledger.teardown();
        if let Some(timer) = self.greeting.take() {
            timer.stop();
        }
        tracing::debug!("planner session torn down");
    }
}

impl<B: PlanBackend> PlannerSession<B> {
    /// Loads the current week and seeds today's meals from it.
    pub async fn start(&self) -> Result<(), LedgerError> {
        let plan = self.store.load_week(0).await?;
        self.today.load(&plan).await
    }

    /// Saves the current week. When the saved snapshot contains today,
    /// today's meals are rebuilt from its cells, regardless of navigation or
    /// edits that happened while the save was in flight.
    pub async fn save_week(&self) -> Result<SaveReceipt, LedgerError> {
        let receipt = self.store.save().await?;

        let today = self.clock.today();
        if let Some(saved) = self.store.saved_week(receipt.week_start) {
            if let Some(slots) = saved.day(today) {
                self.today.sync_from_plan(today, slots);
            }
        }
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::clock::FixedClock;
    use crate::ledger::CalorieReading;
    use crate::models::{CompletionRecord, MealId, TodaysMealItem, WeekPlan};
    use chrono::Utc;
    use tokio::sync::Notify;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session(today: NaiveDate, backend: MemoryBackend) -> PlannerSession<MemoryBackend> {
        PlannerSession::new(
            Arc::new(MealTypeRegistry::with_defaults()),
            Arc::new(MealCatalog::with_defaults()),
            Arc::new(backend),
            Arc::new(FixedClock::on(today)),
            CalorieTarget::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_start_seeds_today_from_saved_week() {
        let today = date(2024, 6, 10);
        let keys = MealTypeRegistry::with_defaults().keys();
        let catalog = MealCatalog::with_defaults();
        let oats = catalog.find("breakfast", MealId(1)).unwrap();

        let mut saved = WeekPlan::empty(today, 0, &keys).unwrap();
        saved.set_slot(today, "breakfast", Some(oats.clone()));
        let completions = CompletionRecord {
            date: today,
            items: vec![TodaysMealItem {
                completed: true,
                ..TodaysMealItem::new(today, "breakfast", oats)
            }],
            total_calories: 250,
            saved_at: Utc::now(),
        };
        let backend = MemoryBackend::new()
            .with_week(saved)
            .with_completions(completions);

        let session = session(today, backend);
        session.start().await.unwrap();

        assert_eq!(session.today().items().len(), 1);
        assert_eq!(
            session.ledger().consumed_calories(today).await,
            Ok(CalorieReading::Live(250))
        );
    }

    #[tokio::test]
    async fn test_edit_save_and_track_today() {
        let today = date(2024, 6, 10);
        let session = session(today, MemoryBackend::new());
        session.start().await.unwrap();

        let mut edit = session.edit(today, "breakfast").unwrap();
        edit.select(MealId(1)).unwrap();
        edit.commit_selected().unwrap();
        let mut edit = session.edit(today, "dinner").unwrap();
        edit.select(MealId(23)).unwrap();
        edit.commit_selected().unwrap();

        // Today's list only changes once the plan is saved
        assert!(session.today().items().is_empty());
        let receipt = session.save_week().await.unwrap();
        assert_eq!(receipt.total_assigned_meals, 2);
        assert_eq!(session.today().items().len(), 2);

        session.today().toggle("2024-06-10-breakfast").unwrap();
        session.today().toggle("2024-06-10-dinner").unwrap();
        assert_eq!(
            session.ledger().consumed_calories(today).await,
            Ok(CalorieReading::Live(770))
        );
    }

    #[tokio::test]
    async fn test_saving_other_week_leaves_today_alone() {
        let today = date(2024, 6, 10);
        let session = session(today, MemoryBackend::new());
        session.start().await.unwrap();

        session.store().resolve_week(1).unwrap();
        session
            .edit(date(2024, 6, 17), "lunch")
            .unwrap()
            .commit(session.catalog().find("lunch", MealId(10)).unwrap())
            .unwrap();
        session.save_week().await.unwrap();

        assert!(session.today().items().is_empty());
    }

    #[tokio::test]
    async fn test_today_resynced_when_navigating_during_save() {
        let today = date(2024, 6, 10);
        let backend = MemoryBackend::new();
        let gate = Arc::new(Notify::new());
        backend.hold_saves(gate.clone());
        let session = session(today, backend);
        session.start().await.unwrap();

        let mut edit = session.edit(today, "breakfast").unwrap();
        edit.select(MealId(1)).unwrap();
        edit.commit_selected().unwrap();

        let (receipt, _) = tokio::join!(session.save_week(), async {
            session.store().resolve_week(1).unwrap();
            gate.notify_one();
        });

        assert_eq!(receipt.unwrap().week_start, today);
        assert_eq!(session.store().current().week_start, date(2024, 6, 17));
        assert_eq!(session.today().items().len(), 1);
        assert_eq!(session.today().items()[0].meal_type, "breakfast");
    }

    #[tokio::test]
    async fn test_today_resynced_from_saved_cells_not_later_edits() {
        let today = date(2024, 6, 10);
        let backend = MemoryBackend::new();
        let gate = Arc::new(Notify::new());
        backend.hold_saves(gate.clone());
        let session = session(today, backend);
        session.start().await.unwrap();

        let mut edit = session.edit(today, "breakfast").unwrap();
        edit.select(MealId(1)).unwrap();
        edit.commit_selected().unwrap();

        let (receipt, _) = tokio::join!(session.save_week(), async {
            let mut edit = session.edit(today, "dinner").unwrap();
            edit.select(MealId(23)).unwrap();
            edit.commit_selected().unwrap();
            gate.notify_one();
        });

        assert_eq!(receipt.unwrap().total_assigned_meals, 1);
        assert!(session.store().is_dirty());
        let items = session.today().items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].meal_type, "breakfast");
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_stops_greeting() {
        let mut session = session(date(2024, 6, 10), MemoryBackend::new());
        assert_eq!(session.start_greeting(Duration::from_secs(60)), TimeOfDay::Afternoon);
        assert_eq!(session.greeting(), TimeOfDay::Afternoon);

        session.teardown();
        assert_eq!(session.greeting(), TimeOfDay::Afternoon);
        assert!(session.greeting.is_none());
    }
}
