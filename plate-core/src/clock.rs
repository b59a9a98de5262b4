//! Time sources.
//!
//! Every "today" in the ledger comes from a [`Clock`], so tests can pin the
//! date and move it across week boundaries.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use std::sync::{Mutex, PoisonError};

pub trait Clock: Send + Sync {
    /// Current instant, used for save timestamps.
    fn now(&self) -> DateTime<Utc>;

    /// Current local calendar date.
    fn today(&self) -> NaiveDate;

    /// Current local hour (0-23).
    fn hour(&self) -> u32;
}

/// The real wall clock in the local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn hour(&self) -> u32 {
        Local::now().hour()
    }
}

/// A settable clock. Local time is treated as UTC.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// A clock pinned to noon on `date`.
    pub fn on(date: NaiveDate) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::MIN) + Duration::hours(12))
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    fn local(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.local())
    }

    fn today(&self) -> NaiveDate {
        self.local().date()
    }

    fn hour(&self) -> u32 {
        self.local().hour()
    }
}
