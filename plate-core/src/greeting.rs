//! Time-of-day greeting and its refresh timer.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            _ => TimeOfDay::Evening,
        }
    }

    pub fn greeting(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "Good morning",
            TimeOfDay::Afternoon => "Good afternoon",
            TimeOfDay::Evening => "Good evening",
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.greeting())
    }
}

/// Republishes the time of day on a fixed period. The task is aborted when
/// the timer is stopped or dropped.
pub struct GreetingTimer {
    current: watch::Receiver<TimeOfDay>,
    task: JoinHandle<()>,
}

impl GreetingTimer {
    pub const DEFAULT_PERIOD: Duration = Duration::from_secs(60);

    /// Spawns the refresh task. Must be called inside a tokio runtime.
    pub fn start(clock: Arc<dyn Clock>, period: Duration) -> Self {
        let (tx, current) = watch::channel(TimeOfDay::from_hour(clock.hour()));

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let now = TimeOfDay::from_hour(clock.hour());
                tx.send_if_modified(|time_of_day| {
                    if *time_of_day == now {
                        return false;
                    }
                    tracing::debug!(time_of_day = ?now, "greeting changed");
                    *time_of_day = now;
                    true
                });
            }
        });

        Self { current, task }
    }

    pub fn current(&self) -> TimeOfDay {
        *self.current.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TimeOfDay> {
        self.current.clone()
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for GreetingTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
