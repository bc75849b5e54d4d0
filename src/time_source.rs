//! Clock abstraction so "today", "tomorrow" and diagnostic delays can be pinned
//! in tests.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Mutex;

/// Trait for abstracting the current time
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System clock.
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
pub struct FixedTimeSource {
    current: Mutex<DateTime<Utc>>,
}

impl FixedTimeSource {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = time;
    }

    pub fn advance(&self, by: ChronoDuration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += by;
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
