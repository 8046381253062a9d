use crate::types::{Date, TimeStamp};
use chrono::{DateTime, Utc};
use std::sync::RwLock;

/// Source of "now". Injected so accrual and issue dates can be pinned in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> TimeStamp<Utc>;

    fn today(&self) -> Date {
        self.now().date()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimeStamp<Utc> {
        TimeStamp::new()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock(RwLock<DateTime<Utc>>);

impl FixedClock {
    pub fn new(at: TimeStamp<Utc>) -> Self {
        Self(RwLock::new(at.to_datetime_utc()))
    }

    pub fn set(&self, at: TimeStamp<Utc>) {
        let mut guard = self.0.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = at.to_datetime_utc();
    }
}

impl Clock for FixedClock {
    fn now(&self) -> TimeStamp<Utc> {
        let guard = self.0.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        TimeStamp::from(*guard)
    }
}
