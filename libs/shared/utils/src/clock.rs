use std::sync::RwLock;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

/// Source of "now". Injected wherever "today in clinic-local time" matters.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today_in(&self, tz: Tz) -> NaiveDate {
        self.now().with_timezone(&tz).date_naive()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: RwLock::new(now) }
    }

    /// Fixes the clock at a wall-clock time in `tz`. Falls back to treating the
    /// value as UTC when it does not exist in `tz`.
    pub fn at_local(tz: Tz, year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        let utc = Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).single()
            .unwrap_or_default();
        let local = tz.with_ymd_and_hms(year, month, day, hour, minute, 0).single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(utc);
        Self::new(local)
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.write() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
