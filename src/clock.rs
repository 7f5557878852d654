//! Clocks bound to the ledger's named timezone.
//!
//! Every calendar-day decision (streaks, daily reset) and every hour-band
//! lookup goes through a `Clock`, so tests can pin time with `ManualClock`.

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Mutex;

use crate::ledger::lock;

pub trait Clock: Send + Sync {
    /// Current instant in the ledger's timezone.
    fn now(&self) -> DateTime<Tz>;

    fn now_utc(&self) -> DateTime<Utc> {
        self.now().with_timezone(&Utc)
    }

    /// Local calendar date.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// Local hour of day, 0–23.
    fn hour(&self) -> u32 {
        self.now().hour()
    }
}

/// Wall clock in a fixed named timezone.
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    tz: Tz,
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Tz>) -> Self {
        Self {
            tz: start.timezone(),
            now: Mutex::new(start.with_timezone(&Utc)),
        }
    }

    pub fn set(&self, to: DateTime<Tz>) {
        *lock(&self.now) = to.with_timezone(&Utc);
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Tz> {
        lock(&self.now).with_timezone(&self.tz)
    }
}
