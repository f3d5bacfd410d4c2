//! Local wall-clock access, swappable for tests.

#[cfg(test)]
use std::sync::Mutex;

use chrono::{Local, NaiveDateTime};

/// Source of the current local date and time.
pub trait Clock: Send + Sync {
    /// Current local wall-clock time, without timezone.
    fn now(&self) -> NaiveDateTime;
}

/// Reads the runtime's local timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock frozen at a given instant until moved with [`FixedClock::set`].
#[cfg(test)]
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

#[cfg(test)]
impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock to `now`.
    pub fn set(&self, now: NaiveDateTime) {
        if let Ok(mut slot) = self.now.lock() {
            *slot = now;
        }
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// `YYYY-MM-DD` form of the local date, as stored in the reset marker.
pub fn date_key(now: NaiveDateTime) -> String {
    now.format("%Y-%m-%d").to_string()
}
