use std::fmt;

use chrono::NaiveDateTime;

/// Whole hours and minutes left until the next local midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Countdown {
    /// Whole hours left, 0 to 24.
    pub hours: i64,
    /// Remaining minutes, 0 to 59.
    pub minutes: i64,
}

impl Countdown {
    /// Time from `now` to the following midnight, truncated to whole minutes.
    pub fn until_midnight(now: NaiveDateTime) -> Self {
        let Some(next_midnight) = now
            .date()
            .succ_opt()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
        else {
            return Self::default();
        };

        let remaining = next_midnight - now;
        Self {
            hours: remaining.num_hours(),
            minutes: remaining.num_minutes() % 60,
        }
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ч {}м", self.hours, self.minutes)
    }
}
