//! Time sources for entry stamping

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

/// Source of the current wall-clock time
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
///
/// Lets tests age cache entries without sleeping.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Create a clock frozen at the current system time
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Move the clock forward, saturating at the maximum representable time
    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = self.now.lock();
        *now = now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    /// Jump to an absolute time
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let start = Utc::now();
        let clock = ManualClock::new(start);

        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.now() - start, TimeDelta::seconds(90));
    }

    #[test]
    fn test_manual_clock_saturates() {
        let clock = ManualClock::starting_now();
        clock.advance(Duration::MAX);
        assert_eq!(clock.now(), DateTime::<Utc>::MAX_UTC);
    }
}
