//! Injectable time source.
//!
//! Every TTL comparison, heartbeat interval, and the daily trigger gate
//! go through a [`ClockSource`] rather than calling `Utc::now()`
//! directly, so tests can advance or freeze time deterministically.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// Abstraction over wall-clock time, analogous to the clock sources used
/// elsewhere in this codebase for dependency injection around time.
pub trait ClockSource: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the current UTC calendar date.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Default clock source backed by the real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed/advanceable clock for deterministic tests.
///
/// Stores milliseconds since the epoch in an atomic so a cloned handle
/// shared between a test and the component under test can both observe
/// and advance "now".
#[derive(Debug)]
pub struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    /// Creates a clock fixed at the given point in time.
    #[must_use]
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(time.timestamp_millis()),
        }
    }

    /// Advances the clock by `delta`, returning the new time.
    pub fn advance(&self, delta: chrono::Duration) -> DateTime<Utc> {
        let new_millis = self.millis.load(Ordering::SeqCst) + delta.num_milliseconds();
        self.millis.store(new_millis, Ordering::SeqCst);
        self.now()
    }

    /// Sets the clock to an absolute time.
    pub fn set(&self, time: DateTime<Utc>) {
        self.millis.store(time.timestamp_millis(), Ordering::SeqCst);
    }
}

impl ClockSource for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst))
            .expect("fixed clock millis always in range")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_returns_recent_time() {
        let before = Utc::now();
        let observed = SystemClock.now();
        let after = Utc::now();
        assert!(observed >= before && observed <= after);
    }

    #[test]
    fn fixed_clock_holds_time_until_advanced() {
        let base = Utc::now();
        let clock = FixedClock::at(base);
        assert_eq!(clock.now(), base);
        assert_eq!(clock.now(), base);
    }

    #[test]
    fn fixed_clock_advances_monotonically() {
        let base = Utc::now();
        let clock = FixedClock::at(base);
        let advanced = clock.advance(chrono::Duration::seconds(90));
        assert_eq!(advanced, base + chrono::Duration::seconds(90));
        assert_eq!(clock.now(), advanced);
    }

    #[test]
    fn today_reflects_calendar_date() {
        let base = "2026-07-27T23:59:00Z".parse::<DateTime<Utc>>().unwrap();
        let clock = FixedClock::at(base);
        assert_eq!(clock.today(), base.date_naive());

        clock.advance(chrono::Duration::minutes(2));
        assert_eq!(clock.today().to_string(), "2026-07-28");
    }
}
