use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

/// Source of the evaluation instant.
///
/// Services never read ambient system time directly so expiry checks stay
/// deterministic under test.
pub trait Clock: Send + Sync {
    /// Returns the current UTC instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replay tooling.
#[derive(Debug)]
pub struct FixedClock {
    instant: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    /// Creates a clock pinned at the given instant.
    #[must_use]
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self {
            instant: RwLock::new(instant),
        }
    }

    /// Moves the clock to a new instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        match self.instant.write() {
            Ok(mut guard) => *guard = instant,
            Err(poisoned) => *poisoned.into_inner() = instant,
        }
    }

    /// Moves the clock forward by the given duration.
    pub fn advance(&self, duration: Duration) {
        let next = self.now() + duration;
        self.set(next);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.instant.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{Clock, FixedClock};

    #[test]
    fn fixed_clock_advances_on_demand() {
        let start = Utc
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(|| unreachable!());
        let clock = FixedClock::new(start);

        clock.advance(Duration::minutes(5));

        assert_eq!(clock.now(), start + Duration::minutes(5));
    }
}
