//! # Clocks
//!
//! Deadline evaluation and history stamping read the time through the
//! [`Clock`] trait so tests and replays can pin it.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::temporal::Timestamp;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A manually driven clock.
#[derive(Debug)]
pub struct FixedClock {
    epoch_secs: AtomicI64,
}

impl FixedClock {
    /// A clock pinned at `at`.
    pub fn new(at: Timestamp) -> Self {
        Self {
            epoch_secs: AtomicI64::new(at.epoch_secs()),
        }
    }

    /// Move the clock to `at`.
    pub fn set(&self, at: Timestamp) {
        self.epoch_secs.store(at.epoch_secs(), Ordering::SeqCst);
    }

    /// Move the clock forward by whole days.
    pub fn advance_days(&self, days: i64) {
        self.epoch_secs.fetch_add(days * 86_400, Ordering::SeqCst);
    }

    /// Move the clock forward by seconds.
    pub fn advance_secs(&self, secs: i64) {
        self.epoch_secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        let secs = self.epoch_secs.load(Ordering::SeqCst);
        // Only in-range values are ever stored: they come from valid timestamps.
        Timestamp::from_epoch_secs(secs).unwrap_or_else(|_| Timestamp::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let start = Timestamp::parse("2026-02-01T08:00:00Z").unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance_days(3);
        assert_eq!(clock.now().to_iso8601(), "2026-02-04T08:00:00Z");
        clock.advance_secs(30);
        assert_eq!(clock.now().to_iso8601(), "2026-02-04T08:00:30Z");
        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn system_clock_is_recent() {
        let a = SystemClock.now();
        let b = Timestamp::now();
        assert!(b.epoch_secs() - a.epoch_secs() < 5);
    }
}
