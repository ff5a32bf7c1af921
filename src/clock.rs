//! Time seams for the poll loop: wall-clock reads and blocking pauses.

use std::time::Duration;

use chrono::{Local, NaiveDateTime};

/// Source of the local wall-clock time shown on the banner row.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Blocking pause used between polls and heartbeat ticks.
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Records requested pauses instead of blocking.
#[derive(Debug, Default, Clone)]
pub struct RecordingSleeper {
    pauses: Vec<Duration>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> &[Duration] {
        &self.pauses
    }

    pub fn total(&self) -> Duration {
        self.pauses.iter().sum()
    }

    pub fn clear(&mut self) {
        self.pauses.clear();
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&mut self, duration: Duration) {
        self.pauses.push(duration);
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_sleeper_sums_pauses() {
        let mut sleeper = RecordingSleeper::new();
        sleeper.sleep(Duration::from_millis(100));
        sleeper.sleep(Duration::from_millis(900));
        assert_eq!(sleeper.pauses().len(), 2);
        assert_eq!(sleeper.total(), Duration::from_secs(1));
        sleeper.clear();
        assert!(sleeper.pauses().is_empty());
    }
}
