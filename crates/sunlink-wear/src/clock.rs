use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, Timelike};
use parking_lot::Mutex;
use std::time::Duration;

/// Source of the time shown on the face.
///
/// Read on every frame, so a time-zone change shows up on the next draw.
pub trait WallClock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// The device's local time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: ChronoDuration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl WallClock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

/// Delay until the next whole wall-clock second.
pub fn delay_to_next_second(now: NaiveDateTime) -> Duration {
    let millis = u64::from(now.nanosecond() / 1_000_000 % 1000);
    Duration::from_millis(1000 - millis)
}
