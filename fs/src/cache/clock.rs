//! Time keeping for cache slots.

use core::cell::Cell;

/// A point in time as seen by a [`TimeSource`].
///
/// Only the ordering matters to the cache; the unit is whatever the source
/// counts in (microseconds, ticks, accesses).
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// How long ago `self` was, seen from `now`.
    pub fn age(self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }
}

/// Things that can tell the cache what time it is.
///
/// Must be monotonic, the cache orders slots by it.
pub trait TimeSource {
    /// Returns the current time
    fn get_timestamp(&self) -> Timestamp;
}

/// A clock that advances by one on every reading.
///
/// Handy when there is no hardware timer around, and it makes eviction
/// order fully deterministic.
#[derive(Debug, Default)]
pub struct SequenceClock {
    counter: Cell<u64>,
}

impl SequenceClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimeSource for SequenceClock {
    fn get_timestamp(&self) -> Timestamp {
        let now = self.counter.get() + 1;
        self.counter.set(now);
        Timestamp(now)
    }
}

impl<T: TimeSource> TimeSource for &T {
    fn get_timestamp(&self) -> Timestamp {
        (**self).get_timestamp()
    }
}
