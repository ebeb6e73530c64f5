//! Mock clocks and observers for testing.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use crate::core::Tuple;
use crate::errors::HarnessError;
use crate::pipeline::TupleObserver;
use crate::utils::Clock;

/// A clock that returns whatever it was last set to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Creates a clock reading `millis`.
    #[must_use]
    pub const fn new(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    /// Sets the reading.
    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    /// Advances the reading.
    pub fn advance(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> Result<i64, HarnessError> {
        Ok(self.millis.load(Ordering::SeqCst))
    }
}

/// A clock that fails after a number of successful reads.
#[derive(Debug)]
pub struct FailingClock {
    remaining: AtomicU64,
}

impl FailingClock {
    /// Creates a clock that always fails.
    #[must_use]
    pub const fn new() -> Self {
        Self::after(0)
    }

    /// Creates a clock that succeeds `reads` times, then fails.
    #[must_use]
    pub const fn after(reads: u64) -> Self {
        Self {
            remaining: AtomicU64::new(reads),
        }
    }
}

impl Default for FailingClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FailingClock {
    fn now_millis(&self) -> Result<i64, HarnessError> {
        let left = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match left {
            Ok(_) => Ok(1_700_000_000_000),
            Err(_) => Err(HarnessError::ClockUnavailable("clock failure injected".to_string())),
        }
    }
}

/// An observer that records every delivery.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    tuples: Mutex<Vec<Tuple>>,
    ended: Mutex<bool>,
}

impl RecordingObserver {
    /// Creates a new recording observer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the delivered tuples in arrival order.
    #[must_use]
    pub fn tuples(&self) -> Vec<Tuple> {
        self.tuples.lock().clone()
    }

    /// Returns the number of delivered tuples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tuples.lock().len()
    }

    /// Returns true if nothing was delivered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tuples.lock().is_empty()
    }

    /// Returns true if end-of-stream was delivered.
    #[must_use]
    pub fn ended(&self) -> bool {
        *self.ended.lock()
    }
}

impl TupleObserver for RecordingObserver {
    fn on_tuple(&self, tuple: &Tuple) {
        self.tuples.lock().push(tuple.clone());
    }

    fn on_end(&self) {
        *self.ended.lock() = true;
    }
}

/// An observer that blocks its delivery task on every tuple.
#[derive(Debug)]
pub struct BlockingObserver {
    delay: Duration,
    started: AtomicU64,
}

impl BlockingObserver {
    /// Creates an observer that sleeps `delay` per tuple.
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: AtomicU64::new(0),
        }
    }

    /// Returns how many callbacks have started.
    #[must_use]
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::SeqCst)
    }
}

impl TupleObserver for BlockingObserver {
    fn on_tuple(&self, _tuple: &Tuple) {
        self.started.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
    }
}
