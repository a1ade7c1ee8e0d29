use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Counting gate bounding the number of sink calls in flight.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    in_flight: Arc<AtomicUsize>,
    limit: usize,
}

impl ConcurrencyGate {
    /// Creates a gate admitting at most `limit` concurrent flushes.
    pub fn new(limit: usize) -> Self {
        assert!(limit > 0, "concurrency gate limit must be > 0");
        Self {
            in_flight: Arc::new(AtomicUsize::new(0)),
            limit,
        }
    }

    /// Takes a permit without blocking; `None` when the gate is saturated.
    pub fn try_acquire(&self) -> Option<FlushPermit> {
        self.in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.limit).then_some(current + 1)
            })
            .ok()
            .map(|_| FlushPermit {
                in_flight: self.in_flight.clone(),
            })
    }

    /// Polls every `poll` until a permit is available or `timeout` elapses.
    pub fn acquire_timeout(&self, timeout: Duration, poll: Duration) -> Option<FlushPermit> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(permit) = self.try_acquire() {
                return Some(permit);
            }
            if Instant::now() >= deadline {
                return None;
            }
            thread::sleep(poll);
        }
    }

    /// Polls until no permit is outstanding; returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration, poll: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.in_flight() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(poll);
        }
    }

    /// Permits currently held.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Maximum number of permits.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns true when every permit is held.
    pub fn is_saturated(&self) -> bool {
        self.in_flight() >= self.limit
    }
}

/// Outstanding sink call; dropping it releases the slot.
#[derive(Debug)]
pub struct FlushPermit {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for FlushPermit {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
