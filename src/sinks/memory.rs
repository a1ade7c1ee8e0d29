use crate::buffer::{FlushNotification, FlushSink, SinkError};
use crate::event::EventRecord;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// Keeps every notification it receives; used for diagnostics and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    notifications: Mutex<Vec<FlushNotification>>,
    delay: Option<Duration>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for `delay` inside every call, simulating a slow transport.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn notifications(&self) -> Vec<FlushNotification> {
        self.lock().clone()
    }

    /// All delivered records in delivery order.
    pub fn events(&self) -> Vec<EventRecord> {
        self.lock()
            .iter()
            .flat_map(|notification| notification.events.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn event_count(&self) -> usize {
        self.lock().iter().map(FlushNotification::len).sum()
    }

    /// Highest number of simultaneous `on_flush` calls observed.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<FlushNotification>> {
        self.notifications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl FlushSink for MemorySink {
    fn on_flush(&self, notification: &FlushNotification) -> Result<(), SinkError> {
        let active = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_active.fetch_max(active, Ordering::AcqRel);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        self.lock().push(notification.clone());
        self.active.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }
}
