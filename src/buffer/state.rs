use super::notification::{FlushNotification, NotificationCounter, NotificationType};
use super::queue::EventQueue;
use super::scheduler::{FlushScheduler, TimerState, UrgentDecision, GATE_RETRY_DELAY};
use crate::config::FlushModeConfig;
use crate::event::EventRecord;
use std::time::{Duration, Instant};

/// Result of adding a record to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    /// Record dropped from the head to make room.
    pub displaced: Option<EventRecord>,
    /// Drops accumulated since the last notification, this one included.
    pub discarded_pending: u64,
    pub depth: usize,
    pub urgent: Option<UrgentDecision>,
}

/// Result of a timer tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerOutcome {
    /// The armed timer is not due yet (or none is armed).
    NotDue,
    /// The timer fired with nothing queued.
    Empty { fired: NotificationType },
    /// No permit was available; the batch stays queued.
    GateSaturated {
        fired: NotificationType,
        queued: usize,
        retry: Option<UrgentDecision>,
    },
    Deliver {
        notification: FlushNotification,
        urgent: Option<UrgentDecision>,
    },
}

/// Everything one buffer mutates under its lock: queue, schedule and notification stamps.
#[derive(Debug)]
pub struct BufferState {
    config: FlushModeConfig,
    queue: EventQueue,
    scheduler: FlushScheduler,
    notifications: NotificationCounter,
    closed: bool,
}

impl BufferState {
    /// Creates state for a buffer started at `start`, arming the regular timer.
    pub fn new(config: FlushModeConfig, start: Instant) -> Self {
        let queue = EventQueue::new(config.max_buffer_size);
        let scheduler = FlushScheduler::new(&config, start);
        Self {
            config,
            queue,
            scheduler,
            notifications: NotificationCounter::new(),
            closed: false,
        }
    }

    /// Queues `record` and requests an urgent flush once the threshold is reached.
    pub fn add(&mut self, record: EventRecord, now: Instant) -> AddOutcome {
        let displaced = self.queue.enqueue(record);
        let depth = self.queue.len();
        let urgent = self
            .scheduler
            .on_enqueue(now, depth, self.config.urgent_flush_threshold);
        AddOutcome {
            displaced,
            discarded_pending: self.queue.discarded(),
            depth,
            urgent,
        }
    }

    /// Handles a timer tick at `now`; `gate_saturated` reports whether a permit was obtained.
    pub fn on_timer(&mut self, now: Instant, now_ms: u64, gate_saturated: bool) -> TimerOutcome {
        let Some(fired) = self.scheduler.fire(now) else {
            return TimerOutcome::NotDue;
        };
        if self.queue.is_empty() {
            return TimerOutcome::Empty { fired };
        }
        if gate_saturated {
            let queued = self.queue.len();
            let retry = (queued >= self.config.urgent_flush_threshold)
                .then(|| self.scheduler.request_urgent(now, GATE_RETRY_DELAY));
            return TimerOutcome::GateSaturated {
                fired,
                queued,
                retry,
            };
        }

        let batch = self.queue.dequeue_batch(self.config.max_flush_batch_size);
        let remaining = self.queue.len();
        self.scheduler.record_scheduled_flush(now);
        let urgent = (remaining >= self.config.urgent_flush_threshold)
            .then(|| self.scheduler.request_urgent(now, Duration::ZERO));
        let discarded = self.queue.take_discarded();
        let notification = self
            .notifications
            .next(batch, fired, discarded, remaining, now_ms);
        TimerOutcome::Deliver {
            notification,
            urgent,
        }
    }

    /// Takes the next batch for an explicit flush; `None` when the queue is empty.
    pub fn take_flush_batch(&mut self, now_ms: u64) -> Option<FlushNotification> {
        if self.queue.is_empty() {
            return None;
        }
        let batch = self.queue.dequeue_batch(self.config.max_flush_batch_size);
        let remaining = self.queue.len();
        let discarded = self.queue.take_discarded();
        Some(self.notifications.next(
            batch,
            NotificationType::Flush,
            discarded,
            remaining,
            now_ms,
        ))
    }

    /// Flush mode the buffer was created with.
    pub fn config(&self) -> &FlushModeConfig {
        &self.config
    }

    /// Current flush schedule.
    pub fn scheduler(&self) -> &FlushScheduler {
        &self.scheduler
    }

    /// Timer the flush thread should wait on.
    pub fn timer(&self) -> TimerState {
        self.scheduler.timer()
    }

    /// Number of queued records.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Sequence number of the most recent notification, 0 before the first.
    pub fn last_notification_sequence(&self) -> u64 {
        self.notifications.last_sequence()
    }

    /// Time of the last notification of any type, ms since the Unix epoch.
    pub fn last_flush_ms(&self) -> Option<u64> {
        self.notifications.last_notification_ms()
    }

    /// Marks the buffer closed; producers are rejected from now on.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Returns true once the buffer has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
