use crate::buffer::{FlushNotification, NotificationType};
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by one event buffer.
#[derive(Debug, Default)]
pub struct BufferTelemetry {
    events_enqueued: AtomicU64,
    events_discarded: AtomicU64,
    events_flushed: AtomicU64,
    events_failed: AtomicU64,
    regular_notifications: AtomicU64,
    urgent_notifications: AtomicU64,
    flush_notifications: AtomicU64,
    unbuffered_notifications: AtomicU64,
    sink_failures: AtomicU64,
    flushes_skipped: AtomicU64,
}

impl BufferTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_enqueued(&self) {
        self.events_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.events_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a notification handed to the sink, whatever its outcome.
    pub fn record_notification(&self, notification: &FlushNotification) {
        self.events_flushed
            .fetch_add(notification.len() as u64, Ordering::Relaxed);
        let counter = match notification.notification_type {
            NotificationType::Regular => &self.regular_notifications,
            NotificationType::Urgent => &self.urgent_notifications,
            NotificationType::Flush => &self.flush_notifications,
            NotificationType::Unbuffered => &self.unbuffered_notifications,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sink_failure(&self, events: usize) {
        self.sink_failures.fetch_add(1, Ordering::Relaxed);
        self.events_failed
            .fetch_add(events as u64, Ordering::Relaxed);
    }

    pub fn record_skipped_flush(&self) {
        self.flushes_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Captures the counters together with the current gauges.
    pub fn snapshot(&self, queue_depth: usize, flushes_in_flight: usize) -> BufferMetrics {
        BufferMetrics {
            events_enqueued_total: self.events_enqueued.load(Ordering::Relaxed),
            events_discarded_total: self.events_discarded.load(Ordering::Relaxed),
            events_flushed_total: self.events_flushed.load(Ordering::Relaxed),
            events_failed_total: self.events_failed.load(Ordering::Relaxed),
            regular_notifications_total: self.regular_notifications.load(Ordering::Relaxed),
            urgent_notifications_total: self.urgent_notifications.load(Ordering::Relaxed),
            flush_notifications_total: self.flush_notifications.load(Ordering::Relaxed),
            unbuffered_notifications_total: self.unbuffered_notifications.load(Ordering::Relaxed),
            sink_failures_total: self.sink_failures.load(Ordering::Relaxed),
            flushes_skipped_total: self.flushes_skipped.load(Ordering::Relaxed),
            queue_depth,
            flushes_in_flight,
        }
    }
}

/// Point-in-time view of a buffer's counters, exported via `render_metrics`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BufferMetrics {
    pub events_enqueued_total: u64,
    pub events_discarded_total: u64,
    /// Events taken from the queue and handed to the sink, failed batches included.
    pub events_flushed_total: u64,
    pub events_failed_total: u64,
    pub regular_notifications_total: u64,
    pub urgent_notifications_total: u64,
    pub flush_notifications_total: u64,
    pub unbuffered_notifications_total: u64,
    pub sink_failures_total: u64,
    pub flushes_skipped_total: u64,
    pub queue_depth: usize,
    pub flushes_in_flight: usize,
}

impl BufferMetrics {
    pub fn notifications_total(&self) -> u64 {
        self.regular_notifications_total
            + self.urgent_notifications_total
            + self.flush_notifications_total
            + self.unbuffered_notifications_total
    }

    /// Prometheus text exposition, labelled with the buffer name.
    pub fn render_metrics(&self, buffer: &str) -> String {
        let mut out = String::new();
        let counters = [
            ("healthmon_events_enqueued_total", self.events_enqueued_total),
            ("healthmon_events_discarded_total", self.events_discarded_total),
            ("healthmon_events_flushed_total", self.events_flushed_total),
            ("healthmon_events_failed_total", self.events_failed_total),
            ("healthmon_sink_failures_total", self.sink_failures_total),
            ("healthmon_flushes_skipped_total", self.flushes_skipped_total),
        ];
        for (name, value) in counters {
            let _ = writeln!(out, "{name}{{buffer=\"{buffer}\"}} {value}");
        }
        let notifications = [
            (NotificationType::Regular, self.regular_notifications_total),
            (NotificationType::Urgent, self.urgent_notifications_total),
            (NotificationType::Flush, self.flush_notifications_total),
            (NotificationType::Unbuffered, self.unbuffered_notifications_total),
        ];
        for (kind, value) in notifications {
            let _ = writeln!(
                out,
                "healthmon_notifications_total{{buffer=\"{buffer}\",type=\"{kind}\"}} {value}"
            );
        }
        let _ = writeln!(
            out,
            "healthmon_queue_depth{{buffer=\"{buffer}\"}} {}",
            self.queue_depth
        );
        let _ = writeln!(
            out,
            "healthmon_flushes_in_flight{{buffer=\"{buffer}\"}} {}",
            self.flushes_in_flight
        );
        out
    }
}
