use crate::event::EventRecord;
use serde::Serialize;
use std::fmt;

/// Why a batch was handed to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Regular,
    Urgent,
    Flush,
    Unbuffered,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::Regular => "regular",
            NotificationType::Urgent => "urgent",
            NotificationType::Flush => "flush",
            NotificationType::Unbuffered => "unbuffered",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One batch delivered to a sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlushNotification {
    pub events: Vec<EventRecord>,
    pub notification_type: NotificationType,
    /// Strictly increasing per buffer, across every notification type.
    pub sequence: u64,
    /// Time of the previous notification, ms since the Unix epoch.
    pub last_notification_ms: Option<u64>,
    pub discarded_since_last_notification: u64,
    /// Events still queued after this batch was taken.
    pub events_in_buffer: usize,
}

impl FlushNotification {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Issues notification sequence numbers and remembers the previous notification time.
#[derive(Debug, Clone, Default)]
pub struct NotificationCounter {
    sequence: u64,
    last_notification_ms: Option<u64>,
}

impl NotificationCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the next notification; must be called under the owning buffer's lock.
    pub fn next(
        &mut self,
        events: Vec<EventRecord>,
        notification_type: NotificationType,
        discarded_since_last_notification: u64,
        events_in_buffer: usize,
        now_ms: u64,
    ) -> FlushNotification {
        self.sequence += 1;
        let last_notification_ms = self.last_notification_ms.replace(now_ms);
        FlushNotification {
            events,
            notification_type,
            sequence: self.sequence,
            last_notification_ms,
            discarded_since_last_notification,
            events_in_buffer,
        }
    }

    pub fn last_sequence(&self) -> u64 {
        self.sequence
    }

    pub fn last_notification_ms(&self) -> Option<u64> {
        self.last_notification_ms
    }
}
