use super::record::{unix_millis, EventRecord, WebEvent};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::SystemTime;

/// Issues event sequence numbers and per-code occurrence counts.
///
/// One instance is owned by each monitor; nothing here is process-global, so
/// independent monitors (and tests) never observe each other's numbering.
#[derive(Debug, Default)]
pub struct EventCounters {
    sequence: AtomicU64,
    occurrences: Mutex<HashMap<u32, u64>>,
}

impl EventCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamps `event` with the next sequence number and its code's occurrence count.
    pub fn stamp(&self, event: WebEvent) -> EventRecord {
        self.stamp_at(event, SystemTime::now())
    }

    /// Same as [`stamp`](Self::stamp) with an explicit raise time.
    pub fn stamp_at(&self, event: WebEvent, raised_at: SystemTime) -> EventRecord {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let occurrence = {
            let mut guard = self
                .occurrences
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let count = guard.entry(event.code).or_insert(0);
            *count += 1;
            *count
        };
        EventRecord::new(sequence, occurrence, unix_millis(raised_at), event)
    }

    /// Last sequence number handed out (0 before the first event).
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Occurrences recorded so far for `code`.
    pub fn occurrences(&self, code: u32) -> u64 {
        self.occurrences
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&code)
            .copied()
            .unwrap_or(0)
    }
}
