use crate::buffer::{FlushNotification, FlushSink, NotificationType, SinkError};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Segment rotation limits (default 64 MiB × 10 segments).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    pub max_bytes: usize,
    pub max_files: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 64 << 20,
            max_files: 10,
        }
    }
}

/// Lines written to one segment before it was rotated out.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineSegment {
    lines: Vec<String>,
    bytes_written: usize,
}

impl LineSegment {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }
}

#[derive(Debug, Default)]
struct Segments {
    rotated: VecDeque<LineSegment>,
    active: LineSegment,
}

/// Serializes each record as one JSON line, rotating segments by size.
#[derive(Debug)]
pub struct JsonLinesSink {
    policy: RotationPolicy,
    segments: Mutex<Segments>,
}

impl JsonLinesSink {
    pub fn new(policy: RotationPolicy) -> Self {
        Self {
            policy,
            segments: Mutex::new(Segments::default()),
        }
    }

    pub fn policy(&self) -> RotationPolicy {
        self.policy
    }

    /// Retained rotated segments followed by the active one.
    pub fn segments(&self) -> Vec<LineSegment> {
        let guard = self.segments.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .rotated
            .iter()
            .chain(std::iter::once(&guard.active))
            .cloned()
            .collect()
    }

    /// Every retained line, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.segments()
            .into_iter()
            .flat_map(|segment| segment.lines)
            .collect()
    }

    fn append(&self, segments: &mut Segments, line: String) {
        if segments.active.bytes_written + line.len() > self.policy.max_bytes
            && !segments.active.lines.is_empty()
        {
            segments.rotated.push_back(std::mem::take(&mut segments.active));
            while segments.rotated.len() > self.policy.max_files {
                segments.rotated.pop_front();
            }
        }
        segments.active.bytes_written = segments.active.bytes_written.saturating_add(line.len());
        segments.active.lines.push(line);
    }
}

impl Default for JsonLinesSink {
    fn default() -> Self {
        Self::new(RotationPolicy::default())
    }
}

impl FlushSink for JsonLinesSink {
    fn on_flush(&self, notification: &FlushNotification) -> Result<(), SinkError> {
        let lines = notification
            .events
            .iter()
            .map(|record| {
                serde_json::to_string(&EventLine {
                    ts: record.raised_at_ms(),
                    sequence: record.sequence(),
                    occurrence: record.occurrence(),
                    code: record.code(),
                    detail_code: record.event().detail_code,
                    category: record.category().as_str(),
                    message: record.message(),
                    source: record.event().source.as_deref(),
                    notification: notification.sequence,
                    notification_type: notification.notification_type,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut guard = self.segments.lock().unwrap_or_else(PoisonError::into_inner);
        for line in lines {
            self.append(&mut guard, line);
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct EventLine<'a> {
    ts: u64,
    sequence: u64,
    occurrence: u64,
    code: u32,
    detail_code: u32,
    category: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    notification: u64,
    notification_type: NotificationType,
}
