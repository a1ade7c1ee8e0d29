use super::codes::{self, UNDEFINED_DETAIL_CODE};
use super::formatter::EventFormatter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Coarse classification of a raised event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Base,
    Management,
    Heartbeat,
    ApplicationLifetime,
    Request,
    Error,
    RequestError,
    Audit,
    SuccessAudit,
    FailureAudit,
}

impl EventCategory {
    /// Derives the category from a well-known code; custom codes map to `Base`.
    pub fn from_code(code: u32) -> Self {
        match code {
            codes::APPLICATION_HEARTBEAT => EventCategory::Heartbeat,
            codes::APPLICATION_START..=codes::APPLICATION_COMPILATION_END => {
                EventCategory::ApplicationLifetime
            }
            codes::REQUEST_TRANSACTION_COMPLETE..=codes::REQUEST_TRANSACTION_ABORT => {
                EventCategory::Request
            }
            codes::RUNTIME_ERROR_REQUEST_ABORT..=codes::RUNTIME_ERROR_UNHANDLED_EXCEPTION => {
                EventCategory::RequestError
            }
            codes::WEB_ERROR_PARSER_ERROR..=codes::WEB_ERROR_OTHER_ERROR => EventCategory::Error,
            codes::AUDIT_FORMS_AUTHENTICATION_SUCCESS..=codes::AUDIT_FILE_AUTHORIZATION_SUCCESS => {
                EventCategory::SuccessAudit
            }
            code if codes::is_failure_audit(code) => EventCategory::FailureAudit,
            codes::MISC_CODE_BASE..=6999 => EventCategory::Management,
            _ => EventCategory::Base,
        }
    }

    /// Severity used when the event is written to diagnostic traces.
    pub fn severity(self) -> Severity {
        match self {
            EventCategory::Error
            | EventCategory::RequestError
            | EventCategory::FailureAudit => Severity::Warning,
            EventCategory::Audit | EventCategory::SuccessAudit => Severity::Information,
            _ => Severity::Verbose,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventCategory::Base => "base",
            EventCategory::Management => "management",
            EventCategory::Heartbeat => "heartbeat",
            EventCategory::ApplicationLifetime => "application_lifetime",
            EventCategory::Request => "request",
            EventCategory::Error => "error",
            EventCategory::RequestError => "request_error",
            EventCategory::Audit => "audit",
            EventCategory::SuccessAudit => "success_audit",
            EventCategory::FailureAudit => "failure_audit",
        }
    }
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trace verbosity inferred from the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Verbose,
    Information,
    Warning,
}

/// Event as raised by a producer, before it is stamped with sequence numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebEvent {
    pub code: u32,
    pub detail_code: u32,
    pub category: EventCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl WebEvent {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            detail_code: UNDEFINED_DETAIL_CODE,
            category: EventCategory::from_code(code),
            message: message.into(),
            source: None,
            details: BTreeMap::new(),
        }
    }

    /// Periodic liveness event raised by the heartbeat timer.
    pub fn heartbeat() -> Self {
        Self::new(codes::APPLICATION_HEARTBEAT, "Application heartbeat.")
    }

    pub fn with_detail_code(mut self, detail_code: u32) -> Self {
        self.detail_code = detail_code;
        self
    }

    pub fn with_category(mut self, category: EventCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn is_custom(&self) -> bool {
        !codes::is_system_code(self.code)
    }
}

/// Immutable record handed to providers: the event plus its sequence stamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    sequence: u64,
    occurrence: u64,
    raised_at_ms: u64,
    event: WebEvent,
}

impl EventRecord {
    pub(crate) fn new(sequence: u64, occurrence: u64, raised_at_ms: u64, event: WebEvent) -> Self {
        Self {
            sequence,
            occurrence,
            raised_at_ms,
            event,
        }
    }

    /// Position of this event among every event raised through the same counters.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// How many times this event code has been raised, this one included.
    pub fn occurrence(&self) -> u64 {
        self.occurrence
    }

    /// Raise time in milliseconds since the Unix epoch.
    pub fn raised_at_ms(&self) -> u64 {
        self.raised_at_ms
    }

    pub fn event(&self) -> &WebEvent {
        &self.event
    }

    pub fn code(&self) -> u32 {
        self.event.code
    }

    pub fn category(&self) -> EventCategory {
        self.event.category
    }

    pub fn message(&self) -> &str {
        &self.event.message
    }

    /// Writes the human-readable block used by text sinks.
    pub fn format_to(&self, formatter: &mut EventFormatter) {
        formatter.append_line(format!("Event code: {}", self.event.code));
        formatter.append_line(format!("Event message: {}", self.event.message));
        formatter.append_line(format!("Event time (ms since epoch): {}", self.raised_at_ms));
        formatter.append_line(format!("Event sequence: {}", self.sequence));
        formatter.append_line(format!("Event occurrence: {}", self.occurrence));
        formatter.append_line(format!("Event detail code: {}", self.event.detail_code));
        formatter.append_line(format!("Event category: {}", self.event.category));
        if let Some(source) = &self.event.source {
            formatter.append_line(format!("Event source: {source}"));
        }
        if !self.event.details.is_empty() {
            formatter.append_line("");
            formatter.append_line(if self.event.is_custom() {
                "Custom event details:"
            } else {
                "Event details:"
            });
            formatter.indent();
            for (key, value) in &self.event.details {
                formatter.append_line(format!("{key}: {value}"));
            }
            formatter.outdent();
        }
    }

    /// Renders the record on its own.
    pub fn to_text(&self) -> String {
        let mut formatter = EventFormatter::new();
        self.format_to(&mut formatter);
        formatter.finish()
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis().min(u128::from(u64::MAX)) as u64)
        .unwrap_or(0)
}
