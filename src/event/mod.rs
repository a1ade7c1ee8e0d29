//! Event model: codes, raised events, stamped records and their text rendering.

pub mod codes;
pub mod counters;
pub mod formatter;
pub mod record;

pub use codes::EventCodeRange;
pub use counters::EventCounters;
pub use formatter::EventFormatter;
pub use record::{unix_millis, EventCategory, EventRecord, Severity, WebEvent};
