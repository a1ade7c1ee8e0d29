//! Event buffering: bounded queue, flush scheduling, concurrency gate and the
//! timer-driven runtime that ties them to a sink.

pub mod event_buffer;
pub mod gate;
pub mod notification;
pub mod queue;
pub mod scheduler;
pub mod sink;
pub mod state;

pub use event_buffer::{
    BufferError, BufferMode, BufferOptions, EventBuffer, FlushSummary, DEFAULT_DRAIN_POLL_INTERVAL,
    DEFAULT_DRAIN_TIMEOUT,
};
pub use gate::{ConcurrencyGate, FlushPermit};
pub use notification::{FlushNotification, NotificationCounter, NotificationType};
pub use queue::EventQueue;
pub use scheduler::{FlushScheduler, TimerState, UrgentDecision, GATE_RETRY_DELAY};
pub use sink::{deliver, FailureLatch, FlushSink, SinkError};
pub use state::{AddOutcome, BufferState, TimerOutcome};
