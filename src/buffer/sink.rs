use super::notification::FlushNotification;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, error};

/// Consumer of flushed batches.
///
/// Implementations may be called from the timer thread and from callers of
/// an explicit flush at the same time, up to the buffer's concurrency limit.
/// They must not block indefinitely.
pub trait FlushSink: Send + Sync {
    fn on_flush(&self, notification: &FlushNotification) -> Result<(), SinkError>;
}

impl<F> FlushSink for F
where
    F: Fn(&FlushNotification) -> Result<(), SinkError> + Send + Sync,
{
    fn on_flush(&self, notification: &FlushNotification) -> Result<(), SinkError> {
        self(notification)
    }
}

/// Failure reported by (or on behalf of) a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize notification: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("sink rejected batch: {0}")]
    Rejected(String),
    #[error("sink panicked: {0}")]
    Panicked(String),
}

/// Invokes the sink, converting a panic into [`SinkError::Panicked`].
pub fn deliver(sink: &dyn FlushSink, notification: &FlushNotification) -> Result<(), SinkError> {
    panic::catch_unwind(AssertUnwindSafe(|| sink.on_flush(notification)))
        .unwrap_or_else(|payload| Err(SinkError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Logs the first sink failure of a buffer at error level and later ones at debug.
#[derive(Debug, Default)]
pub struct FailureLatch {
    reported: AtomicBool,
}

impl FailureLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when this call produced the error-level report.
    pub fn report(&self, buffer: &str, notification: &FlushNotification, err: &SinkError) -> bool {
        let first = self
            .reported
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            error!(
                buffer,
                sequence = notification.sequence,
                events = notification.len(),
                kind = %notification.notification_type,
                error = %err,
                "sink failed to process batch; further failures on this buffer are logged at debug"
            );
        } else {
            debug!(
                buffer,
                sequence = notification.sequence,
                error = %err,
                "sink failed to process batch"
            );
        }
        first
    }

    pub fn is_reported(&self) -> bool {
        self.reported.load(Ordering::Acquire)
    }
}
