use crate::buffer::{FlushNotification, FlushSink, SinkError};
use crate::event::Severity;
use tracing::{debug, info, warn};

/// Writes each record as a `tracing` event at its category's severity.
#[derive(Debug, Clone)]
pub struct TraceSink {
    provider: String,
}

impl TraceSink {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }
}

impl FlushSink for TraceSink {
    fn on_flush(&self, notification: &FlushNotification) -> Result<(), SinkError> {
        for record in &notification.events {
            let provider = self.provider.as_str();
            let code = record.code();
            let sequence = record.sequence();
            let category = record.category().as_str();
            let message = record.message();
            match record.category().severity() {
                Severity::Warning => {
                    warn!(provider, code, sequence, category, "{message}")
                }
                Severity::Information => {
                    info!(provider, code, sequence, category, "{message}")
                }
                Severity::Verbose => {
                    debug!(provider, code, sequence, category, "{message}")
                }
            }
        }
        Ok(())
    }
}
