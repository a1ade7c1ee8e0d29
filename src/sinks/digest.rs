use crate::buffer::{FlushNotification, FlushSink, SinkError};
use crate::config::DEFAULT_DIGEST_EVENTS_PER_MESSAGE;
use crate::event::EventFormatter;
use std::sync::{Mutex, PoisonError};

const SEPARATOR: &str = "---------------";

/// One rendered digest message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestMessage {
    pub subject: String,
    pub body: String,
    pub events: usize,
}

/// Renders notifications as plain-text digests, split into messages of bounded size.
#[derive(Debug)]
pub struct DigestSink {
    provider: String,
    max_events_per_message: usize,
    messages: Mutex<Vec<DigestMessage>>,
}

impl DigestSink {
    pub fn new(provider: impl Into<String>, max_events_per_message: usize) -> Self {
        assert!(
            max_events_per_message > 0,
            "digest message size must be > 0"
        );
        Self {
            provider: provider.into(),
            max_events_per_message,
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn with_default_size(provider: impl Into<String>) -> Self {
        Self::new(provider, DEFAULT_DIGEST_EVENTS_PER_MESSAGE)
    }

    pub fn messages(&self) -> Vec<DigestMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn render(&self, notification: &FlushNotification) -> Vec<DigestMessage> {
        let parts = notification.events.chunks(self.max_events_per_message).count();
        notification
            .events
            .chunks(self.max_events_per_message)
            .enumerate()
            .map(|(index, chunk)| {
                let mut formatter = EventFormatter::new();
                formatter.append_line("** Summary **");
                formatter.indent();
                formatter.append_line(format!(
                    "{} events in this message (part {} of {})",
                    chunk.len(),
                    index + 1,
                    parts
                ));
                formatter.append_line(format!(
                    "Notification type: {}",
                    notification.notification_type
                ));
                formatter.append_line(format!("Notification sequence: {}", notification.sequence));
                if let Some(last) = notification.last_notification_ms {
                    formatter.append_line(format!("Previous notification (ms since epoch): {last}"));
                }
                formatter.append_line(format!(
                    "Events discarded since previous notification: {}",
                    notification.discarded_since_last_notification
                ));
                formatter.append_line(format!(
                    "Events remaining in buffer: {}",
                    notification.events_in_buffer
                ));
                formatter.outdent();
                formatter.append_line("");
                formatter.append_line("** Events **");
                for record in chunk {
                    formatter.append_line(SEPARATOR);
                    formatter.indent();
                    record.format_to(&mut formatter);
                    formatter.outdent();
                }
                formatter.append_line(SEPARATOR);
                DigestMessage {
                    subject: format!(
                        "{}: {} events (notification {}, part {} of {})",
                        self.provider,
                        chunk.len(),
                        notification.sequence,
                        index + 1,
                        parts
                    ),
                    body: formatter.finish(),
                    events: chunk.len(),
                }
            })
            .collect()
    }
}

impl FlushSink for DigestSink {
    fn on_flush(&self, notification: &FlushNotification) -> Result<(), SinkError> {
        let rendered = self.render(notification);
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(rendered);
        Ok(())
    }
}
