use crate::buffer::{BufferError, BufferMode, BufferOptions, EventBuffer, FlushSink, FlushSummary};
use crate::config::{ConfigError, HealthMonitorConfig, ProviderConfig, SinkConfig};
use crate::event::EventRecord;
use crate::sinks::{DigestSink, JsonLinesSink, MemorySink, RotationPolicy, TraceSink};
use crate::telemetry::BufferMetrics;
use crate::MonitorError;
use std::sync::Arc;

/// Named consumer of routed events.
pub trait EventProvider: Send + Sync {
    fn name(&self) -> &str;

    fn process_event(&self, record: EventRecord) -> Result<(), BufferError>;

    /// Delivers anything held back; returns what was sent.
    fn flush(&self) -> FlushSummary;

    fn shutdown(&self) -> FlushSummary;

    fn metrics(&self) -> Option<BufferMetrics> {
        None
    }
}

/// Provider backed by an [`EventBuffer`] in front of a sink.
pub struct BufferedProvider {
    name: String,
    buffer: EventBuffer,
    sink: Arc<dyn FlushSink>,
}

impl BufferedProvider {
    /// Creates a provider with default drain options.
    pub fn new(
        name: impl Into<String>,
        mode: BufferMode,
        sink: Arc<dyn FlushSink>,
    ) -> Result<Self, BufferError> {
        Self::with_options(name, mode, sink, BufferOptions::default())
    }

    /// Creates a provider whose buffer uses `options` for explicit flushes and shutdown.
    pub fn with_options(
        name: impl Into<String>,
        mode: BufferMode,
        sink: Arc<dyn FlushSink>,
        options: BufferOptions,
    ) -> Result<Self, BufferError> {
        let name = name.into();
        let buffer = EventBuffer::with_options(name.clone(), mode, sink.clone(), options)?;
        Ok(Self { name, buffer, sink })
    }

    /// Builds the provider described by `provider`, with `sink` replacing the configured one.
    pub fn from_config(
        provider: &ProviderConfig,
        config: &HealthMonitorConfig,
        sink: Option<Arc<dyn FlushSink>>,
        options: BufferOptions,
    ) -> Result<Self, MonitorError> {
        let mode = match (provider.buffer, provider.buffer_mode.as_deref()) {
            (true, Some(mode)) => BufferMode::Buffered(config.resolve_buffer_mode(mode)?),
            (true, None) => return Err(ConfigError::MissingBufferMode(provider.name.clone()).into()),
            (false, _) => BufferMode::Unbuffered,
        };
        let sink = sink.unwrap_or_else(|| build_sink(&provider.name, &provider.sink));
        Ok(Self::with_options(provider.name.clone(), mode, sink, options)?)
    }

    /// Buffer in front of the sink.
    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    /// Sink receiving this provider's notifications.
    pub fn sink(&self) -> &Arc<dyn FlushSink> {
        &self.sink
    }
}

impl EventProvider for BufferedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn process_event(&self, record: EventRecord) -> Result<(), BufferError> {
        self.buffer.enqueue(record)
    }

    fn flush(&self) -> FlushSummary {
        self.buffer.flush_now()
    }

    fn shutdown(&self) -> FlushSummary {
        self.buffer.shutdown()
    }

    fn metrics(&self) -> Option<BufferMetrics> {
        Some(self.buffer.metrics())
    }
}

/// Instantiates the sink named by a provider's configuration.
pub fn build_sink(provider: &str, sink: &SinkConfig) -> Arc<dyn FlushSink> {
    match sink {
        SinkConfig::Memory => Arc::new(MemorySink::new()),
        SinkConfig::Trace => Arc::new(TraceSink::new(provider)),
        SinkConfig::JsonLines {
            max_bytes,
            max_files,
        } => {
            let defaults = RotationPolicy::default();
            Arc::new(JsonLinesSink::new(RotationPolicy {
                max_bytes: max_bytes.unwrap_or(defaults.max_bytes),
                max_files: max_files.unwrap_or(defaults.max_files),
            }))
        }
        SinkConfig::Digest {
            max_events_per_message,
        } => Arc::new(DigestSink::new(provider, *max_events_per_message)),
    }
}
