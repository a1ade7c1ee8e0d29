//! Health-monitoring event pipeline: rules route raised events to providers,
//! and buffered providers batch them to sinks on a regular and an urgent cadence.

pub mod app;
pub mod buffer;
pub mod config;
pub mod event;
pub mod monitor;
pub mod provider;
pub mod rules;
pub mod sinks;
pub mod telemetry;

pub use buffer::{
    BufferError, BufferMode, BufferOptions, BufferState, ConcurrencyGate, EventBuffer, EventQueue,
    FlushNotification, FlushPermit, FlushScheduler, FlushSink, FlushSummary, NotificationType,
    SinkError, TimerOutcome, TimerState, UrgentDecision, GATE_RETRY_DELAY,
};
pub use config::{
    ConfigError, FlushModeConfig, FlushModeSpec, HealthMonitorConfig, IntervalSetting,
    LimitSetting, ProviderConfig, RuleConfig, SinkConfig, ANALYSIS_MODE,
    CRITICAL_NOTIFICATION_MODE, DEFAULT_BURST_WAIT, LOGGING_MODE, NOTIFICATION_MODE,
};
pub use event::{
    EventCategory, EventCodeRange, EventCounters, EventFormatter, EventRecord, Severity, WebEvent,
};
pub use monitor::{HealthMonitor, HealthMonitorBuilder, MonitorError};
pub use provider::{BufferedProvider, EventProvider};
pub use rules::{CustomEvaluator, FiringRule, RuleFiringRecord, RuleFiringState};
pub use sinks::{DigestMessage, DigestSink, JsonLinesSink, MemorySink, RotationPolicy, TraceSink};
pub use telemetry::{BufferMetrics, BufferTelemetry};
