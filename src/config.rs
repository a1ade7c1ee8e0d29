use crate::event::{EventCategory, EventCodeRange};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CRITICAL_NOTIFICATION_MODE: &str = "Critical Notification";
pub const NOTIFICATION_MODE: &str = "Notification";
pub const ANALYSIS_MODE: &str = "Analysis";
pub const LOGGING_MODE: &str = "Logging";

/// Wait applied before an urgent flush when a burst of events may be starting.
pub const DEFAULT_BURST_WAIT: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_CONCURRENT_FLUSHES: usize = 1;
pub const DEFAULT_DIGEST_EVENTS_PER_MESSAGE: usize = 50;

/// Rate and size limits for one event buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushModeConfig {
    /// Cadence of scheduled flushes; `None` disables the regular cadence.
    pub regular_flush_interval: Option<Duration>,
    /// Queue depth at which an early (urgent) flush is requested.
    pub urgent_flush_threshold: usize,
    /// Hard cap on queued events; the oldest are dropped beyond it.
    pub max_buffer_size: usize,
    /// Maximum events handed to the sink per call.
    pub max_flush_batch_size: usize,
    /// Minimum spacing between scheduled flushes triggered by depth.
    pub urgent_flush_interval: Duration,
    /// Maximum simultaneous sink calls.
    pub max_concurrent_flushes: usize,
    pub burst_wait: Duration,
}

impl FlushModeConfig {
    pub fn critical_notification() -> Self {
        Self {
            regular_flush_interval: None,
            urgent_flush_threshold: 1,
            max_buffer_size: 100,
            max_flush_batch_size: 20,
            urgent_flush_interval: Duration::from_secs(60),
            max_concurrent_flushes: 1,
            burst_wait: DEFAULT_BURST_WAIT,
        }
    }

    pub fn notification() -> Self {
        Self {
            max_buffer_size: 300,
            ..Self::critical_notification()
        }
    }

    pub fn analysis() -> Self {
        Self {
            regular_flush_interval: Some(Duration::from_secs(5 * 60)),
            urgent_flush_threshold: 100,
            max_buffer_size: 1000,
            max_flush_batch_size: 100,
            urgent_flush_interval: Duration::from_secs(60),
            max_concurrent_flushes: 1,
            burst_wait: DEFAULT_BURST_WAIT,
        }
    }

    pub fn logging() -> Self {
        Self {
            regular_flush_interval: Some(Duration::from_secs(30 * 60)),
            urgent_flush_threshold: 800,
            max_buffer_size: 1000,
            max_flush_batch_size: 200,
            urgent_flush_interval: Duration::from_secs(5 * 60),
            max_concurrent_flushes: 1,
            burst_wait: DEFAULT_BURST_WAIT,
        }
    }

    /// Looks up one of the built-in buffer modes by its configured name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            CRITICAL_NOTIFICATION_MODE => Some(Self::critical_notification()),
            NOTIFICATION_MODE => Some(Self::notification()),
            ANALYSIS_MODE => Some(Self::analysis()),
            LOGGING_MODE => Some(Self::logging()),
            _ => None,
        }
    }

    /// Checks the limits for internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_buffer_size == 0 {
            return Err(ConfigError::ZeroValue {
                field: "max_buffer_size",
            });
        }
        if self.max_flush_batch_size == 0 {
            return Err(ConfigError::ZeroValue {
                field: "max_flush_batch_size",
            });
        }
        if self.urgent_flush_threshold == 0 {
            return Err(ConfigError::ZeroValue {
                field: "urgent_flush_threshold",
            });
        }
        if self.max_concurrent_flushes == 0 {
            return Err(ConfigError::ZeroValue {
                field: "max_concurrent_flushes",
            });
        }
        if self.regular_flush_interval == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroValue {
                field: "regular_flush_interval",
            });
        }
        if self.urgent_flush_threshold > self.max_buffer_size {
            return Err(ConfigError::ThresholdExceedsBuffer {
                threshold: self.urgent_flush_threshold,
                max_buffer_size: self.max_buffer_size,
            });
        }
        if self.max_flush_batch_size > self.max_buffer_size {
            return Err(ConfigError::BatchExceedsBuffer {
                batch: self.max_flush_batch_size,
                max_buffer_size: self.max_buffer_size,
            });
        }
        Ok(())
    }
}

/// Keyword accepted where a duration or count may be unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unbounded {
    Infinite,
}

/// Interval in milliseconds, or `"infinite"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IntervalSetting {
    Millis(u64),
    Keyword(Unbounded),
}

impl IntervalSetting {
    pub fn to_duration(self) -> Option<Duration> {
        match self {
            IntervalSetting::Millis(ms) => Some(Duration::from_millis(ms)),
            IntervalSetting::Keyword(Unbounded::Infinite) => None,
        }
    }
}

/// Count limit, or `"infinite"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LimitSetting {
    Count(u64),
    Keyword(Unbounded),
}

impl Default for LimitSetting {
    fn default() -> Self {
        LimitSetting::Keyword(Unbounded::Infinite)
    }
}

impl LimitSetting {
    pub fn to_limit(self) -> Option<u64> {
        match self {
            LimitSetting::Count(count) => Some(count),
            LimitSetting::Keyword(Unbounded::Infinite) => None,
        }
    }
}

/// Serialized form of [`FlushModeConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlushModeSpec {
    pub regular_flush_interval_ms: IntervalSetting,
    pub urgent_flush_threshold: usize,
    pub max_buffer_size: usize,
    pub max_flush_batch_size: usize,
    pub urgent_flush_interval_ms: u64,
    #[serde(default = "default_max_concurrent_flushes")]
    pub max_concurrent_flushes: usize,
    #[serde(default)]
    pub burst_wait_ms: Option<u64>,
}

fn default_max_concurrent_flushes() -> usize {
    DEFAULT_MAX_CONCURRENT_FLUSHES
}

impl TryFrom<FlushModeSpec> for FlushModeConfig {
    type Error = ConfigError;

    fn try_from(spec: FlushModeSpec) -> Result<Self, Self::Error> {
        let config = FlushModeConfig {
            regular_flush_interval: spec.regular_flush_interval_ms.to_duration(),
            urgent_flush_threshold: spec.urgent_flush_threshold,
            max_buffer_size: spec.max_buffer_size,
            max_flush_batch_size: spec.max_flush_batch_size,
            urgent_flush_interval: Duration::from_millis(spec.urgent_flush_interval_ms),
            max_concurrent_flushes: spec.max_concurrent_flushes,
            burst_wait: spec
                .burst_wait_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_BURST_WAIT),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Sink backing a configured provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    Memory,
    Trace,
    JsonLines {
        #[serde(default)]
        max_bytes: Option<usize>,
        #[serde(default)]
        max_files: Option<usize>,
    },
    Digest {
        #[serde(default = "default_digest_events_per_message")]
        max_events_per_message: usize,
    },
}

fn default_digest_events_per_message() -> usize {
    DEFAULT_DIGEST_EVENTS_PER_MESSAGE
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(flatten)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub buffer: bool,
    #[serde(default)]
    pub buffer_mode: Option<String>,
}

/// Routing rule from an event code range (or category) to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    #[serde(default)]
    pub event_codes: Option<EventCodeRange>,
    #[serde(default)]
    pub category: Option<EventCategory>,
    pub provider: String,
    #[serde(default = "default_min_instances")]
    pub min_instances: u64,
    #[serde(default)]
    pub max_limit: LimitSetting,
    #[serde(default)]
    pub min_interval_ms: u64,
}

fn default_min_instances() -> u64 {
    1
}

fn default_enabled() -> bool {
    true
}

/// Top-level configuration of a health monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthMonitorConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Heartbeat cadence; 0 disables the heartbeat.
    #[serde(default)]
    pub heartbeat_interval_ms: u64,
    #[serde(default)]
    pub buffer_modes: BTreeMap<String, FlushModeSpec>,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            heartbeat_interval_ms: 0,
            buffer_modes: BTreeMap::new(),
            providers: Vec::new(),
            rules: Vec::new(),
        }
    }
}

impl HealthMonitorConfig {
    /// Loads and validates a configuration file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let payload = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&payload).map_err(|source| ConfigError::Parse {
                path: path_ref.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Parses and validates a configuration held in memory.
    pub fn from_json_str(payload: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(payload).map_err(|source| ConfigError::Parse {
                path: PathBuf::from("<inline>"),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_ms > 0).then(|| Duration::from_millis(self.heartbeat_interval_ms))
    }

    /// Resolves a buffer mode name; custom modes shadow the built-in presets.
    pub fn resolve_buffer_mode(&self, name: &str) -> Result<FlushModeConfig, ConfigError> {
        if let Some(spec) = self.buffer_modes.get(name) {
            return FlushModeConfig::try_from(spec.clone()).map_err(|source| {
                ConfigError::InvalidBufferMode {
                    mode: name.to_string(),
                    source: Box::new(source),
                }
            });
        }
        FlushModeConfig::preset(name).ok_or_else(|| ConfigError::UnknownBufferMode(name.to_string()))
    }

    /// Checks cross references between providers, buffer modes and rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = BTreeSet::new();
        for provider in &self.providers {
            if !names.insert(provider.name.as_str()) {
                return Err(ConfigError::DuplicateProvider(provider.name.clone()));
            }
            if provider.buffer {
                let mode = provider
                    .buffer_mode
                    .as_deref()
                    .ok_or_else(|| ConfigError::MissingBufferMode(provider.name.clone()))?;
                self.resolve_buffer_mode(mode)?;
            }
            if let SinkConfig::Digest {
                max_events_per_message: 0,
            } = provider.sink
            {
                return Err(ConfigError::ZeroValue {
                    field: "max_events_per_message",
                });
            }
        }
        for rule in &self.rules {
            if !names.contains(rule.provider.as_str()) {
                return Err(ConfigError::UnknownProvider {
                    rule: rule.name.clone(),
                    provider: rule.provider.clone(),
                });
            }
            if rule.min_instances == 0 {
                return Err(ConfigError::ZeroValue {
                    field: "min_instances",
                });
            }
            if rule.event_codes.is_some_and(|range| range.is_empty()) {
                return Err(ConfigError::EmptyCodeRange(rule.name.clone()));
            }
        }
        Ok(())
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },
    #[error("urgent flush threshold {threshold} exceeds max buffer size {max_buffer_size}")]
    ThresholdExceedsBuffer {
        threshold: usize,
        max_buffer_size: usize,
    },
    #[error("max flush batch size {batch} exceeds max buffer size {max_buffer_size}")]
    BatchExceedsBuffer { batch: usize, max_buffer_size: usize },
    #[error("unknown buffer mode '{0}'")]
    UnknownBufferMode(String),
    #[error("buffer mode '{mode}' is invalid: {source}")]
    InvalidBufferMode {
        mode: String,
        source: Box<ConfigError>,
    },
    #[error("provider '{0}' enables buffering without a buffer_mode")]
    MissingBufferMode(String),
    #[error("provider '{0}' is declared more than once")]
    DuplicateProvider(String),
    #[error("rule '{rule}' references unknown provider '{provider}'")]
    UnknownProvider { rule: String, provider: String },
    #[error("rule '{0}' has an empty event code range")]
    EmptyCodeRange(String),
}
