use crate::buffer::{BufferError, BufferOptions, FlushSink, FlushSummary};
use crate::config::{ConfigError, HealthMonitorConfig};
use crate::event::{EventCounters, EventRecord, WebEvent};
use crate::provider::{BufferedProvider, EventProvider};
use crate::rules::{CustomEvaluator, FiringRule};
use crate::telemetry::BufferMetrics;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors surfaced by the health monitor.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
    #[error("unknown rule '{0}'")]
    UnknownRule(String),
    #[error("health monitor is shut down")]
    ShutDown,
    #[error("failed to spawn heartbeat thread: {0}")]
    Spawn(#[source] std::io::Error),
}

struct MonitorCore {
    enabled: bool,
    counters: EventCounters,
    providers: BTreeMap<String, Arc<dyn EventProvider>>,
    rules: Vec<FiringRule>,
    shut_down: AtomicBool,
    started: Instant,
}

impl MonitorCore {
    fn raise(&self, event: WebEvent) -> Result<usize, MonitorError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(MonitorError::ShutDown);
        }
        if !self.enabled {
            return Ok(0);
        }
        let record = self.counters.stamp(event);
        Ok(self.route(&record, Instant::now()))
    }

    /// Heartbeat carrying process id, monitor uptime and the number of events raised so far.
    fn heartbeat_event(&self) -> WebEvent {
        WebEvent::heartbeat()
            .with_detail("process_id", std::process::id().to_string())
            .with_detail("uptime_ms", self.started.elapsed().as_millis().to_string())
            .with_detail("events_raised", self.counters.last_sequence().to_string())
    }

    fn route(&self, record: &EventRecord, now: Instant) -> usize {
        let mut fired: BTreeSet<&str> = BTreeSet::new();
        let mut delivered = 0;
        for rule in &self.rules {
            if !rule.matches(record) {
                continue;
            }
            if !rule.check_and_update(record, now) {
                debug!(
                    rule = rule.name(),
                    code = record.code(),
                    sequence = record.sequence(),
                    "rule throttled event"
                );
                continue;
            }
            // A provider is handed the event once per raise, even if it rejects it.
            if !fired.insert(rule.provider()) {
                continue;
            }
            let Some(provider) = self.providers.get(rule.provider()) else {
                continue;
            };
            match provider.process_event(record.clone()) {
                Ok(()) => delivered += 1,
                Err(err) => warn!(
                    provider = provider.name(),
                    rule = rule.name(),
                    error = %err,
                    "provider rejected event"
                ),
            }
        }
        delivered
    }
}

struct HeartbeatSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

struct Heartbeat {
    signal: Arc<HeartbeatSignal>,
    join: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Heartbeat {
    fn start(core: Arc<MonitorCore>, interval: Duration) -> Result<Self, MonitorError> {
        let signal = Arc::new(HeartbeatSignal {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        });
        let thread_signal = signal.clone();
        let join = thread::Builder::new()
            .name("healthmon_heartbeat".to_string())
            .spawn(move || {
                let mut stopped = thread_signal
                    .stopped
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let mut next = Instant::now() + interval;
                loop {
                    if *stopped {
                        return;
                    }
                    let now = Instant::now();
                    if now < next {
                        stopped = thread_signal
                            .wake
                            .wait_timeout(stopped, next - now)
                            .map(|(guard, _)| guard)
                            .unwrap_or_else(|poisoned| poisoned.into_inner().0);
                        continue;
                    }
                    next += interval;
                    drop(stopped);
                    if let Err(err) = core.raise(core.heartbeat_event()) {
                        debug!(error = %err, "heartbeat not raised");
                    }
                    stopped = thread_signal
                        .stopped
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                }
            })
            .map_err(MonitorError::Spawn)?;
        Ok(Self {
            signal,
            join: Mutex::new(Some(join)),
        })
    }

    fn stop(&self) {
        *self
            .signal
            .stopped
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = true;
        self.signal.wake.notify_all();
        let handle = self.join.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

/// Routes raised events through rules to providers and owns their lifecycle.
pub struct HealthMonitor {
    core: Arc<MonitorCore>,
    heartbeat: Option<Heartbeat>,
}

impl HealthMonitor {
    pub fn from_config(config: &HealthMonitorConfig) -> Result<Self, MonitorError> {
        HealthMonitorBuilder::new(config.clone()).build()
    }

    pub fn builder(config: HealthMonitorConfig) -> HealthMonitorBuilder {
        HealthMonitorBuilder::new(config)
    }

    /// Stamps `event` and hands it to every provider whose rule fires.
    ///
    /// Returns the number of providers that accepted the event. Every matching
    /// rule updates its throttles; a provider receives the event at most once
    /// per raise even if several rules fire for it.
    pub fn raise(&self, event: WebEvent) -> Result<usize, MonitorError> {
        self.core.raise(event)
    }

    pub fn is_enabled(&self) -> bool {
        self.core.enabled
    }

    pub fn counters(&self) -> &EventCounters {
        &self.core.counters
    }

    pub fn provider(&self, name: &str) -> Option<&Arc<dyn EventProvider>> {
        self.core.providers.get(name)
    }

    pub fn provider_names(&self) -> impl Iterator<Item = &str> {
        self.core.providers.keys().map(String::as_str)
    }

    pub fn rule(&self, name: &str) -> Option<&FiringRule> {
        self.core.rules.iter().find(|rule| rule.name() == name)
    }

    /// Flushes one provider by name.
    pub fn flush(&self, provider: &str) -> Result<FlushSummary, MonitorError> {
        self.core
            .providers
            .get(provider)
            .map(|provider| provider.flush())
            .ok_or_else(|| MonitorError::UnknownProvider(provider.to_string()))
    }

    /// Flushes every provider and returns the combined totals.
    pub fn flush_all(&self) -> FlushSummary {
        self.core
            .providers
            .values()
            .map(|provider| provider.flush())
            .fold(FlushSummary::default(), combine)
    }

    /// Stops the heartbeat and shuts every provider down; idempotent.
    pub fn shutdown(&self) -> FlushSummary {
        if self.core.shut_down.swap(true, Ordering::AcqRel) {
            return FlushSummary::default();
        }
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.stop();
        }
        let summary = self
            .core
            .providers
            .values()
            .map(|provider| provider.shutdown())
            .fold(FlushSummary::default(), combine);
        info!(
            providers = self.core.providers.len(),
            events = summary.events,
            "health monitor shut down"
        );
        summary
    }

    pub fn metrics(&self) -> Vec<(String, BufferMetrics)> {
        self.core
            .providers
            .iter()
            .filter_map(|(name, provider)| provider.metrics().map(|metrics| (name.clone(), metrics)))
            .collect()
    }

    /// Prometheus text for every provider that reports metrics.
    pub fn render_metrics(&self) -> String {
        self.metrics()
            .iter()
            .map(|(name, metrics)| metrics.render_metrics(name))
            .collect()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn combine(total: FlushSummary, next: FlushSummary) -> FlushSummary {
    FlushSummary {
        notifications: total.notifications + next.notifications,
        events: total.events + next.events,
        deferred: total.deferred + next.deferred,
    }
}

/// Builder for a monitor with sink and evaluator overrides.
pub struct HealthMonitorBuilder {
    config: HealthMonitorConfig,
    sinks: BTreeMap<String, Arc<dyn FlushSink>>,
    evaluators: BTreeMap<String, Arc<dyn CustomEvaluator>>,
    options: BufferOptions,
}

impl HealthMonitorBuilder {
    pub fn new(config: HealthMonitorConfig) -> Self {
        Self {
            config,
            sinks: BTreeMap::new(),
            evaluators: BTreeMap::new(),
            options: BufferOptions::default(),
        }
    }

    /// Replaces the configured sink of `provider`.
    pub fn with_sink(mut self, provider: impl Into<String>, sink: Arc<dyn FlushSink>) -> Self {
        self.sinks.insert(provider.into(), sink);
        self
    }

    /// Attaches a custom evaluator to `rule`; it filters before the built-in throttles.
    pub fn with_evaluator(
        mut self,
        rule: impl Into<String>,
        evaluator: Arc<dyn CustomEvaluator>,
    ) -> Self {
        self.evaluators.insert(rule.into(), evaluator);
        self
    }

    pub fn with_buffer_options(mut self, options: BufferOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(mut self) -> Result<HealthMonitor, MonitorError> {
        self.config.validate()?;
        if let Some(provider) = self
            .sinks
            .keys()
            .find(|name| !self.config.providers.iter().any(|p| &p.name == *name))
        {
            return Err(MonitorError::UnknownProvider(provider.clone()));
        }
        if let Some(rule) = self
            .evaluators
            .keys()
            .find(|name| !self.config.rules.iter().any(|r| &r.name == *name))
        {
            return Err(MonitorError::UnknownRule(rule.clone()));
        }

        let mut providers: BTreeMap<String, Arc<dyn EventProvider>> = BTreeMap::new();
        for provider in &self.config.providers {
            let sink = self.sinks.remove(&provider.name);
            let built = BufferedProvider::from_config(provider, &self.config, sink, self.options)?;
            providers.insert(provider.name.clone(), Arc::new(built));
        }
        let rules = self
            .config
            .rules
            .iter()
            .map(|rule| FiringRule::from_config(rule, self.evaluators.get(&rule.name).cloned()))
            .collect();

        let core = Arc::new(MonitorCore {
            enabled: self.config.enabled,
            counters: EventCounters::new(),
            providers,
            rules,
            shut_down: AtomicBool::new(false),
            started: Instant::now(),
        });
        let heartbeat = match self.config.heartbeat_interval() {
            Some(interval) if self.config.enabled => Some(Heartbeat::start(core.clone(), interval)?),
            _ => None,
        };
        info!(
            enabled = self.config.enabled,
            providers = core.providers.len(),
            rules = core.rules.len(),
            heartbeat_ms = self.config.heartbeat_interval_ms,
            "health monitor started"
        );
        Ok(HealthMonitor { core, heartbeat })
    }
}
