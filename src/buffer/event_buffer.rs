use super::gate::ConcurrencyGate;
use super::notification::{FlushNotification, NotificationCounter, NotificationType};
use super::scheduler::UrgentDecision;
use super::sink::{deliver, FailureLatch, FlushSink};
use super::state::{BufferState, TimerOutcome};
use crate::config::{ConfigError, FlushModeConfig};
use crate::event::{unix_millis, EventRecord};
use crate::telemetry::{BufferMetrics, BufferTelemetry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How a buffer delivers records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferMode {
    Buffered(FlushModeConfig),
    /// Every record is delivered synchronously on the producer's thread.
    Unbuffered,
}

/// Bounds on the polling done by explicit flushes and shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferOptions {
    pub drain_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            poll_interval: DEFAULT_DRAIN_POLL_INTERVAL,
        }
    }
}

/// Totals for one explicit drain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushSummary {
    pub notifications: usize,
    pub events: usize,
    /// Events left queued because no flush permit freed up in time.
    pub deferred: usize,
}

/// Errors returned by buffer operations.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("event buffer '{0}' is shut down")]
    Closed(String),
    #[error("invalid flush mode: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to spawn flush timer for '{name}': {source}")]
    Spawn {
        name: String,
        source: std::io::Error,
    },
}

struct Core {
    name: String,
    sink: Arc<dyn FlushSink>,
    telemetry: BufferTelemetry,
    failures: FailureLatch,
}

impl Core {
    fn dispatch(&self, notification: &FlushNotification) {
        self.telemetry.record_notification(notification);
        match deliver(self.sink.as_ref(), notification) {
            Ok(()) => debug!(
                buffer = %self.name,
                sequence = notification.sequence,
                events = notification.len(),
                kind = %notification.notification_type,
                remaining = notification.events_in_buffer,
                "flushed batch"
            ),
            Err(err) => {
                self.telemetry.record_sink_failure(notification.len());
                self.failures.report(&self.name, notification, &err);
            }
        }
    }
}

struct Shared {
    state: Mutex<BufferState>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct Buffered {
    shared: Arc<Shared>,
    gate: ConcurrencyGate,
    timer: Mutex<Option<thread::JoinHandle<()>>>,
}

struct Unbuffered {
    notifications: Mutex<NotificationCounter>,
    closed: AtomicBool,
}

enum Engine {
    Buffered(Buffered),
    Unbuffered(Unbuffered),
}

/// Batches records and hands them to a sink on a regular and an urgent cadence.
///
/// Producers call [`enqueue`](Self::enqueue); a dedicated timer thread decides
/// when batches go out. Queue, schedule and notification numbering live behind
/// one mutex that is never held while the sink runs.
pub struct EventBuffer {
    core: Arc<Core>,
    engine: Engine,
    options: BufferOptions,
}

impl EventBuffer {
    pub fn new(
        name: impl Into<String>,
        mode: BufferMode,
        sink: Arc<dyn FlushSink>,
    ) -> Result<Self, BufferError> {
        Self::with_options(name, mode, sink, BufferOptions::default())
    }

    pub fn with_options(
        name: impl Into<String>,
        mode: BufferMode,
        sink: Arc<dyn FlushSink>,
        options: BufferOptions,
    ) -> Result<Self, BufferError> {
        let core = Arc::new(Core {
            name: name.into(),
            sink,
            telemetry: BufferTelemetry::new(),
            failures: FailureLatch::new(),
        });
        let engine = match mode {
            BufferMode::Unbuffered => Engine::Unbuffered(Unbuffered {
                notifications: Mutex::new(NotificationCounter::new()),
                closed: AtomicBool::new(false),
            }),
            BufferMode::Buffered(config) => {
                config.validate()?;
                let gate = ConcurrencyGate::new(config.max_concurrent_flushes);
                let shared = Arc::new(Shared {
                    state: Mutex::new(BufferState::new(config, Instant::now())),
                    wake: Condvar::new(),
                });
                let thread_core = core.clone();
                let thread_shared = shared.clone();
                let thread_gate = gate.clone();
                let join = thread::Builder::new()
                    .name(format!("{}_flush", core.name))
                    .spawn(move || run_timer(thread_core, thread_shared, thread_gate))
                    .map_err(|source| BufferError::Spawn {
                        name: core.name.clone(),
                        source,
                    })?;
                Engine::Buffered(Buffered {
                    shared,
                    gate,
                    timer: Mutex::new(Some(join)),
                })
            }
        };
        Ok(Self {
            core,
            engine,
            options,
        })
    }

    pub fn name(&self) -> &str {
        &self.core.name
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self.engine, Engine::Buffered(_))
    }

    /// Adds a record. Buffered mode never calls the sink from here.
    pub fn enqueue(&self, record: EventRecord) -> Result<(), BufferError> {
        match &self.engine {
            Engine::Unbuffered(engine) => {
                if engine.closed.load(Ordering::Acquire) {
                    return Err(BufferError::Closed(self.core.name.clone()));
                }
                let notification = engine
                    .notifications
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .next(
                        vec![record],
                        NotificationType::Unbuffered,
                        0,
                        0,
                        unix_millis(SystemTime::now()),
                    );
                self.core.telemetry.record_enqueued();
                self.core.dispatch(&notification);
                Ok(())
            }
            Engine::Buffered(engine) => {
                let mut guard = engine.shared.lock();
                if guard.is_closed() {
                    return Err(BufferError::Closed(self.core.name.clone()));
                }
                let timer_before = guard.timer();
                let outcome = guard.add(record, Instant::now());
                let rearmed = guard.timer() != timer_before;
                drop(guard);

                self.core.telemetry.record_enqueued();
                if outcome.displaced.is_some() {
                    self.core.telemetry.record_discarded();
                    if outcome.discarded_pending == 1 {
                        warn!(
                            buffer = %self.core.name,
                            depth = outcome.depth,
                            "event buffer full; dropping oldest events"
                        );
                    }
                }
                if let Some(decision) = outcome.urgent {
                    log_urgent(&self.core.name, decision);
                }
                if rearmed {
                    engine.shared.wake.notify_one();
                }
                Ok(())
            }
        }
    }

    /// Drains everything queued now, in batches, as `Flush` notifications.
    pub fn flush_now(&self) -> FlushSummary {
        match &self.engine {
            Engine::Unbuffered(_) => FlushSummary::default(),
            Engine::Buffered(engine) => self.drain(engine, true),
        }
    }

    /// Stops the timer, waits for in-flight flushes and drains the queue.
    ///
    /// Idempotent; only the first call drains. No sink call starts after it returns.
    pub fn shutdown(&self) -> FlushSummary {
        match &self.engine {
            Engine::Unbuffered(engine) => {
                engine.closed.store(true, Ordering::Release);
                FlushSummary::default()
            }
            Engine::Buffered(engine) => {
                {
                    let mut guard = engine.shared.lock();
                    if guard.is_closed() {
                        return FlushSummary::default();
                    }
                    guard.close();
                }
                engine.shared.wake.notify_all();
                let handle = engine
                    .timer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                if let Some(handle) = handle {
                    if handle.join().is_err() {
                        error!(buffer = %self.core.name, "flush timer thread panicked");
                    }
                }
                if !engine
                    .gate
                    .wait_idle(self.options.drain_timeout, self.options.poll_interval)
                {
                    warn!(
                        buffer = %self.core.name,
                        in_flight = engine.gate.in_flight(),
                        "in-flight flushes still running at shutdown"
                    );
                }
                let summary = self.drain(engine, false);
                info!(
                    buffer = %self.core.name,
                    notifications = summary.notifications,
                    events = summary.events,
                    deferred = summary.deferred,
                    "event buffer shut down"
                );
                summary
            }
        }
    }

    pub fn metrics(&self) -> BufferMetrics {
        match &self.engine {
            Engine::Unbuffered(_) => self.core.telemetry.snapshot(0, 0),
            Engine::Buffered(engine) => {
                let depth = engine.shared.lock().len();
                self.core.telemetry.snapshot(depth, engine.gate.in_flight())
            }
        }
    }

    /// Whether the one-time sink failure report has been logged.
    pub fn failure_reported(&self) -> bool {
        self.core.failures.is_reported()
    }

    pub fn queue_len(&self) -> usize {
        match &self.engine {
            Engine::Unbuffered(_) => 0,
            Engine::Buffered(engine) => engine.shared.lock().len(),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        match &self.engine {
            Engine::Unbuffered(engine) => engine.closed.load(Ordering::Acquire),
            Engine::Buffered(engine) => engine.shared.lock().is_closed(),
        }
    }

    fn drain(&self, engine: &Buffered, stop_when_closed: bool) -> FlushSummary {
        let mut summary = FlushSummary::default();
        loop {
            {
                let guard = engine.shared.lock();
                if guard.is_empty() || (stop_when_closed && guard.is_closed()) {
                    break;
                }
            }
            let Some(permit) = engine
                .gate
                .acquire_timeout(self.options.drain_timeout, self.options.poll_interval)
            else {
                summary.deferred = engine.shared.lock().len();
                warn!(
                    buffer = %self.core.name,
                    deferred = summary.deferred,
                    "no flush permit became available; leaving events queued"
                );
                break;
            };
            let notification = {
                let mut guard = engine.shared.lock();
                if stop_when_closed && guard.is_closed() {
                    break;
                }
                guard.take_flush_batch(unix_millis(SystemTime::now()))
            };
            let Some(notification) = notification else {
                break;
            };
            summary.notifications += 1;
            summary.events += notification.len();
            self.core.dispatch(&notification);
            drop(permit);
        }
        summary
    }
}

impl Drop for EventBuffer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_timer(core: Arc<Core>, shared: Arc<Shared>, gate: ConcurrencyGate) {
    let mut guard = shared.lock();
    loop {
        if guard.is_closed() {
            return;
        }
        let now = Instant::now();
        match guard.timer().due() {
            None => {
                guard = shared
                    .wake
                    .wait(guard)
                    .unwrap_or_else(PoisonError::into_inner);
                continue;
            }
            Some(due) if due > now => {
                guard = shared
                    .wake
                    .wait_timeout(guard, due - now)
                    .map(|(guard, _)| guard)
                    .unwrap_or_else(|poisoned| poisoned.into_inner().0);
                continue;
            }
            Some(_) => {}
        }

        let permit = gate.try_acquire();
        let outcome = guard.on_timer(now, unix_millis(SystemTime::now()), permit.is_none());
        match outcome {
            TimerOutcome::Deliver {
                notification,
                urgent,
            } => {
                drop(guard);
                if let Some(decision) = urgent {
                    log_urgent(&core.name, decision);
                }
                core.dispatch(&notification);
                drop(permit);
                guard = shared.lock();
            }
            TimerOutcome::GateSaturated {
                fired,
                queued,
                retry,
            } => {
                core.telemetry.record_skipped_flush();
                warn!(
                    buffer = %core.name,
                    kind = %fired,
                    queued,
                    in_flight = gate.in_flight(),
                    "flush skipped; concurrency limit reached"
                );
                if let Some(decision) = retry {
                    log_urgent(&core.name, decision);
                }
            }
            TimerOutcome::Empty { fired } => {
                debug!(buffer = %core.name, kind = %fired, "timer fired with empty queue");
            }
            TimerOutcome::NotDue => {}
        }
    }
}

fn log_urgent(buffer: &str, decision: UrgentDecision) {
    match decision {
        UrgentDecision::Armed { due } => debug!(
            buffer,
            wait_ms = due.saturating_duration_since(Instant::now()).as_millis() as u64,
            "urgent flush armed"
        ),
        UrgentDecision::AlreadyArmed { .. } => {
            debug!(buffer, "urgent flush already armed")
        }
        UrgentDecision::Collapsed { .. } => {
            debug!(buffer, "urgent flush folded into next regular flush")
        }
    }
}
