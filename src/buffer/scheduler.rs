use super::notification::NotificationType;
use crate::config::FlushModeConfig;
use std::time::{Duration, Instant};

/// Minimum delay before retrying an urgent flush that found the gate saturated.
pub const GATE_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Single timer slot shared by the regular and urgent cadences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    RegularArmed { due: Instant },
    UrgentArmed { due: Instant },
}

impl TimerState {
    pub fn due(&self) -> Option<Instant> {
        match self {
            TimerState::Idle => None,
            TimerState::RegularArmed { due } | TimerState::UrgentArmed { due } => Some(*due),
        }
    }

    fn notification_type(&self) -> Option<NotificationType> {
        match self {
            TimerState::Idle => None,
            TimerState::RegularArmed { .. } => Some(NotificationType::Regular),
            TimerState::UrgentArmed { .. } => Some(NotificationType::Urgent),
        }
    }
}

/// Outcome of an urgent flush request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrgentDecision {
    /// A new urgent timer was armed.
    Armed { due: Instant },
    /// An urgent timer due no later than the request was already armed.
    AlreadyArmed { due: Instant },
    /// The regular flush is due first and will carry the urgent work.
    Collapsed { regular_due: Instant },
}

/// Decides when flushes happen; all decisions take `now` explicitly.
///
/// Regular flushes are phase-aligned to `start`: the next regular due time is
/// the first multiple of the interval after `start` that is strictly later
/// than `now`, independent of when the previous flush ran or how long the sink
/// took. Urgent flushes are rate limited against the last scheduled flush and
/// collapse into the regular flush whenever that is due no later.
#[derive(Debug, Clone)]
pub struct FlushScheduler {
    regular_interval: Option<Duration>,
    urgent_interval: Duration,
    burst_wait: Duration,
    start: Instant,
    timer: TimerState,
    last_add: Option<Instant>,
    last_scheduled_flush: Option<Instant>,
}

impl FlushScheduler {
    /// Builds a scheduler and arms the regular timer when the cadence is finite.
    pub fn new(config: &FlushModeConfig, start: Instant) -> Self {
        let mut scheduler = Self {
            regular_interval: config.regular_flush_interval,
            urgent_interval: config.urgent_flush_interval,
            burst_wait: config.burst_wait,
            start,
            timer: TimerState::Idle,
            last_add: None,
            last_scheduled_flush: None,
        };
        scheduler.timer = scheduler.regular_timer(start);
        scheduler
    }

    pub fn timer(&self) -> TimerState {
        self.timer
    }

    pub fn start(&self) -> Instant {
        self.start
    }

    pub fn last_add(&self) -> Option<Instant> {
        self.last_add
    }

    pub fn last_scheduled_flush(&self) -> Option<Instant> {
        self.last_scheduled_flush
    }

    /// Time left until the armed timer fires; `None` when idle.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.timer
            .due()
            .map(|due| due.saturating_duration_since(now))
    }

    /// First regular slot strictly after `now`.
    pub fn next_regular_due(&self, now: Instant) -> Option<Instant> {
        let interval = self.regular_interval?;
        let elapsed = now.saturating_duration_since(self.start);
        let ticks = elapsed.as_nanos() / interval.as_nanos() + 1;
        let offset = interval.as_nanos().saturating_mul(ticks);
        let offset = Duration::from_nanos(offset.min(u128::from(u64::MAX)) as u64);
        Some(self.start + offset)
    }

    /// Records a producer add; requests an urgent flush when `depth` reached `threshold`.
    pub fn on_enqueue(&mut self, now: Instant, depth: usize, threshold: usize) -> Option<UrgentDecision> {
        let previous_add = self.last_add.replace(now);
        if depth < threshold {
            return None;
        }
        Some(self.schedule_urgent(now, previous_add, Duration::ZERO))
    }

    /// Requests an urgent flush that waits at least `min_delay`.
    pub fn request_urgent(&mut self, now: Instant, min_delay: Duration) -> UrgentDecision {
        self.schedule_urgent(now, self.last_add, min_delay)
    }

    /// Fires the timer when due, rearming the regular cadence.
    pub fn fire(&mut self, now: Instant) -> Option<NotificationType> {
        let due = self.timer.due()?;
        if due > now {
            return None;
        }
        let fired = self.timer.notification_type();
        self.timer = self.regular_timer(now);
        fired
    }

    /// Marks a timer-driven flush as taken; explicit flushes do not count.
    pub fn record_scheduled_flush(&mut self, now: Instant) {
        self.last_scheduled_flush = Some(now);
    }

    fn schedule_urgent(
        &mut self,
        now: Instant,
        previous_add: Option<Instant>,
        min_delay: Duration,
    ) -> UrgentDecision {
        let burst_possible = previous_add
            .map(|at| now.saturating_duration_since(at) > self.urgent_interval)
            .unwrap_or(true);
        let base_wait = if burst_possible {
            self.burst_wait
        } else {
            Duration::ZERO
        };
        let mut due = now + base_wait.max(min_delay);
        if let Some(last) = self.last_scheduled_flush {
            due = due.max(last + self.urgent_interval);
        }

        if let TimerState::UrgentArmed { due: armed } = self.timer {
            if armed <= due {
                return UrgentDecision::AlreadyArmed { due: armed };
            }
        }
        if let Some(regular_due) = self.next_regular_due(now) {
            if regular_due <= due {
                self.timer = TimerState::RegularArmed { due: regular_due };
                return UrgentDecision::Collapsed { regular_due };
            }
        }
        self.timer = TimerState::UrgentArmed { due };
        UrgentDecision::Armed { due }
    }

    fn regular_timer(&self, now: Instant) -> TimerState {
        self.next_regular_due(now)
            .map(|due| TimerState::RegularArmed { due })
            .unwrap_or(TimerState::Idle)
    }
}
