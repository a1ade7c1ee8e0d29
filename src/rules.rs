use crate::config::RuleConfig;
use crate::event::{EventCategory, EventCodeRange, EventRecord};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Firing history handed to custom evaluators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleFiringState {
    /// Matches seen so far, the current one included.
    pub times_raised: u64,
    pub last_fired: Option<Instant>,
}

/// Extra filter consulted before a rule's built-in throttles.
pub trait CustomEvaluator: Send + Sync {
    fn can_fire(&self, record: &EventRecord, state: &RuleFiringState) -> bool;
}

impl<F> CustomEvaluator for F
where
    F: Fn(&EventRecord, &RuleFiringState) -> bool + Send + Sync,
{
    fn can_fire(&self, record: &EventRecord, state: &RuleFiringState) -> bool {
        self(record, state)
    }
}

/// Throttle state of one rule.
#[derive(Clone)]
pub struct RuleFiringRecord {
    min_instances: u64,
    max_limit: Option<u64>,
    min_interval: Duration,
    times_raised: u64,
    last_fired: Option<Instant>,
    evaluator: Option<Arc<dyn CustomEvaluator>>,
}

impl RuleFiringRecord {
    pub fn new(min_instances: u64, max_limit: Option<u64>, min_interval: Duration) -> Self {
        Self {
            min_instances,
            max_limit,
            min_interval,
            times_raised: 0,
            last_fired: None,
            evaluator: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn CustomEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    /// Counts the match and decides whether the rule fires at `now`.
    ///
    /// The n-th match fires only when a custom evaluator (if any) accepts it,
    /// `min_instances <= n <= max_limit`, and more than `min_interval` has
    /// passed since the last firing.
    pub fn check_and_update(&mut self, record: &EventRecord, now: Instant) -> bool {
        self.times_raised += 1;

        if let Some(evaluator) = &self.evaluator {
            if !evaluator.can_fire(record, &self.state()) {
                return false;
            }
        }

        if self.times_raised < self.min_instances {
            return false;
        }
        if self
            .max_limit
            .is_some_and(|limit| self.times_raised > limit)
        {
            return false;
        }
        if !self.min_interval.is_zero() {
            if let Some(last) = self.last_fired {
                if now.saturating_duration_since(last) <= self.min_interval {
                    return false;
                }
            }
        }
        self.last_fired = Some(now);
        true
    }

    pub fn state(&self) -> RuleFiringState {
        RuleFiringState {
            times_raised: self.times_raised,
            last_fired: self.last_fired,
        }
    }
}

impl std::fmt::Debug for RuleFiringRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleFiringRecord")
            .field("min_instances", &self.min_instances)
            .field("max_limit", &self.max_limit)
            .field("min_interval", &self.min_interval)
            .field("times_raised", &self.times_raised)
            .field("last_fired", &self.last_fired)
            .field("custom_evaluator", &self.evaluator.is_some())
            .finish()
    }
}

/// Routes matching events to one provider.
#[derive(Debug)]
pub struct FiringRule {
    name: String,
    codes: Option<EventCodeRange>,
    category: Option<EventCategory>,
    provider: String,
    record: Mutex<RuleFiringRecord>,
}

impl FiringRule {
    pub fn new(
        name: impl Into<String>,
        codes: Option<EventCodeRange>,
        category: Option<EventCategory>,
        provider: impl Into<String>,
        record: RuleFiringRecord,
    ) -> Self {
        Self {
            name: name.into(),
            codes,
            category,
            provider: provider.into(),
            record: Mutex::new(record),
        }
    }

    pub fn from_config(config: &RuleConfig, evaluator: Option<Arc<dyn CustomEvaluator>>) -> Self {
        let mut record = RuleFiringRecord::new(
            config.min_instances,
            config.max_limit.to_limit(),
            Duration::from_millis(config.min_interval_ms),
        );
        if let Some(evaluator) = evaluator {
            record = record.with_evaluator(evaluator);
        }
        Self::new(
            config.name.clone(),
            config.event_codes,
            config.category,
            config.provider.clone(),
            record,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// True when the code range and category (where set) both match.
    pub fn matches(&self, record: &EventRecord) -> bool {
        self.codes.map_or(true, |range| range.contains(record.code()))
            && self
                .category
                .map_or(true, |category| category == record.category())
    }

    pub fn check_and_update(&self, record: &EventRecord, now: Instant) -> bool {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .check_and_update(record, now)
    }

    pub fn firing_state(&self) -> RuleFiringState {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state()
    }
}
