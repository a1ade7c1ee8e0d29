use std::time::{Duration, Instant};

use healthmon::{
    BufferState, EventCounters, FlushModeConfig, FlushScheduler, NotificationType, TimerOutcome,
    TimerState, UrgentDecision, WebEvent, GATE_RETRY_DELAY,
};

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn mode(
    regular: Option<Duration>,
    threshold: usize,
    max: usize,
    batch: usize,
    urgent: Duration,
    burst: Duration,
) -> FlushModeConfig {
    FlushModeConfig {
        regular_flush_interval: regular,
        urgent_flush_threshold: threshold,
        max_buffer_size: max,
        max_flush_batch_size: batch,
        urgent_flush_interval: urgent,
        max_concurrent_flushes: 1,
        burst_wait: burst,
    }
}

fn sequences(outcome: &TimerOutcome) -> Vec<u64> {
    match outcome {
        TimerOutcome::Deliver { notification, .. } => {
            notification.events.iter().map(|r| r.sequence()).collect()
        }
        other => panic!("expected delivery, got {other:?}"),
    }
}

#[test]
fn regular_slots_are_phase_aligned_to_start() {
    let t0 = Instant::now();
    let config = mode(Some(ms(100)), 10, 10, 10, ms(50), ms(0));
    let mut scheduler = FlushScheduler::new(&config, t0);

    assert_eq!(scheduler.timer(), TimerState::RegularArmed { due: t0 + ms(100) });
    assert_eq!(scheduler.next_regular_due(t0 + ms(100)), Some(t0 + ms(200)));
    assert_eq!(scheduler.next_regular_due(t0 + ms(250)), Some(t0 + ms(300)));

    assert_eq!(scheduler.fire(t0 + ms(50)), None);
    // A late fire skips to the next slot on the start-aligned grid.
    assert_eq!(scheduler.fire(t0 + ms(130)), Some(NotificationType::Regular));
    assert_eq!(scheduler.timer(), TimerState::RegularArmed { due: t0 + ms(200) });
    assert_eq!(scheduler.time_until_due(t0 + ms(170)), Some(ms(30)));
}

#[test]
fn infinite_interval_never_arms_regular_timer() {
    let t0 = Instant::now();
    let config = mode(None, 1, 10, 10, ms(0), ms(0));
    let mut scheduler = FlushScheduler::new(&config, t0);

    assert_eq!(scheduler.timer(), TimerState::Idle);
    assert_eq!(scheduler.next_regular_due(t0 + ms(10_000)), None);
    assert_eq!(scheduler.fire(t0 + ms(10_000)), None);
}

#[test]
fn first_add_after_quiet_period_waits_for_burst() {
    let t0 = Instant::now();
    let config = mode(None, 1, 100, 20, ms(60_000), ms(2_000));
    let mut scheduler = FlushScheduler::new(&config, t0);

    let decision = scheduler.on_enqueue(t0, 1, 1);
    assert_eq!(decision, Some(UrgentDecision::Armed { due: t0 + ms(2_000) }));
    assert_eq!(scheduler.last_add(), Some(t0));
}

#[test]
fn below_threshold_only_records_the_add() {
    let t0 = Instant::now();
    let config = mode(None, 5, 100, 20, ms(0), ms(0));
    let mut scheduler = FlushScheduler::new(&config, t0);

    assert_eq!(scheduler.on_enqueue(t0 + ms(3), 4, 5), None);
    assert_eq!(scheduler.timer(), TimerState::Idle);
    assert_eq!(scheduler.last_add(), Some(t0 + ms(3)));
}

#[test]
fn urgent_flushes_are_spaced_by_urgent_interval() {
    let t0 = Instant::now();
    let config = mode(None, 1, 100, 20, ms(60_000), ms(2_000));
    let mut scheduler = FlushScheduler::new(&config, t0);

    scheduler.on_enqueue(t0, 1, 1);
    assert_eq!(
        scheduler.fire(t0 + ms(2_000)),
        Some(NotificationType::Urgent)
    );
    scheduler.record_scheduled_flush(t0 + ms(2_000));
    assert_eq!(scheduler.timer(), TimerState::Idle);

    let decision = scheduler.on_enqueue(t0 + ms(3_000), 1, 1);
    assert_eq!(
        decision,
        Some(UrgentDecision::Armed {
            due: t0 + ms(62_000)
        })
    );
}

#[test]
fn earlier_urgent_timer_is_kept() {
    let t0 = Instant::now();
    let config = mode(None, 1, 100, 20, ms(1_000), ms(0));
    let mut scheduler = FlushScheduler::new(&config, t0);

    assert_eq!(
        scheduler.on_enqueue(t0, 1, 1),
        Some(UrgentDecision::Armed { due: t0 })
    );
    // A later request never pushes an armed urgent timer back.
    let later = scheduler.request_urgent(t0 + ms(5), ms(500));
    assert_eq!(later, UrgentDecision::AlreadyArmed { due: t0 });
    assert_eq!(scheduler.timer(), TimerState::UrgentArmed { due: t0 });
}

#[test]
fn urgent_earlier_than_regular_is_armed() {
    let t0 = Instant::now();
    let config = mode(Some(ms(10_000)), 1, 100, 20, ms(60_000), ms(2_000));
    let mut scheduler = FlushScheduler::new(&config, t0);

    let decision = scheduler.on_enqueue(t0 + ms(5_000), 1, 1);
    assert_eq!(
        decision,
        Some(UrgentDecision::Armed {
            due: t0 + ms(7_000)
        })
    );
    assert_eq!(scheduler.fire(t0 + ms(7_000)), Some(NotificationType::Urgent));
    // The regular grid is untouched by the urgent flush.
    assert_eq!(scheduler.timer(), TimerState::RegularArmed { due: t0 + ms(10_000) });
}

#[test]
fn urgent_collapses_into_earlier_regular_flush() {
    let t0 = Instant::now();
    let config = mode(Some(ms(10_000)), 1, 100, 20, ms(60_000), ms(8_000));
    let mut scheduler = FlushScheduler::new(&config, t0);

    let decision = scheduler.on_enqueue(t0 + ms(5_000), 1, 1);
    assert_eq!(
        decision,
        Some(UrgentDecision::Collapsed {
            regular_due: t0 + ms(10_000)
        })
    );
    assert_eq!(scheduler.timer(), TimerState::RegularArmed { due: t0 + ms(10_000) });
    assert_eq!(
        scheduler.fire(t0 + ms(10_000)),
        Some(NotificationType::Regular)
    );
}

#[test]
fn ties_between_regular_and_urgent_go_to_regular() {
    let t0 = Instant::now();
    let config = mode(Some(ms(10_000)), 1, 100, 20, ms(60_000), ms(5_000));
    let mut scheduler = FlushScheduler::new(&config, t0);

    let decision = scheduler.on_enqueue(t0 + ms(5_000), 1, 1);
    assert_eq!(
        decision,
        Some(UrgentDecision::Collapsed {
            regular_due: t0 + ms(10_000)
        })
    );
}

#[test]
fn saturated_gate_skips_batch_and_retries_later() {
    let t0 = Instant::now();
    let counters = EventCounters::new();
    let config = mode(None, 1, 10, 10, ms(0), ms(0));
    let mut state = BufferState::new(config, t0);

    state.add(counters.stamp(WebEvent::new(100_001, "a")), t0);
    assert_eq!(state.timer(), TimerState::UrgentArmed { due: t0 });

    match state.on_timer(t0, 1_000, true) {
        TimerOutcome::GateSaturated {
            fired,
            queued,
            retry,
        } => {
            assert_eq!(fired, NotificationType::Urgent);
            assert_eq!(queued, 1);
            assert_eq!(
                retry,
                Some(UrgentDecision::Armed {
                    due: t0 + GATE_RETRY_DELAY
                })
            );
        }
        other => panic!("expected skipped flush, got {other:?}"),
    }
    assert_eq!(state.len(), 1);
    assert_eq!(state.on_timer(t0 + ms(50), 1_050, false), TimerOutcome::NotDue);

    let outcome = state.on_timer(t0 + GATE_RETRY_DELAY, 1_100, false);
    assert_eq!(sequences(&outcome), vec![1]);
    if let TimerOutcome::Deliver { notification, .. } = outcome {
        assert_eq!(notification.notification_type, NotificationType::Urgent);
        assert_eq!(notification.sequence, 1);
        assert_eq!(notification.events_in_buffer, 0);
        assert_eq!(notification.last_notification_ms, None);
    }
}

#[test]
fn large_backlog_is_flushed_in_batches_with_urgent_rearm() {
    let t0 = Instant::now();
    let counters = EventCounters::new();
    let config = mode(None, 2, 10, 2, ms(0), ms(0));
    let mut state = BufferState::new(config, t0);

    for i in 0..5 {
        state.add(counters.stamp(WebEvent::new(100_001, format!("e{i}"))), t0);
    }
    assert_eq!(state.timer(), TimerState::UrgentArmed { due: t0 });

    let first = state.on_timer(t0, 10, false);
    assert_eq!(sequences(&first), vec![1, 2]);
    if let TimerOutcome::Deliver { urgent, notification } = &first {
        assert_eq!(*urgent, Some(UrgentDecision::Armed { due: t0 }));
        assert_eq!(notification.events_in_buffer, 3);
    }

    let second = state.on_timer(t0, 20, false);
    assert_eq!(sequences(&second), vec![3, 4]);
    if let TimerOutcome::Deliver { urgent, .. } = &second {
        assert_eq!(*urgent, None);
    }
    assert_eq!(state.on_timer(t0, 30, false), TimerOutcome::NotDue);

    let flush = state.take_flush_batch(40).expect("one record left");
    assert_eq!(flush.notification_type, NotificationType::Flush);
    assert_eq!(flush.sequence, 3);
    assert_eq!(flush.last_notification_ms, Some(20));
    assert_eq!(flush.events.len(), 1);
    assert!(state.take_flush_batch(50).is_none());
    assert_eq!(state.last_notification_sequence(), 3);
    assert_eq!(state.last_flush_ms(), Some(40));
}

#[test]
fn explicit_flush_does_not_touch_scheduled_flush_time() {
    let t0 = Instant::now();
    let counters = EventCounters::new();
    let config = mode(Some(ms(1_000)), 5, 10, 10, ms(0), ms(0));
    let mut state = BufferState::new(config, t0);

    state.add(counters.stamp(WebEvent::new(100_001, "x")), t0);
    assert!(state.take_flush_batch(1).is_some());
    assert_eq!(state.scheduler().last_scheduled_flush(), None);
    assert_eq!(state.timer(), TimerState::RegularArmed { due: t0 + ms(1_000) });
}

#[test]
fn empty_timer_fire_rearms_regular_cadence() {
    let t0 = Instant::now();
    let config = mode(Some(ms(100)), 5, 10, 10, ms(0), ms(0));
    let mut state = BufferState::new(config, t0);

    assert_eq!(
        state.on_timer(t0 + ms(100), 0, false),
        TimerOutcome::Empty {
            fired: NotificationType::Regular
        }
    );
    assert_eq!(state.timer(), TimerState::RegularArmed { due: t0 + ms(200) });
}

#[test]
fn discards_are_reported_once_on_next_notification() {
    let t0 = Instant::now();
    let counters = EventCounters::new();
    let config = mode(Some(ms(100)), 2, 2, 2, ms(0), ms(0));
    let mut state = BufferState::new(config, t0);

    for i in 0..4 {
        let outcome = state.add(counters.stamp(WebEvent::new(100_001, format!("e{i}"))), t0);
        assert_eq!(outcome.displaced.is_some(), i >= 2);
    }

    let outcome = state.on_timer(t0 + ms(100), 500, false);
    assert_eq!(sequences(&outcome), vec![3, 4]);
    if let TimerOutcome::Deliver { notification, .. } = outcome {
        assert_eq!(notification.discarded_since_last_notification, 2);
    }

    state.add(counters.stamp(WebEvent::new(100_001, "late")), t0 + ms(150));
    let flush = state.take_flush_batch(600).unwrap();
    assert_eq!(flush.discarded_since_last_notification, 0);
    assert_eq!(flush.last_notification_ms, Some(500));
}
