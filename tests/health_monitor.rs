use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use healthmon::event::codes;
use healthmon::{
    EventRecord, HealthMonitor, HealthMonitorConfig, MemorySink, MonitorError, NotificationType,
    RuleFiringState, WebEvent,
};

fn wait_for<F>(timeout: Duration, mut predicate: F)
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("condition not met within {:?}", timeout);
}

const ROUTING: &str = r#"{
    "buffer_modes": {
        "Held": {
            "regular_flush_interval_ms": "infinite",
            "urgent_flush_threshold": 100,
            "max_buffer_size": 100,
            "max_flush_batch_size": 50,
            "urgent_flush_interval_ms": 60000,
            "burst_wait_ms": 60000
        }
    },
    "providers": [
        { "name": "errors", "kind": "memory", "buffer": true, "buffer_mode": "Held" },
        { "name": "audits", "kind": "memory" },
        { "name": "throttled", "kind": "memory" }
    ],
    "rules": [
        { "name": "all errors", "event_codes": { "start": 3000, "end": 3999 }, "provider": "errors" },
        { "name": "error dupes", "category": "error", "provider": "errors" },
        { "name": "failed audits", "category": "failure_audit", "provider": "audits" },
        { "name": "third to fourth", "event_codes": { "start": 100000, "end": 100000 }, "provider": "throttled", "min_instances": 3, "max_limit": 4 }
    ]
}"#;

struct Harness {
    monitor: HealthMonitor,
    errors: Arc<MemorySink>,
    audits: Arc<MemorySink>,
    throttled: Arc<MemorySink>,
}

fn harness(json: &str) -> Harness {
    let config = HealthMonitorConfig::from_json_str(json).unwrap();
    let errors = Arc::new(MemorySink::new());
    let audits = Arc::new(MemorySink::new());
    let throttled = Arc::new(MemorySink::new());
    let monitor = HealthMonitor::builder(config)
        .with_sink("errors", errors.clone())
        .with_sink("audits", audits.clone())
        .with_sink("throttled", throttled.clone())
        .build()
        .unwrap();
    Harness {
        monitor,
        errors,
        audits,
        throttled,
    }
}

#[test]
fn events_are_routed_by_rules() {
    let h = harness(ROUTING);

    assert_eq!(
        h.monitor
            .raise(WebEvent::new(codes::WEB_ERROR_PARSER_ERROR, "bad markup"))
            .unwrap(),
        1
    );
    assert_eq!(
        h.monitor
            .raise(WebEvent::new(codes::AUDIT_FILE_AUTHORIZATION_FAILURE, "denied"))
            .unwrap(),
        1
    );
    assert_eq!(
        h.monitor
            .raise(WebEvent::new(codes::APPLICATION_START, "started"))
            .unwrap(),
        0
    );

    // Unbuffered provider sees the audit immediately; the buffered one holds the error.
    assert_eq!(h.audits.event_count(), 1);
    assert_eq!(h.errors.event_count(), 0);

    let summary = h.monitor.flush("errors").unwrap();
    assert_eq!(summary.events, 1);
    let delivered = h.errors.notifications();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].notification_type, NotificationType::Flush);
    assert_eq!(delivered[0].events[0].code(), codes::WEB_ERROR_PARSER_ERROR);
    assert_eq!(h.monitor.counters().last_sequence(), 3);
}

#[test]
fn provider_receives_an_event_once_per_raise() {
    let h = harness(ROUTING);
    h.monitor
        .raise(WebEvent::new(codes::WEB_ERROR_COMPILATION_ERROR, "twice matched"))
        .unwrap();
    h.monitor.flush_all();
    assert_eq!(h.errors.event_count(), 1);
    // The shadowed rule still counts the match.
    let dupes = h.monitor.rule("error dupes").unwrap();
    assert_eq!(dupes.firing_state().times_raised, 1);
}

#[test]
fn rules_sharing_a_provider_keep_their_own_throttles() {
    let json = r#"{
        "providers": [{ "name": "shared", "kind": "memory" }],
        "rules": [
            { "name": "first only", "category": "error", "provider": "shared", "max_limit": 1 },
            { "name": "from second", "category": "error", "provider": "shared", "min_instances": 2 }
        ]
    }"#;
    let config = HealthMonitorConfig::from_json_str(json).unwrap();
    let shared = Arc::new(MemorySink::new());
    let monitor = HealthMonitor::builder(config)
        .with_sink("shared", shared.clone())
        .build()
        .unwrap();

    for _ in 0..2 {
        assert_eq!(
            monitor
                .raise(WebEvent::new(codes::WEB_ERROR_OTHER_ERROR, "shared"))
                .unwrap(),
            1
        );
    }

    assert_eq!(shared.event_count(), 2);
    assert_eq!(
        monitor.rule("first only").unwrap().firing_state().times_raised,
        2
    );
    assert_eq!(
        monitor.rule("from second").unwrap().firing_state().times_raised,
        2
    );
}

#[test]
fn rule_throttles_limit_delivery() {
    let h = harness(ROUTING);
    for i in 0..6 {
        h.monitor
            .raise(WebEvent::new(codes::WEB_EXTENDED_BASE, format!("custom {i}")))
            .unwrap();
    }
    let occurrences: Vec<u64> = h.throttled.events().iter().map(|r| r.occurrence()).collect();
    assert_eq!(occurrences, vec![3, 4]);
    assert_eq!(h.monitor.counters().occurrences(codes::WEB_EXTENDED_BASE), 6);
}

#[test]
fn custom_evaluator_can_be_attached_by_rule_name() {
    let config = HealthMonitorConfig::from_json_str(ROUTING).unwrap();
    let audits = Arc::new(MemorySink::new());
    let monitor = HealthMonitor::builder(config)
        .with_sink("audits", audits.clone())
        .with_evaluator(
            "failed audits",
            Arc::new(|record: &EventRecord, _: &RuleFiringState| record.message() != "ignore"),
        )
        .build()
        .unwrap();

    monitor
        .raise(WebEvent::new(codes::AUDIT_URL_AUTHORIZATION_FAILURE, "ignore"))
        .unwrap();
    monitor
        .raise(WebEvent::new(codes::AUDIT_URL_AUTHORIZATION_FAILURE, "keep"))
        .unwrap();

    let messages: Vec<String> = audits
        .events()
        .iter()
        .map(|r| r.message().to_string())
        .collect();
    assert_eq!(messages, vec!["keep".to_string()]);
}

#[test]
fn builder_rejects_unknown_overrides() {
    let config = HealthMonitorConfig::from_json_str(ROUTING).unwrap();
    let result = HealthMonitor::builder(config.clone())
        .with_sink("nobody", Arc::new(MemorySink::new()))
        .build();
    assert!(matches!(result, Err(MonitorError::UnknownProvider(_))));

    let result = HealthMonitor::builder(config)
        .with_evaluator("nothing", Arc::new(|_: &EventRecord, _: &RuleFiringState| true))
        .build();
    assert!(matches!(result, Err(MonitorError::UnknownRule(_))));
}

#[test]
fn flush_of_unknown_provider_is_an_error() {
    let h = harness(ROUTING);
    assert!(matches!(
        h.monitor.flush("missing"),
        Err(MonitorError::UnknownProvider(name)) if name == "missing"
    ));
}

#[test]
fn shutdown_drains_buffered_providers_and_stops_raising() {
    let h = harness(ROUTING);
    for _ in 0..3 {
        h.monitor
            .raise(WebEvent::new(codes::WEB_ERROR_OTHER_ERROR, "pending"))
            .unwrap();
    }
    let summary = h.monitor.shutdown();
    assert_eq!(summary.events, 3);
    assert_eq!(h.errors.event_count(), 3);
    assert!(matches!(
        h.monitor.raise(WebEvent::new(codes::WEB_ERROR_OTHER_ERROR, "late")),
        Err(MonitorError::ShutDown)
    ));
    assert_eq!(h.monitor.shutdown().events, 0);
}

#[test]
fn disabled_monitor_ignores_events() {
    let json = ROUTING.replacen('{', "{ \"enabled\": false,", 1);
    let h = harness(&json);
    assert_eq!(
        h.monitor
            .raise(WebEvent::new(codes::AUDIT_FILE_AUTHORIZATION_FAILURE, "x"))
            .unwrap(),
        0
    );
    assert_eq!(h.audits.event_count(), 0);
    assert_eq!(h.monitor.counters().last_sequence(), 0);
}

#[test]
fn heartbeat_raises_periodic_events() {
    let json = r#"{
        "heartbeat_interval_ms": 20,
        "providers": [{ "name": "beats", "kind": "memory" }],
        "rules": [{ "name": "heartbeats", "category": "heartbeat", "provider": "beats" }]
    }"#;
    let config = HealthMonitorConfig::from_json_str(json).unwrap();
    let beats = Arc::new(MemorySink::new());
    let monitor = HealthMonitor::builder(config)
        .with_sink("beats", beats.clone())
        .build()
        .unwrap();

    wait_for(Duration::from_secs(2), || beats.event_count() >= 3);
    monitor.shutdown();
    let after_shutdown = beats.event_count();
    thread::sleep(Duration::from_millis(60));
    assert_eq!(beats.event_count(), after_shutdown);
    let events = beats.events();
    assert!(events.iter().all(|r| r.code() == codes::APPLICATION_HEARTBEAT));
    let details = &events[0].event().details;
    assert_eq!(details["process_id"], std::process::id().to_string());
    assert!(details.contains_key("uptime_ms"));
    // Each heartbeat sees the ones raised before it.
    assert_eq!(events[2].event().details["events_raised"], "2");
}

#[test]
fn metrics_cover_every_provider() {
    let h = harness(ROUTING);
    h.monitor
        .raise(WebEvent::new(codes::WEB_ERROR_OTHER_ERROR, "counted"))
        .unwrap();
    let metrics = h.monitor.metrics();
    assert_eq!(metrics.len(), 3);
    let errors = metrics
        .iter()
        .find(|(name, _)| name == "errors")
        .map(|(_, metrics)| metrics.clone())
        .unwrap();
    assert_eq!(errors.events_enqueued_total, 1);
    assert_eq!(errors.queue_depth, 1);
    assert!(h
        .monitor
        .render_metrics()
        .contains("healthmon_queue_depth{buffer=\"errors\"} 1"));
}
