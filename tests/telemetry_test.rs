//! Integration tests for telemetry initialization and span helpers.

use std::path::PathBuf;

use factory_routing::config::Config;
use factory_routing::department::Department;
use factory_routing::model::OrderId;
use factory_routing::telemetry::{TelemetryConfig, init_telemetry, metrics, routing};
use opentelemetry::KeyValue;

#[test]
fn telemetry_initializes_without_endpoint() {
    // Note: tracing subscriber can only be set once per process.
    // Using try_init() in the implementation avoids panics if another
    // test already initialized a subscriber.
    let config = TelemetryConfig::local("factory-routing-test");
    // This may return Err if a global subscriber was already set by
    // another test in this process; that is acceptable.
    let _guard = init_telemetry(config);
}

#[test]
fn telemetry_config_follows_routing_config() {
    let config = Config {
        database_path: PathBuf::from("/tmp/routing.db"),
        roster_path: None,
        max_active_per_worker: None,
        otel_endpoint: Some("http://localhost:4317".to_string()),
        log_level: "debug".to_string(),
    };

    let telemetry = TelemetryConfig::from_config(&config, "factory-routing");
    assert_eq!(telemetry.endpoint.as_deref(), Some("http://localhost:4317"));
    assert_eq!(telemetry.service_name, "factory-routing");
    assert_eq!(telemetry.log_level, "debug");

    let local = TelemetryConfig::local("factory-routing");
    assert!(local.endpoint.is_none());
}

#[test]
fn routing_span_records_department_and_transition() {
    let id = OrderId::new();
    let span = routing::start_routing_span("advance", &id);
    routing::record_department(&span, Department::Casting);
    routing::record_entry_transition(&span, "ASSIGNED", "COMPLETED");
}

#[test]
fn metric_instruments_accept_recordings() {
    metrics::assignments().add(
        1,
        &[
            KeyValue::new("department", "CAD"),
            KeyValue::new("mode", "auto"),
        ],
    );
    metrics::queued().add(1, &[KeyValue::new("department", "SETTING")]);
    metrics::department_dwell_ms().record(1250.0, &[KeyValue::new("department", "CAD")]);
}
