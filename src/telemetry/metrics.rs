//! Metric instrument factories.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"factory-routing"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("factory-routing")
}

/// Counter: orders sent into the factory.
/// Labels: `result` ("assigned" | "queued" | "error").
pub fn orders_entered() -> Counter<u64> {
    meter()
        .u64_counter("routing.orders.entered")
        .with_description("Orders sent to the factory")
        .build()
}

/// Counter: worker assignments.
/// Labels: `department`, `mode` ("auto" | "manual" | "dispatch").
pub fn assignments() -> Counter<u64> {
    meter()
        .u64_counter("routing.assignments")
        .with_description("Department entries assigned to a worker")
        .build()
}

/// Counter: orders put in a department queue.
/// Labels: `department`.
pub fn queued() -> Counter<u64> {
    meter()
        .u64_counter("routing.queued")
        .with_description("Orders queued for lack of an assignable worker")
        .build()
}

/// Counter: department advances.
/// Labels: `from`, `to` (department, or "completed").
pub fn advances() -> Counter<u64> {
    meter()
        .u64_counter("routing.advances")
        .with_description("Orders moved to their next department")
        .build()
}

/// Counter: orders that finished the whole department path.
pub fn orders_completed() -> Counter<u64> {
    meter()
        .u64_counter("routing.orders.completed")
        .with_description("Orders that finished the department path")
        .build()
}

/// Histogram: time an order spent in a department, in milliseconds.
/// Labels: `department`.
pub fn department_dwell_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("routing.department.dwell_ms")
        .with_description("Time spent in a department")
        .with_unit("ms")
        .build()
}
