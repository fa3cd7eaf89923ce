//! Routing span helpers.
//!
//! Spans wrap one engine operation on one order; entry transitions are
//! recorded as events inside the span.

use tracing::Span;

use crate::department::Department;
use crate::model::OrderId;

/// Start a span for an engine operation on an order.
///
/// The `routing.department` field is declared empty and filled once the
/// operation knows which department it lands in.
pub fn start_routing_span(operation: &str, order: &OrderId) -> Span {
    tracing::info_span!(
        "routing.operation",
        "routing.operation" = operation,
        "routing.order" = %order,
        "routing.department" = tracing::field::Empty,
    )
}

/// Fill the department on a span started by [`start_routing_span`].
pub fn record_department(span: &Span, department: Department) {
    span.record("routing.department", department.as_str());
}

/// Record an entry state transition on the given span.
pub fn record_entry_transition(span: &Span, from: &str, to: &str) {
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "entry_transition");
    });
}
