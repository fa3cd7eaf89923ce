//! Structured events emitted by the engine on every state change.
//!
//! These are the department-assignment events consumers subscribe to for
//! boards, alerts and the audit trail. Tracing output is for operators;
//! events are for downstream systems.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::department::Department;
use crate::model::{EntryId, OrderId, OrderNumber, OrderStatus, WorkerId};

/// A structured event emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence number. Consumers can detect gaps.
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    /// Caller that caused the event. Audit only.
    pub actor: String,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    OrderCreated {
        order: OrderId,
        number: OrderNumber,
    },
    EnteredFactory {
        order: OrderId,
    },
    DepartmentEntered {
        order: OrderId,
        entry: EntryId,
        department: Department,
        sequence: u8,
    },
    WorkerAssigned {
        order: OrderId,
        entry: EntryId,
        department: Department,
        worker: WorkerId,
        manual: bool,
    },
    OrderQueued {
        order: OrderId,
        entry: EntryId,
        department: Department,
        position: usize,
    },
    WorkStarted {
        order: OrderId,
        entry: EntryId,
        worker: WorkerId,
    },
    DepartmentCompleted {
        order: OrderId,
        entry: EntryId,
        department: Department,
        worker: WorkerId,
        duration_ms: i64,
    },
    DepartmentSkipped {
        order: OrderId,
        entry: EntryId,
        department: Department,
    },
    OrderCompleted {
        order: OrderId,
    },
    OrderStatusChanged {
        order: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },
    WorkerRostered {
        worker: WorkerId,
        department: Department,
        active: bool,
    },
    /// Persisted event this build does not recognize.
    #[serde(skip)]
    Unknown { raw: String },
}

/// In-memory, append-only event stream.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    events: Vec<Event>,
    next_seq: u64,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            next_seq: 1,
        }
    }

    /// Restore a persisted stream. Sequence continues after the highest seq.
    pub fn from_events(events: Vec<Event>) -> Self {
        let next_seq = events.iter().map(|e| e.seq).max().unwrap_or(0) + 1;
        Self { events, next_seq }
    }

    pub fn record(&mut self, actor: &str, kind: EventKind) -> &Event {
        let seq = self.next_seq.max(1);
        self.next_seq = seq + 1;
        self.events.push(Event {
            seq,
            timestamp: Utc::now(),
            actor: actor.to_string(),
            kind,
        });
        &self.events[self.events.len() - 1]
    }

    /// Events with `seq > since_seq`, oldest first.
    pub fn since(&self, since_seq: u64) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| e.seq > since_seq)
            .cloned()
            .collect()
    }

    pub fn last_seq(&self) -> u64 {
        self.events.last().map_or(0, |e| e.seq)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_is_monotonic_and_resumes_after_restore() {
        let mut log = EventLog::new();
        log.record("office", EventKind::EnteredFactory { order: OrderId::new() });
        log.record("office", EventKind::OrderCompleted { order: OrderId::new() });
        assert_eq!(log.last_seq(), 2);

        let mut restored = EventLog::from_events(log.since(0));
        let next = restored.record("office", EventKind::EnteredFactory { order: OrderId::new() });
        assert_eq!(next.seq, 3);
        assert_eq!(restored.since(1).len(), 2);
    }

    #[test]
    fn kinds_are_tagged_snake_case() {
        let kind = EventKind::OrderQueued {
            order: OrderId::new(),
            entry: EntryId::new(),
            department: Department::Setting,
            position: 2,
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "order_queued");
        assert_eq!(json["department"], "SETTING");
    }
}
