//! Core data model.
//!
//! An order is one customer job moving through the factory. Each visit to a
//! department is a tracking entry; workers are the people who take entries.

mod entry;
mod worker;

pub use entry::{EntryId, EntryStatus, TrackingEntry};
pub use worker::{Worker, WorkerId, WorkerLoad};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::department::Department;

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// A customer job tracked by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique identifier.
    pub id: OrderId,

    /// Human-readable number, sequential within a year.
    pub number: OrderNumber,

    pub customer: Option<String>,
    pub notes: Option<String>,

    pub priority: Priority,

    pub due_date: Option<NaiveDate>,

    /// Department of the latest entry. None before the factory and after completion.
    pub current_department: Option<Department>,

    pub status: OrderStatus,

    /// Bumped on every mutation. Used for optimistic concurrency when saving.
    pub version: u64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Past its due date and not yet finished?
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => due < now.date_naive() && !self.status.is_finished(),
            None => false,
        }
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = now;
    }
}

/// Newtype for order IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Year-scoped order number, e.g. `ORD-2026-0042`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderNumber(pub String);

impl OrderNumber {
    pub fn new(year: i32, seq: u32) -> Self {
        Self(format!("ORD-{year}-{seq:04}"))
    }

    /// Year and sequence, if the number is in the standard form.
    pub fn parts(&self) -> Option<(i32, u32)> {
        let mut parts = self.0.strip_prefix("ORD-")?.splitn(2, '-');
        let year = parts.next()?.parse().ok()?;
        let seq = parts.next()?.parse().ok()?;
        Some((year, seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::Low => "LOW",
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Priority {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Priority::Low),
            "NORMAL" => Ok(Priority::Normal),
            "HIGH" => Ok(Priority::High),
            "URGENT" => Ok(Priority::Urgent),
            _ => Err(crate::error::Error::Other(format!("unknown priority: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Order status
// ---------------------------------------------------------------------------

/// Lifecycle state of an order as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Being drafted by the office. Not yet in the factory.
    Draft,
    /// Ready to be sent to the factory.
    Pending,
    /// Somewhere on the department path.
    InProgress,
    /// Inspected after the last department, before delivery.
    QualityCheck,
    /// Finished the department path.
    Completed,
    /// Handed to the customer. Terminal.
    Delivered,
    /// Abandoned before entering the factory. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Draft, Pending)
                | (Draft, InProgress)
                | (Pending, InProgress)
                | (Draft, Cancelled)
                | (Pending, Cancelled)
                | (InProgress, Completed)
                | (Completed, QualityCheck)
                | (Completed, Delivered)
                | (QualityCheck, Delivered)
        )
    }

    /// May this order be sent to the factory from here?
    pub fn can_enter_factory(self) -> bool {
        matches!(self, OrderStatus::Draft | OrderStatus::Pending)
    }

    /// Off the factory path for good?
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            OrderStatus::Completed
                | OrderStatus::QualityCheck
                | OrderStatus::Delivered
                | OrderStatus::Cancelled
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Draft => "DRAFT",
            OrderStatus::Pending => "PENDING",
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::QualityCheck => "QUALITY_CHECK",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(OrderStatus::Draft),
            "PENDING" => Ok(OrderStatus::Pending),
            "IN_PROGRESS" => Ok(OrderStatus::InProgress),
            "QUALITY_CHECK" => Ok(OrderStatus::QualityCheck),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            _ => Err(crate::error::Error::Other(format!("unknown order status: {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for new orders. The engine assigns the id and number.
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub(crate) customer: Option<String>,
    pub(crate) notes: Option<String>,
    pub(crate) priority: Priority,
    pub(crate) due_date: Option<NaiveDate>,
}

impl NewOrder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = Some(customer.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn due(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub(crate) fn build(self, number: OrderNumber, now: DateTime<Utc>) -> Order {
        Order {
            id: OrderId::new(),
            number,
            customer: self.customer,
            notes: self.notes,
            priority: self.priority,
            due_date: self.due_date,
            current_department: None,
            status: OrderStatus::Draft,
            version: 1,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// The year an order number is scoped to.
pub(crate) fn number_year(now: DateTime<Utc>) -> i32 {
    now.year()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_number_is_zero_padded_and_parses_back() {
        let n = OrderNumber::new(2026, 7);
        assert_eq!(n.as_str(), "ORD-2026-0007");
        assert_eq!(n.parts(), Some((2026, 7)));
        assert_eq!(OrderNumber("legacy-17".into()).parts(), None);
    }

    #[test]
    fn factory_statuses_only_enter_from_pre_factory() {
        assert!(OrderStatus::Draft.can_enter_factory());
        assert!(OrderStatus::Pending.can_enter_factory());
        assert!(!OrderStatus::InProgress.can_enter_factory());
        assert!(!OrderStatus::Completed.can_enter_factory());
        assert!(!OrderStatus::Cancelled.can_enter_factory());
    }

    #[test]
    fn cancel_is_only_reachable_before_the_factory() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::InProgress.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn overdue_ignores_finished_orders() {
        let now = Utc::now();
        let mut order = NewOrder::new()
            .due(now.date_naive() - chrono::Duration::days(1))
            .build(OrderNumber::new(2026, 1), now);
        assert!(order.is_overdue(now));
        order.status = OrderStatus::Completed;
        assert!(!order.is_overdue(now));
    }

    #[test]
    fn priority_orders_low_to_urgent() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::Low < Priority::Normal);
        assert_eq!("urgent".parse::<Priority>().unwrap(), Priority::Urgent);
    }
}
