//! Department tracking entries: one row per (order, department) visit.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderId, WorkerId};
use crate::department::Department;

/// One visit of one order to one department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEntry {
    pub id: EntryId,
    pub order_id: OrderId,
    pub department: Department,
    /// Position of `department` in the production path (1-9).
    pub sequence: u8,
    pub status: EntryStatus,
    pub worker: Option<WorkerId>,
    pub entered_at: DateTime<Utc>,
    /// None while the entry is open.
    pub exited_at: Option<DateTime<Utc>>,
    /// Photos, files, notes. Opaque to the engine.
    pub work_data: serde_json::Value,
    /// Who opened this entry. Audit only.
    pub actor: String,
}

impl TrackingEntry {
    pub fn is_open(&self) -> bool {
        self.exited_at.is_none()
    }

    /// Does this entry count against its worker's load?
    pub fn holds_worker(&self) -> bool {
        self.worker.is_some() && self.status.is_active()
    }

    /// Time spent in the department: up to `now` while open, else until exit.
    pub fn time_in_department(&self, now: DateTime<Utc>) -> Duration {
        let end = self.exited_at.unwrap_or(now);
        (end - self.entered_at).max(Duration::zero())
    }
}

/// Newtype for entry IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub Uuid);

impl EntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Lifecycle state of a tracking entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    /// Waiting in the department queue for a worker.
    PendingAssignment,
    /// Worker assigned, work not started.
    Assigned,
    /// Worker actively on it.
    InProgress,
    /// Done. Terminal.
    Completed,
    /// Passed over by an administrator. Terminal.
    Skipped,
}

impl EntryStatus {
    /// Can transition from self to `to` on the normal path?
    pub fn can_transition_to(self, to: EntryStatus) -> bool {
        use EntryStatus::*;
        matches!(
            (self, to),
            (PendingAssignment, Assigned)
                | (Assigned, InProgress)
                | (Assigned, Completed)
                | (InProgress, Completed)
        )
    }

    /// Can an administrator skip an entry in this state?
    pub fn can_skip(self) -> bool {
        matches!(self, EntryStatus::PendingAssignment | EntryStatus::Assigned)
    }

    /// Assigned or in progress.
    pub fn is_active(self) -> bool {
        matches!(self, EntryStatus::Assigned | EntryStatus::InProgress)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EntryStatus::Completed | EntryStatus::Skipped)
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntryStatus::PendingAssignment => "PENDING_ASSIGNMENT",
            EntryStatus::Assigned => "ASSIGNED",
            EntryStatus::InProgress => "IN_PROGRESS",
            EntryStatus::Completed => "COMPLETED",
            EntryStatus::Skipped => "SKIPPED",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for EntryStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_ASSIGNMENT" => Ok(EntryStatus::PendingAssignment),
            "ASSIGNED" => Ok(EntryStatus::Assigned),
            "IN_PROGRESS" => Ok(EntryStatus::InProgress),
            "COMPLETED" => Ok(EntryStatus::Completed),
            "SKIPPED" => Ok(EntryStatus::Skipped),
            _ => Err(crate::error::Error::Other(format!("unknown entry status: {s}"))),
        }
    }
}
