//! Error types for factory-routing.
//!
//! Validation failures are non-retriable: the caller re-reads current state
//! and issues the correct operation. `ConcurrentModification` is the only
//! variant a caller is expected to retry, with fresh state.

use thiserror::Error;

use crate::department::Department;
use crate::model::{EntryId, EntryStatus, OrderId, OrderStatus};

#[derive(Debug, Error)]
pub enum Error {
    /// The order is somewhere the requested move cannot start from.
    #[error("invalid transition for order {order}: {reason}")]
    InvalidTransition { order: OrderId, reason: String },

    #[error("order {order} already has an open entry in {department}")]
    DuplicateOpenEntry {
        order: OrderId,
        department: Department,
    },

    #[error("entry {entry} cannot move {from} -> {to}")]
    InvalidState {
        entry: EntryId,
        from: EntryStatus,
        to: EntryStatus,
    },

    #[error("entry {0} has no assigned worker")]
    UnassignedEntry(EntryId),

    #[error("order {order} is already in the factory at {department}")]
    AlreadyInFactory {
        order: OrderId,
        department: Department,
    },

    #[error("order {0} has no department entry to advance")]
    NoOpenEntry(OrderId),

    #[error("order status cannot move {from} -> {to}")]
    InvalidOrderStatus { from: OrderStatus, to: OrderStatus },

    #[error("order {order} was modified concurrently (expected version {expected})")]
    ConcurrentModification { order: OrderId, expected: u64 },

    /// Another writer changed assignments or the roster of this department.
    #[error("department {department} was modified concurrently (expected version {expected})")]
    ConcurrentDepartmentModification {
        department: Department,
        expected: u64,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Validation failures are fixed by the caller, never by retrying.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Error::ConcurrentModification { .. } | Error::ConcurrentDepartmentModification { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
