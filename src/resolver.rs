//! Assignment resolver: assign the entering order to a worker, or queue it.
//!
//! `decide` is a pure read over directory, ledger and queues. `resolve`
//! applies the decision. Both are safe to call again on unchanged state.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::department::Department;
use crate::directory::WorkerDirectory;
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::model::{EntryStatus, OrderId, WorkerId};
use crate::queue::{DepartmentQueues, QueuedOrder};

/// What the resolver would do right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Assign { worker: WorkerId, active_assignments: usize },
    Queue { position: usize },
}

/// What the resolver did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    Assigned { worker: WorkerId },
    Queued { position: usize },
}

impl Resolution {
    pub fn is_assigned(&self) -> bool {
        matches!(self, Resolution::Assigned { .. })
    }

    pub fn worker(&self) -> Option<&WorkerId> {
        match self {
            Resolution::Assigned { worker } => Some(worker),
            Resolution::Queued { .. } => None,
        }
    }

    pub fn queue_position(&self) -> Option<usize> {
        match self {
            Resolution::Assigned { .. } => None,
            Resolution::Queued { position } => Some(*position),
        }
    }
}

/// Least-loaded assignment with an optional per-worker cap.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    /// Workers holding this many entries are treated as unavailable.
    pub max_active_per_worker: Option<usize>,
}

impl Resolver {
    pub fn new(max_active_per_worker: Option<usize>) -> Self {
        Self {
            max_active_per_worker,
        }
    }

    /// Decide without changing anything.
    pub fn decide(
        &self,
        order_id: OrderId,
        department: Department,
        directory: &WorkerDirectory,
        ledger: &Ledger,
        queues: &DepartmentQueues,
    ) -> Decision {
        match directory.least_loaded_below(department, ledger, self.max_active_per_worker) {
            Some(load) => Decision::Assign {
                worker: load.worker.id,
                active_assignments: load.active_assignments,
            },
            None => {
                let position = match queues.position_of(order_id) {
                    Some((queued_in, position)) if queued_in == department => position,
                    _ => queues.len(department) + 1,
                };
                Decision::Queue { position }
            }
        }
    }

    /// Assign or queue the order's open entry in `department`.
    pub fn resolve(
        &self,
        order_id: OrderId,
        department: Department,
        directory: &WorkerDirectory,
        ledger: &mut Ledger,
        queues: &mut DepartmentQueues,
        now: DateTime<Utc>,
    ) -> Result<Resolution> {
        let entry = ledger.open_entry(order_id).ok_or_else(|| Error::InvalidTransition {
            order: order_id,
            reason: format!("no open entry to resolve in {department}"),
        })?;

        if entry.department != department {
            return Err(Error::InvalidTransition {
                order: order_id,
                reason: format!(
                    "open entry is in {}, close it before resolving {department}",
                    entry.department
                ),
            });
        }

        let entry_id = entry.id;
        match (entry.status, entry.worker.clone()) {
            (EntryStatus::PendingAssignment, _) => {}
            // Already resolved: report what stands.
            (_, Some(worker)) => return Ok(Resolution::Assigned { worker }),
            (status, None) => {
                return Err(Error::InvalidState {
                    entry: entry_id,
                    from: status,
                    to: EntryStatus::Assigned,
                });
            }
        }

        match self.decide(order_id, department, directory, ledger, queues) {
            Decision::Assign { worker, .. } => {
                ledger.assign(entry_id, worker.clone())?;
                queues.remove(order_id);
                Ok(Resolution::Assigned { worker })
            }
            Decision::Queue { position } => {
                if queues.position_of(order_id) == Some((department, position)) {
                    return Ok(Resolution::Queued { position });
                }
                let position = queues.enqueue(
                    department,
                    QueuedOrder {
                        order_id,
                        entry_id,
                        enqueued_at: now,
                    },
                );
                Ok(Resolution::Queued { position })
            }
        }
    }
}
