//! Read-only board projections for Kanban rendering.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::Engine;
use crate::department::Department;
use crate::model::{EntryId, EntryStatus, OrderId, OrderNumber, Priority, WorkerId};

/// One order as it sits in a department column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoardCard {
    pub order: OrderId,
    pub number: OrderNumber,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub entry: EntryId,
    pub status: EntryStatus,
    pub worker: Option<WorkerId>,
    pub entered_at: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
    pub seconds_in_department: i64,
    /// Set while the order waits for a worker.
    pub queue_position: Option<usize>,
    pub overdue: bool,
}

/// A whole department column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentColumn {
    pub department: Department,
    pub label: &'static str,
    pub queued: usize,
    pub active: usize,
    pub cards: Vec<BoardCard>,
}

impl Engine {
    /// Orders currently at `department`, oldest arrival first.
    ///
    /// Includes orders whose entry is complete but not yet advanced.
    pub fn department_board(&self, department: Department, now: DateTime<Utc>) -> Vec<BoardCard> {
        let mut cards: Vec<BoardCard> = self
            .orders
            .values()
            .filter(|o| o.current_department == Some(department))
            .filter_map(|order| {
                let entry = self
                    .ledger
                    .latest(order.id)
                    .filter(|e| e.department == department)?;
                let queue_position = self
                    .queues
                    .position_of(order.id)
                    .filter(|(d, _)| *d == department)
                    .map(|(_, pos)| pos);
                Some(BoardCard {
                    order: order.id,
                    number: order.number.clone(),
                    priority: order.priority,
                    due_date: order.due_date,
                    entry: entry.id,
                    status: entry.status,
                    worker: entry.worker.clone(),
                    entered_at: entry.entered_at,
                    exited_at: entry.exited_at,
                    seconds_in_department: entry.time_in_department(now).num_seconds(),
                    queue_position,
                    overdue: order.is_overdue(now),
                })
            })
            .collect();

        cards.sort_by(|a, b| {
            a.entered_at
                .cmp(&b.entered_at)
                .then_with(|| a.queue_position.cmp(&b.queue_position))
                .then_with(|| a.number.cmp(&b.number))
        });
        cards
    }

    /// Every department column in production order.
    pub fn factory_board(&self, now: DateTime<Utc>) -> Vec<DepartmentColumn> {
        Department::all()
            .into_iter()
            .map(|department| {
                let cards = self.department_board(department, now);
                DepartmentColumn {
                    department,
                    label: department.label(),
                    queued: self.queues.len(department),
                    active: cards.iter().filter(|c| c.status.is_active()).count(),
                    cards,
                }
            })
            .collect()
    }
}
