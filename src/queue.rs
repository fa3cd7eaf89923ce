//! Per-department waiting lists.
//!
//! Orders wait here, in arrival order, while their department has no
//! assignable worker. An order sits in at most one queue at a time.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::department::Department;
use crate::model::{EntryId, OrderId};

/// One waiting order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedOrder {
    pub order_id: OrderId,
    pub entry_id: EntryId,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone)]
pub struct DepartmentQueues {
    queues: HashMap<Department, VecDeque<QueuedOrder>>,
}

impl DepartmentQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the tail. Returns the 1-based position at insertion.
    ///
    /// An order already waiting anywhere is moved rather than duplicated.
    pub fn enqueue(&mut self, department: Department, item: QueuedOrder) -> usize {
        self.remove(item.order_id);
        let queue = self.queues.entry(department).or_default();
        queue.push_back(item);
        queue.len()
    }

    /// Take the head of a department's queue.
    pub fn pop_front(&mut self, department: Department) -> Option<QueuedOrder> {
        self.queues.get_mut(&department)?.pop_front()
    }

    pub fn peek(&self, department: Department) -> Option<&QueuedOrder> {
        self.queues.get(&department)?.front()
    }

    /// Remove an order wherever it waits. Returns where it was.
    pub fn remove(&mut self, order_id: OrderId) -> Option<(Department, QueuedOrder)> {
        for (department, queue) in self.queues.iter_mut() {
            if let Some(pos) = queue.iter().position(|q| q.order_id == order_id) {
                return queue.remove(pos).map(|item| (*department, item));
            }
        }
        None
    }

    /// Current 1-based position of an order, and its department.
    pub fn position_of(&self, order_id: OrderId) -> Option<(Department, usize)> {
        self.queues.iter().find_map(|(department, queue)| {
            queue
                .iter()
                .position(|q| q.order_id == order_id)
                .map(|pos| (*department, pos + 1))
        })
    }

    /// Waiting orders in a department, head first.
    pub fn list(&self, department: Department) -> Vec<&QueuedOrder> {
        self.queues
            .get(&department)
            .map(|q| q.iter().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, department: Department) -> usize {
        self.queues.get(&department).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self, department: Department) -> bool {
        self.len(department) == 0
    }

    pub fn total(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }
}
