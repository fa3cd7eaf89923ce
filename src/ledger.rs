//! Department tracking ledger.
//!
//! Authoritative, append-only history of every order's department visits.
//! Entries are opened and closed, never removed. Worker load and the board
//! columns are both derived from here.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::department::Department;
use crate::error::{Error, Result};
use crate::model::{EntryId, EntryStatus, OrderId, TrackingEntry, WorkerId};

#[derive(Debug, Default, Clone)]
pub struct Ledger {
    entries: Vec<TrackingEntry>,
    by_id: HashMap<EntryId, usize>,
    /// Index of each order's open entry. At most one per order.
    open_by_order: HashMap<OrderId, usize>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted entries, oldest first.
    pub fn from_entries(entries: Vec<TrackingEntry>) -> Result<Self> {
        let mut ledger = Self::new();
        for entry in entries {
            if entry.is_open() {
                if let Some(&existing) = ledger.open_by_order.get(&entry.order_id) {
                    return Err(Error::DuplicateOpenEntry {
                        order: entry.order_id,
                        department: ledger.entries[existing].department,
                    });
                }
                ledger.open_by_order.insert(entry.order_id, ledger.entries.len());
            }
            ledger.by_id.insert(entry.id, ledger.entries.len());
            ledger.entries.push(entry);
        }
        Ok(ledger)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Open a new entry in PENDING_ASSIGNMENT.
    pub fn open(
        &mut self,
        order_id: OrderId,
        department: Department,
        sequence: u8,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<TrackingEntry> {
        if let Some(&idx) = self.open_by_order.get(&order_id) {
            return Err(Error::DuplicateOpenEntry {
                order: order_id,
                department: self.entries[idx].department,
            });
        }

        let entry = TrackingEntry {
            id: EntryId::new(),
            order_id,
            department,
            sequence,
            status: EntryStatus::PendingAssignment,
            worker: None,
            entered_at: at,
            exited_at: None,
            work_data: serde_json::Value::Null,
            actor: actor.to_string(),
        };

        let idx = self.entries.len();
        self.by_id.insert(entry.id, idx);
        self.open_by_order.insert(order_id, idx);
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// PENDING_ASSIGNMENT -> ASSIGNED.
    pub fn assign(&mut self, id: EntryId, worker: WorkerId) -> Result<()> {
        let entry = self.entry_mut(id)?;
        if entry.status != EntryStatus::PendingAssignment {
            return Err(Error::InvalidState {
                entry: id,
                from: entry.status,
                to: EntryStatus::Assigned,
            });
        }
        entry.status = EntryStatus::Assigned;
        entry.worker = Some(worker);
        Ok(())
    }

    /// ASSIGNED -> IN_PROGRESS.
    pub fn mark_in_progress(&mut self, id: EntryId) -> Result<()> {
        let entry = self.entry_mut(id)?;
        transition(entry, EntryStatus::InProgress)
    }

    /// Close the entry as COMPLETED. Requires an assigned worker.
    pub fn mark_complete(&mut self, id: EntryId, exited_at: DateTime<Utc>) -> Result<()> {
        let entry = self.entry_mut(id)?;
        if entry.worker.is_none() {
            return Err(Error::UnassignedEntry(id));
        }
        transition(entry, EntryStatus::Completed)?;
        entry.exited_at = Some(exited_at.max(entry.entered_at));
        let order_id = entry.order_id;
        self.open_by_order.remove(&order_id);
        Ok(())
    }

    /// Administrative override: close the entry as SKIPPED.
    pub fn skip(&mut self, id: EntryId, exited_at: DateTime<Utc>) -> Result<()> {
        let entry = self.entry_mut(id)?;
        if !entry.status.can_skip() {
            return Err(Error::InvalidState {
                entry: id,
                from: entry.status,
                to: EntryStatus::Skipped,
            });
        }
        entry.status = EntryStatus::Skipped;
        entry.exited_at = Some(exited_at.max(entry.entered_at));
        let order_id = entry.order_id;
        self.open_by_order.remove(&order_id);
        Ok(())
    }

    /// Replace the opaque work data of an open entry.
    pub fn attach_work_data(&mut self, id: EntryId, data: serde_json::Value) -> Result<()> {
        let entry = self.entry_mut(id)?;
        if !entry.is_open() {
            return Err(Error::InvalidState {
                entry: id,
                from: entry.status,
                to: entry.status,
            });
        }
        entry.work_data = data;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get(&self, id: EntryId) -> Result<&TrackingEntry> {
        self.by_id
            .get(&id)
            .map(|&idx| &self.entries[idx])
            .ok_or_else(|| Error::NotFound(format!("tracking entry {id}")))
    }

    /// The order's open entry, if it has one.
    pub fn open_entry(&self, order_id: OrderId) -> Option<&TrackingEntry> {
        self.open_by_order
            .get(&order_id)
            .map(|&idx| &self.entries[idx])
    }

    /// The order's most recent entry, open or closed.
    pub fn latest(&self, order_id: OrderId) -> Option<&TrackingEntry> {
        self.entries.iter().rev().find(|e| e.order_id == order_id)
    }

    /// Every entry of an order, in the order they were opened.
    pub fn history(&self, order_id: OrderId) -> Vec<&TrackingEntry> {
        self.entries
            .iter()
            .filter(|e| e.order_id == order_id)
            .collect()
    }

    /// Open entries in a department, oldest first.
    pub fn open_in(&self, department: Department) -> Vec<&TrackingEntry> {
        let mut open: Vec<&TrackingEntry> = self
            .open_by_order
            .values()
            .map(|&idx| &self.entries[idx])
            .filter(|e| e.department == department)
            .collect();
        open.sort_by_key(|e| (e.entered_at, e.sequence));
        open
    }

    /// Number of entries a worker currently holds.
    pub fn active_count(&self, worker: &WorkerId) -> usize {
        self.open_by_order
            .values()
            .map(|&idx| &self.entries[idx])
            .filter(|e| e.holds_worker() && e.worker.as_ref() == Some(worker))
            .count()
    }

    /// Active-assignment counts for every worker holding at least one entry.
    pub fn loads(&self) -> HashMap<&WorkerId, usize> {
        let mut loads = HashMap::new();
        for entry in self.open_by_order.values().map(|&idx| &self.entries[idx]) {
            if let (true, Some(worker)) = (entry.holds_worker(), entry.worker.as_ref()) {
                *loads.entry(worker).or_insert(0) += 1;
            }
        }
        loads
    }

    pub fn time_in_department(&self, id: EntryId, now: DateTime<Utc>) -> Result<Duration> {
        Ok(self.get(id)?.time_in_department(now))
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[TrackingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry_mut(&mut self, id: EntryId) -> Result<&mut TrackingEntry> {
        let idx = *self
            .by_id
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("tracking entry {id}")))?;
        Ok(&mut self.entries[idx])
    }
}

fn transition(entry: &mut TrackingEntry, to: EntryStatus) -> Result<()> {
    if !entry.status.can_transition_to(to) {
        return Err(Error::InvalidState {
            entry: entry.id,
            from: entry.status,
            to,
        });
    }
    entry.status = to;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(id: &str) -> WorkerId {
        WorkerId(id.to_string())
    }

    fn opened(ledger: &mut Ledger, department: Department) -> TrackingEntry {
        ledger
            .open(
                OrderId::new(),
                department,
                department.sequence(),
                "office",
                Utc::now(),
            )
            .unwrap()
    }

    #[test]
    fn open_rejects_second_open_entry_for_same_order() {
        let mut ledger = Ledger::new();
        let entry = opened(&mut ledger, Department::Cad);

        let err = ledger
            .open(entry.order_id, Department::Print, 2, "office", Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DuplicateOpenEntry {
                department: Department::Cad,
                ..
            }
        ));
    }

    #[test]
    fn full_forward_path() {
        let mut ledger = Ledger::new();
        let entry = opened(&mut ledger, Department::Cad);

        ledger.assign(entry.id, worker("alice")).unwrap();
        ledger.mark_in_progress(entry.id).unwrap();
        ledger.mark_complete(entry.id, Utc::now()).unwrap();

        let done = ledger.get(entry.id).unwrap();
        assert_eq!(done.status, EntryStatus::Completed);
        assert!(done.exited_at.is_some());
        assert!(ledger.open_entry(entry.order_id).is_none());
        assert_eq!(ledger.latest(entry.order_id).unwrap().id, entry.id);
    }

    #[test]
    fn assign_requires_pending() {
        let mut ledger = Ledger::new();
        let entry = opened(&mut ledger, Department::Cad);
        ledger.assign(entry.id, worker("alice")).unwrap();

        let err = ledger.assign(entry.id, worker("bob")).unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                from: EntryStatus::Assigned,
                to: EntryStatus::Assigned,
                ..
            }
        ));
    }

    #[test]
    fn completing_unassigned_entry_fails() {
        let mut ledger = Ledger::new();
        let entry = opened(&mut ledger, Department::Setting);

        let err = ledger.mark_complete(entry.id, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::UnassignedEntry(id) if id == entry.id));
        assert!(ledger.get(entry.id).unwrap().is_open());
    }

    #[test]
    fn no_backward_moves() {
        let mut ledger = Ledger::new();
        let entry = opened(&mut ledger, Department::Cad);
        ledger.assign(entry.id, worker("alice")).unwrap();
        ledger.mark_complete(entry.id, Utc::now()).unwrap();

        assert!(ledger.mark_in_progress(entry.id).is_err());
        assert!(ledger.mark_complete(entry.id, Utc::now()).is_err());
        assert!(ledger.skip(entry.id, Utc::now()).is_err());
    }

    #[test]
    fn skip_only_from_pending_or_assigned() {
        let mut ledger = Ledger::new();
        let pending = opened(&mut ledger, Department::Meena);
        ledger.skip(pending.id, Utc::now()).unwrap();
        assert_eq!(
            ledger.get(pending.id).unwrap().status,
            EntryStatus::Skipped
        );

        let started = opened(&mut ledger, Department::Meena);
        ledger.assign(started.id, worker("alice")).unwrap();
        ledger.mark_in_progress(started.id).unwrap();
        assert!(matches!(
            ledger.skip(started.id, Utc::now()).unwrap_err(),
            Error::InvalidState {
                from: EntryStatus::InProgress,
                to: EntryStatus::Skipped,
                ..
            }
        ));
    }

    #[test]
    fn load_counts_only_open_active_entries() {
        let mut ledger = Ledger::new();
        let a = opened(&mut ledger, Department::Cad);
        let b = opened(&mut ledger, Department::Cad);
        let c = opened(&mut ledger, Department::Cad);
        ledger.assign(a.id, worker("alice")).unwrap();
        ledger.assign(b.id, worker("alice")).unwrap();
        ledger.assign(c.id, worker("bob")).unwrap();
        ledger.mark_complete(b.id, Utc::now()).unwrap();

        assert_eq!(ledger.active_count(&worker("alice")), 1);
        assert_eq!(ledger.active_count(&worker("bob")), 1);
        assert_eq!(ledger.active_count(&worker("carol")), 0);
        assert_eq!(ledger.loads().len(), 2);
    }

    #[test]
    fn time_in_department_freezes_at_exit() {
        let mut ledger = Ledger::new();
        let entered = Utc::now();
        let entry = ledger
            .open(OrderId::new(), Department::Cad, 1, "office", entered)
            .unwrap();

        let later = entered + Duration::minutes(30);
        assert_eq!(
            ledger.time_in_department(entry.id, later).unwrap(),
            Duration::minutes(30)
        );
        let much_later = entered + Duration::minutes(90);
        assert!(
            ledger.time_in_department(entry.id, much_later).unwrap()
                > ledger.time_in_department(entry.id, later).unwrap()
        );

        ledger.assign(entry.id, worker("alice")).unwrap();
        ledger
            .mark_complete(entry.id, entered + Duration::minutes(45))
            .unwrap();
        assert_eq!(
            ledger
                .time_in_department(entry.id, entered + Duration::days(3))
                .unwrap(),
            Duration::minutes(45)
        );
    }

    #[test]
    fn open_then_complete_is_near_zero() {
        let mut ledger = Ledger::new();
        let now = Utc::now();
        let entry = ledger
            .open(OrderId::new(), Department::Cad, 1, "office", now)
            .unwrap();
        ledger.assign(entry.id, worker("alice")).unwrap();
        ledger.mark_complete(entry.id, Utc::now()).unwrap();

        let spent = ledger.time_in_department(entry.id, Utc::now()).unwrap();
        assert!(spent >= Duration::zero());
        assert!(spent < Duration::seconds(1));
    }

    #[test]
    fn from_entries_rejects_two_open_entries() {
        let mut ledger = Ledger::new();
        let entry = opened(&mut ledger, Department::Cad);
        let mut twin = entry.clone();
        twin.id = EntryId::new();

        let err = Ledger::from_entries(vec![entry, twin]).unwrap_err();
        assert!(matches!(err, Error::DuplicateOpenEntry { .. }));
    }
}
