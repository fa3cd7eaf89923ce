//! Worker directory: who works where, and how loaded they are.
//!
//! The roster is stored here; load is not. Load is read from the ledger on
//! every query so there is a single source of truth for assignments.

use std::collections::BTreeMap;

use crate::department::Department;
use crate::error::{Error, Result};
use crate::ledger::Ledger;
use crate::model::{Worker, WorkerId, WorkerLoad};

#[derive(Debug, Default, Clone)]
pub struct WorkerDirectory {
    /// Keyed by id so iteration is already in tie-break order.
    workers: BTreeMap<WorkerId, Worker>,
}

impl WorkerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_workers(workers: impl IntoIterator<Item = Worker>) -> Self {
        Self {
            workers: workers.into_iter().map(|w| (w.id.clone(), w)).collect(),
        }
    }

    /// Add a worker, or replace the roster record with the same id.
    ///
    /// A worker's home department is fixed once rostered.
    pub fn upsert(&mut self, worker: Worker) -> Result<()> {
        if let Some(existing) = self.workers.get(&worker.id) {
            if existing.department != worker.department {
                return Err(Error::Config(format!(
                    "worker {} belongs to {}, cannot move to {}",
                    worker.id, existing.department, worker.department
                )));
            }
        }
        self.workers.insert(worker.id.clone(), worker);
        Ok(())
    }

    pub fn set_active(&mut self, id: &WorkerId, active: bool) -> Result<&Worker> {
        let worker = self
            .workers
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("worker {id}")))?;
        worker.active = active;
        Ok(worker)
    }

    pub fn get(&self, id: &WorkerId) -> Result<&Worker> {
        self.workers
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("worker {id}")))
    }

    /// Every rostered worker in a department, active or not, with load.
    pub fn workers_in(&self, department: Department, ledger: &Ledger) -> Vec<WorkerLoad> {
        let loads = ledger.loads();
        self.workers
            .values()
            .filter(|w| w.department == department)
            .map(|w| WorkerLoad {
                worker: w.clone(),
                active_assignments: loads.get(&w.id).copied().unwrap_or(0),
            })
            .collect()
    }

    /// The active worker holding the fewest open entries.
    ///
    /// Ties go to the lowest worker id. None if the department has no
    /// active workers.
    pub fn least_loaded_worker(&self, department: Department, ledger: &Ledger) -> Option<WorkerLoad> {
        self.least_loaded_below(department, ledger, None)
    }

    /// Like [`least_loaded_worker`](Self::least_loaded_worker), but workers
    /// already holding `cap` entries are treated as unavailable.
    pub fn least_loaded_below(
        &self,
        department: Department,
        ledger: &Ledger,
        cap: Option<usize>,
    ) -> Option<WorkerLoad> {
        self.workers_in(department, ledger)
            .into_iter()
            .filter(|l| l.worker.active)
            .filter(|l| cap.is_none_or(|cap| l.active_assignments < cap))
            // min_by_key keeps the first minimum, and iteration is by id.
            .min_by_key(|l| l.active_assignments)
    }

    pub fn all(&self) -> impl Iterator<Item = &Worker> {
        self.workers.values()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OrderId;
    use chrono::Utc;

    fn give(ledger: &mut Ledger, worker: &str, count: usize) {
        for _ in 0..count {
            let entry = ledger
                .open(OrderId::new(), Department::Cad, 1, "test", Utc::now())
                .unwrap();
            ledger.assign(entry.id, WorkerId::from(worker)).unwrap();
        }
    }

    #[test]
    fn picks_strict_minimum() {
        let directory = WorkerDirectory::from_workers([
            Worker::new("b", "Bea", Department::Cad),
            Worker::new("a", "Ash", Department::Cad),
            Worker::new("c", "Cy", Department::Cad),
        ]);
        let mut ledger = Ledger::new();
        give(&mut ledger, "a", 2);
        give(&mut ledger, "b", 1);
        give(&mut ledger, "c", 3);

        let picked = directory.least_loaded_worker(Department::Cad, &ledger).unwrap();
        assert_eq!(picked.worker.id, WorkerId::from("b"));
        assert_eq!(picked.active_assignments, 1);
    }

    #[test]
    fn ties_break_on_lowest_id_and_repeat() {
        let directory = WorkerDirectory::from_workers([
            Worker::new("zed", "Zed", Department::Cad),
            Worker::new("amy", "Amy", Department::Cad),
        ]);
        let ledger = Ledger::new();

        for _ in 0..5 {
            let picked = directory.least_loaded_worker(Department::Cad, &ledger).unwrap();
            assert_eq!(picked.worker.id, WorkerId::from("amy"));
        }
    }

    #[test]
    fn inactive_and_other_department_workers_are_ignored() {
        let mut directory = WorkerDirectory::from_workers([
            Worker::new("a", "Ash", Department::Cad),
            Worker::new("p", "Pia", Department::Print),
        ]);
        directory.set_active(&WorkerId::from("a"), false).unwrap();

        assert!(directory.least_loaded_worker(Department::Cad, &Ledger::new()).is_none());
        assert_eq!(directory.workers_in(Department::Cad, &Ledger::new()).len(), 1);
    }

    #[test]
    fn cap_makes_full_workers_unavailable() {
        let directory = WorkerDirectory::from_workers([Worker::new("a", "Ash", Department::Cad)]);
        let mut ledger = Ledger::new();
        give(&mut ledger, "a", 2);

        assert!(directory.least_loaded_below(Department::Cad, &ledger, Some(2)).is_none());
        assert!(directory.least_loaded_below(Department::Cad, &ledger, Some(3)).is_some());
    }

    #[test]
    fn home_department_is_fixed() {
        let mut directory = WorkerDirectory::new();
        directory.upsert(Worker::new("a", "Ash", Department::Cad)).unwrap();
        assert!(directory.upsert(Worker::new("a", "Ash", Department::Print)).is_err());
        directory.upsert(Worker::new("a", "Ashley", Department::Cad)).unwrap();
        assert_eq!(directory.get(&WorkerId::from("a")).unwrap().name, "Ashley");
    }
}
