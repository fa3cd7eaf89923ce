//! Transition controller. The public API for moving orders through the factory.
//!
//! The engine owns the ledger, the worker directory, the department queues
//! and the event stream. It is the only component that drives both the ledger
//! and the resolver; every order and entry transition goes through here.

mod board;
mod shared;

pub use board::{BoardCard, DepartmentColumn};
pub use shared::SharedEngine;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Utc;
use opentelemetry::KeyValue;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::department::Department;
use crate::directory::WorkerDirectory;
use crate::error::{Error, Result};
use crate::event::{Event, EventKind, EventLog};
use crate::ledger::Ledger;
use crate::model::*;
use crate::queue::{DepartmentQueues, QueuedOrder};
use crate::resolver::{Resolution, Resolver};
use crate::telemetry::metrics;
use crate::telemetry::routing::{record_department, record_entry_transition, start_routing_span};

/// Tunables for the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    /// Hard cap on open entries per worker. None means least-loaded only.
    pub max_active_per_worker: Option<usize>,
}

/// Where an order landed after entering a department.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryOutcome {
    pub order: OrderId,
    pub number: OrderNumber,
    pub entry: EntryId,
    pub department: Department,
    pub resolution: Resolution,
}

/// Result of advancing an order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Advance {
    /// Opened the next department.
    Next(EntryOutcome),
    /// The department path is finished. No entry was opened.
    Completed { order: OrderId, number: OrderNumber },
}

impl Advance {
    pub fn is_completed(&self) -> bool {
        matches!(self, Advance::Completed { .. })
    }

    pub fn next_department(&self) -> Option<Department> {
        match self {
            Advance::Next(outcome) => Some(outcome.department),
            Advance::Completed { .. } => None,
        }
    }
}

/// Per-order result of a batch send. Items never affect each other.
#[derive(Debug)]
pub struct BatchItem {
    pub order: OrderId,
    pub result: Result<EntryOutcome>,
}

/// Everything the engine holds, in a form storage can read and rebuild.
#[derive(Debug, Default, Clone)]
pub struct Snapshot {
    pub orders: Vec<Order>,
    pub entries: Vec<TrackingEntry>,
    pub workers: Vec<Worker>,
    /// Queue rows per department, head first.
    pub queues: Vec<(Department, QueuedOrder)>,
    pub events: Vec<Event>,
    /// Last order number issued per year.
    pub counters: Vec<(i32, u32)>,
    /// Version of each department's assignment state.
    pub department_versions: Vec<(Department, u64)>,
}

/// The routing engine. Owns all state and enforces all invariants.
pub struct Engine {
    orders: BTreeMap<OrderId, Order>,
    ledger: Ledger,
    directory: WorkerDirectory,
    queues: DepartmentQueues,
    resolver: Resolver,
    events: EventLog,
    counters: BTreeMap<i32, u32>,
    /// Order versions as last loaded from or saved to storage.
    persisted: HashMap<OrderId, u64>,
    /// Highest event seq storage has seen.
    persisted_seq: u64,
    /// Bumped whenever a department's load, queue or roster changes.
    department_versions: BTreeMap<Department, u64>,
    persisted_departments: BTreeMap<Department, u64>,
    /// Roster records changed since the last load or save.
    dirty_workers: BTreeSet<WorkerId>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            orders: BTreeMap::new(),
            ledger: Ledger::new(),
            directory: WorkerDirectory::new(),
            queues: DepartmentQueues::new(),
            resolver: Resolver::new(config.max_active_per_worker),
            events: EventLog::new(),
            counters: BTreeMap::new(),
            persisted: HashMap::new(),
            persisted_seq: 0,
            department_versions: BTreeMap::new(),
            persisted_departments: BTreeMap::new(),
            dirty_workers: BTreeSet::new(),
        }
    }

    /// Rebuild an engine from persisted state.
    pub fn restore(config: EngineConfig, snapshot: Snapshot) -> Result<Self> {
        let mut engine = Self::new(config);
        engine.ledger = Ledger::from_entries(snapshot.entries)?;
        engine.directory = WorkerDirectory::from_workers(snapshot.workers);
        for (department, item) in snapshot.queues {
            engine.queues.enqueue(department, item);
        }
        engine.events = EventLog::from_events(snapshot.events);
        engine.persisted_seq = engine.events.last_seq();
        engine.counters = snapshot.counters.into_iter().collect();
        engine.department_versions = snapshot.department_versions.into_iter().collect();
        engine.persisted_departments = engine.department_versions.clone();
        for order in snapshot.orders {
            engine.persisted.insert(order.id, order.version);
            engine.orders.insert(order.id, order);
        }
        Ok(engine)
    }

    pub fn snapshot(&self) -> Snapshot {
        let queues = Department::all()
            .into_iter()
            .flat_map(|d| self.queues.list(d).into_iter().map(move |q| (d, q.clone())))
            .collect();
        Snapshot {
            orders: self.orders.values().cloned().collect(),
            entries: self.ledger.entries().to_vec(),
            workers: self.directory.all().cloned().collect(),
            queues,
            events: self.events.since(0),
            counters: self.counters(),
            department_versions: self
                .department_versions
                .iter()
                .map(|(d, v)| (*d, *v))
                .collect(),
        }
    }

    /// Version of an order as storage last saw it.
    pub fn persisted_version(&self, id: OrderId) -> Option<u64> {
        self.persisted.get(&id).copied()
    }

    /// Record that current order versions are now in storage.
    pub fn mark_persisted(&mut self) {
        self.persisted = self.orders.values().map(|o| (o.id, o.version)).collect();
        self.persisted_seq = self.events.last_seq();
        self.persisted_departments = self.department_versions.clone();
        self.dirty_workers.clear();
    }

    /// Current version of a department's assignment state.
    pub fn department_version(&self, department: Department) -> u64 {
        self.department_versions.get(&department).copied().unwrap_or(0)
    }

    /// Departments changed since the last load or save, with the version
    /// storage last saw and the current one.
    pub fn dirty_departments(&self) -> Vec<(Department, u64, u64)> {
        Department::all()
            .into_iter()
            .filter_map(|d| {
                let current = self.department_version(d);
                let persisted = self.persisted_departments.get(&d).copied().unwrap_or(0);
                (current != persisted).then_some((d, persisted, current))
            })
            .collect()
    }

    /// Roster records changed since the last load or save.
    pub fn dirty_workers(&self) -> Vec<&Worker> {
        self.dirty_workers
            .iter()
            .filter_map(|id| self.directory.get(id).ok())
            .collect()
    }

    /// Orders changed since the last load or save.
    pub fn dirty_orders(&self) -> Vec<&Order> {
        self.orders
            .values()
            .filter(|o| self.persisted.get(&o.id) != Some(&o.version))
            .collect()
    }

    /// Last order number issued per year.
    pub fn counters(&self) -> Vec<(i32, u32)> {
        self.counters.iter().map(|(y, n)| (*y, *n)).collect()
    }

    /// Events recorded since the last load or save.
    pub fn unpersisted_events(&self) -> Vec<Event> {
        self.events.since(self.persisted_seq)
    }

    // -----------------------------------------------------------------------
    // Orders
    // -----------------------------------------------------------------------

    /// Create a DRAFT order with the next number for the current year.
    pub fn create_order(&mut self, new: NewOrder, actor: &str) -> Order {
        let now = Utc::now();
        let year = number_year(now);
        let seq = self.counters.entry(year).or_insert(0);
        *seq += 1;
        let order = new.build(OrderNumber::new(year, *seq), now);

        info!(order = %order.id, number = %order.number, priority = %order.priority, "order created");
        self.events.record(
            actor,
            EventKind::OrderCreated {
                order: order.id,
                number: order.number.clone(),
            },
        );
        self.orders.insert(order.id, order.clone());
        order
    }

    pub fn get_order(&self, id: OrderId) -> Result<&Order> {
        self.orders
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("order {id}")))
    }

    pub fn order_by_number(&self, number: &str) -> Result<&Order> {
        self.orders
            .values()
            .find(|o| o.number.as_str() == number)
            .ok_or_else(|| Error::NotFound(format!("order {number}")))
    }

    /// Orders, optionally filtered by status, in number order.
    pub fn list_orders(&self, status: Option<OrderStatus>) -> Vec<&Order> {
        let mut orders: Vec<&Order> = self
            .orders
            .values()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .collect();
        orders.sort_by(|a, b| a.number.cmp(&b.number));
        orders
    }

    /// DRAFT -> PENDING: the office marks the order ready for the floor.
    pub fn mark_pending(&mut self, id: OrderId, actor: &str) -> Result<&Order> {
        self.set_status(id, OrderStatus::Pending, actor)
    }

    /// Cancel an order that has not entered the factory.
    pub fn cancel(&mut self, id: OrderId, actor: &str) -> Result<&Order> {
        if let Some(entry) = self.ledger.open_entry(id) {
            return Err(Error::InvalidTransition {
                order: id,
                reason: format!("cannot cancel while at {}", entry.department),
            });
        }
        self.set_status(id, OrderStatus::Cancelled, actor)
    }

    pub fn mark_quality_check(&mut self, id: OrderId, actor: &str) -> Result<&Order> {
        self.set_status(id, OrderStatus::QualityCheck, actor)
    }

    pub fn deliver(&mut self, id: OrderId, actor: &str) -> Result<&Order> {
        self.set_status(id, OrderStatus::Delivered, actor)
    }

    fn set_status(&mut self, id: OrderId, to: OrderStatus, actor: &str) -> Result<&Order> {
        let now = Utc::now();
        let order = self
            .orders
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("order {id}")))?;
        let from = order.status;
        if !from.can_transition_to(to) {
            return Err(Error::InvalidOrderStatus { from, to });
        }
        order.status = to;
        if to == OrderStatus::Completed {
            order.completed_at = Some(now);
        }
        order.touch(now);

        debug!(order = %id, %from, %to, "order status changed");
        self.events
            .record(actor, EventKind::OrderStatusChanged { order: id, from, to });
        self.get_order(id)
    }

    // -----------------------------------------------------------------------
    // Factory path
    // -----------------------------------------------------------------------

    /// Send an order to its first department and assign or queue it.
    pub fn enter_factory(&mut self, id: OrderId, actor: &str) -> Result<EntryOutcome> {
        let span = start_routing_span("enter_factory", &id);
        let _enter = span.enter();

        let order = self.get_order(id)?;
        if let Some(entry) = self.ledger.open_entry(id) {
            return Err(Error::AlreadyInFactory {
                order: id,
                department: entry.department,
            });
        }
        if order.status == OrderStatus::InProgress {
            return Err(Error::AlreadyInFactory {
                order: id,
                department: order.current_department.unwrap_or_else(Department::first),
            });
        }
        if !order.status.can_enter_factory() {
            return Err(Error::InvalidTransition {
                order: id,
                reason: format!("order is {}, only DRAFT or PENDING orders enter", order.status),
            });
        }

        self.set_status(id, OrderStatus::InProgress, actor)?;
        self.events.record(actor, EventKind::EnteredFactory { order: id });

        let outcome = self.open_and_resolve(id, Department::first(), actor)?;
        record_department(&span, outcome.department);
        Ok(outcome)
    }

    /// Send several orders. Each order's result is independent of the others.
    pub fn send_batch_to_factory(&mut self, ids: &[OrderId], actor: &str) -> Vec<BatchItem> {
        ids.iter()
            .map(|&id| {
                let result = self.enter_factory(id, actor);
                let label = match &result {
                    Ok(outcome) if outcome.resolution.is_assigned() => "assigned",
                    Ok(_) => "queued",
                    Err(e) => {
                        warn!(order = %id, error = %e, "order not sent to factory");
                        "error"
                    }
                };
                metrics::orders_entered().add(1, &[KeyValue::new("result", label)]);
                BatchItem { order: id, result }
            })
            .collect()
    }

    /// Worker picks up the assigned entry: ASSIGNED -> IN_PROGRESS.
    pub fn start_work(&mut self, id: OrderId, actor: &str) -> Result<&TrackingEntry> {
        let entry = self.ledger.open_entry(id).ok_or(Error::NoOpenEntry(id))?;
        let (entry_id, worker) = (entry.id, entry.worker.clone());
        self.ledger.mark_in_progress(entry_id)?;
        self.touch_order(id);

        let worker = worker.ok_or(Error::UnassignedEntry(entry_id))?;
        self.events.record(
            actor,
            EventKind::WorkStarted {
                order: id,
                entry: entry_id,
                worker,
            },
        );
        self.ledger.get(entry_id)
    }

    /// Close the current entry as COMPLETED. The order stays at its
    /// department until [`advance`](Self::advance).
    pub fn complete_work(&mut self, id: OrderId, actor: &str) -> Result<TrackingEntry> {
        let span = start_routing_span("complete_work", &id);
        let _enter = span.enter();

        let entry = self.ledger.open_entry(id).ok_or(Error::NoOpenEntry(id))?;
        let (entry_id, department, from) = (entry.id, entry.department, entry.status);
        record_department(&span, department);

        let now = Utc::now();
        self.ledger.mark_complete(entry_id, now)?;
        self.touch_order(id);
        self.bump_department(department);
        record_entry_transition(&span, &from.to_string(), "COMPLETED");

        let entry = self.ledger.get(entry_id)?.clone();
        let dwell = entry.time_in_department(now);
        metrics::department_dwell_ms().record(
            dwell.num_milliseconds() as f64,
            &[KeyValue::new("department", department.as_str())],
        );
        self.events.record(
            actor,
            EventKind::DepartmentCompleted {
                order: id,
                entry: entry_id,
                department,
                worker: entry.worker.clone().ok_or(Error::UnassignedEntry(entry_id))?,
                duration_ms: dwell.num_milliseconds(),
            },
        );

        // A freed worker matters only when workers can be full.
        if self.resolver.max_active_per_worker.is_some() {
            self.dispatch_queue(department, actor)?;
        }
        Ok(entry)
    }

    /// Move an order whose current entry is closed to its next department,
    /// or finish it after the last one.
    pub fn advance(&mut self, id: OrderId, actor: &str) -> Result<Advance> {
        let span = start_routing_span("advance", &id);
        let _enter = span.enter();

        let order = self.get_order(id)?;
        let department = order.current_department.ok_or(Error::NoOpenEntry(id))?;
        let number = order.number.clone();
        let current = self
            .ledger
            .latest(id)
            .filter(|e| e.department == department)
            .ok_or(Error::NoOpenEntry(id))?;

        if !current.status.is_terminal() {
            return Err(Error::InvalidState {
                entry: current.id,
                from: current.status,
                to: EntryStatus::Completed,
            });
        }

        match department.next() {
            None => {
                let now = Utc::now();
                if let Some(order) = self.orders.get_mut(&id) {
                    order.current_department = None;
                    order.touch(now);
                }
                self.set_status(id, OrderStatus::Completed, actor)?;
                self.events.record(actor, EventKind::OrderCompleted { order: id });

                info!(order = %id, %number, "order finished the department path");
                metrics::advances().add(
                    1,
                    &[
                        KeyValue::new("from", department.as_str()),
                        KeyValue::new("to", "completed"),
                    ],
                );
                metrics::orders_completed().add(1, &[]);
                Ok(Advance::Completed { order: id, number })
            }
            Some(next) => {
                record_department(&span, next);
                let outcome = self.open_and_resolve(id, next, actor)?;
                metrics::advances().add(
                    1,
                    &[
                        KeyValue::new("from", department.as_str()),
                        KeyValue::new("to", next.as_str()),
                    ],
                );
                Ok(Advance::Next(outcome))
            }
        }
    }

    /// Complete the current entry and advance, as one unit.
    pub fn finish_department(&mut self, id: OrderId, actor: &str) -> Result<Advance> {
        self.complete_work(id, actor)?;
        self.advance(id, actor)
    }

    /// Administrative override: mark the current entry SKIPPED and advance.
    ///
    /// Only entries that are waiting or assigned (not started) can be skipped.
    pub fn skip_department(&mut self, id: OrderId, actor: &str) -> Result<Advance> {
        let entry = self.ledger.open_entry(id).ok_or(Error::NoOpenEntry(id))?;
        let (entry_id, department) = (entry.id, entry.department);

        self.ledger.skip(entry_id, Utc::now())?;
        self.queues.remove(id);
        self.touch_order(id);
        self.bump_department(department);

        warn!(order = %id, %department, %actor, "department skipped by override");
        self.events.record(
            actor,
            EventKind::DepartmentSkipped {
                order: id,
                entry: entry_id,
                department,
            },
        );
        self.advance(id, actor)
    }

    /// Attach opaque work data (photos, files) to the current entry.
    pub fn attach_work_data(&mut self, id: OrderId, data: serde_json::Value) -> Result<()> {
        let entry_id = self.ledger.open_entry(id).ok_or(Error::NoOpenEntry(id))?.id;
        self.ledger.attach_work_data(entry_id, data)?;
        self.touch_order(id);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Assignment
    // -----------------------------------------------------------------------

    /// Assign a specific worker to a waiting order, taking it out of its queue.
    pub fn assign_manually(
        &mut self,
        id: OrderId,
        worker_id: &WorkerId,
        actor: &str,
    ) -> Result<EntryOutcome> {
        let entry = self.ledger.open_entry(id).ok_or(Error::NoOpenEntry(id))?;
        let (entry_id, department) = (entry.id, entry.department);

        let worker = self.directory.get(worker_id)?;
        if worker.department != department {
            return Err(Error::InvalidTransition {
                order: id,
                reason: format!("worker {worker_id} works in {}, not {department}", worker.department),
            });
        }
        if !worker.active {
            return Err(Error::InvalidTransition {
                order: id,
                reason: format!("worker {worker_id} is inactive"),
            });
        }

        self.ledger.assign(entry_id, worker_id.clone())?;
        self.queues.remove(id);
        self.touch_order(id);
        self.bump_department(department);

        info!(order = %id, %department, worker = %worker_id, "worker assigned manually");
        metrics::assignments().add(
            1,
            &[
                KeyValue::new("department", department.as_str()),
                KeyValue::new("mode", "manual"),
            ],
        );
        self.events.record(
            actor,
            EventKind::WorkerAssigned {
                order: id,
                entry: entry_id,
                department,
                worker: worker_id.clone(),
                manual: true,
            },
        );
        self.outcome(
            id,
            entry_id,
            department,
            Resolution::Assigned {
                worker: worker_id.clone(),
            },
        )
    }

    /// Assign waiting orders, head first, while the department has a worker.
    pub fn dispatch_queue(&mut self, department: Department, actor: &str) -> Result<Vec<EntryOutcome>> {
        let mut dispatched = Vec::new();

        while let Some(head) = self.queues.peek(department).cloned() {
            let still_waiting = self
                .ledger
                .open_entry(head.order_id)
                .is_some_and(|e| e.id == head.entry_id && e.status == EntryStatus::PendingAssignment);
            if !still_waiting {
                // Stale row: the entry was assigned or closed some other way.
                self.queues.remove(head.order_id);
                self.bump_department(department);
                continue;
            }

            let resolution = self.resolver.resolve(
                head.order_id,
                department,
                &self.directory,
                &mut self.ledger,
                &mut self.queues,
                Utc::now(),
            )?;
            let Resolution::Assigned { worker } = resolution else {
                break;
            };

            self.touch_order(head.order_id);
            self.bump_department(department);
            info!(order = %head.order_id, %department, %worker, "queued order dispatched");
            metrics::assignments().add(
                1,
                &[
                    KeyValue::new("department", department.as_str()),
                    KeyValue::new("mode", "dispatch"),
                ],
            );
            self.events.record(
                actor,
                EventKind::WorkerAssigned {
                    order: head.order_id,
                    entry: head.entry_id,
                    department,
                    worker: worker.clone(),
                    manual: false,
                },
            );
            dispatched.push(self.outcome(
                head.order_id,
                head.entry_id,
                department,
                Resolution::Assigned { worker },
            )?);
        }

        Ok(dispatched)
    }

    // -----------------------------------------------------------------------
    // Workers
    // -----------------------------------------------------------------------

    /// Add or update a roster record, then hand the worker any waiting orders.
    pub fn add_worker(&mut self, worker: Worker, actor: &str) -> Result<Vec<EntryOutcome>> {
        let (id, department, active) = (worker.id.clone(), worker.department, worker.active);
        if self.directory.get(&id).ok() == Some(&worker) {
            return Ok(Vec::new());
        }
        self.directory.upsert(worker)?;
        self.dirty_workers.insert(id.clone());
        self.bump_department(department);

        info!(worker = %id, %department, active, "worker rostered");
        self.events.record(
            actor,
            EventKind::WorkerRostered {
                worker: id,
                department,
                active,
            },
        );
        self.dispatch_queue(department, actor)
    }

    pub fn set_worker_active(
        &mut self,
        id: &WorkerId,
        active: bool,
        actor: &str,
    ) -> Result<Vec<EntryOutcome>> {
        let worker = self.directory.get(id)?;
        if worker.active == active {
            return Ok(Vec::new());
        }
        let department = self.directory.set_active(id, active)?.department;
        self.dirty_workers.insert(id.clone());
        self.bump_department(department);
        self.events.record(
            actor,
            EventKind::WorkerRostered {
                worker: id.clone(),
                department,
                active,
            },
        );
        if active {
            self.dispatch_queue(department, actor)
        } else {
            Ok(Vec::new())
        }
    }

    pub fn workers_in(&self, department: Department) -> Vec<WorkerLoad> {
        self.directory.workers_in(department, &self.ledger)
    }

    pub fn least_loaded_worker(&self, department: Department) -> Option<WorkerLoad> {
        self.directory.least_loaded_worker(department, &self.ledger)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Department visits of an order, oldest first.
    pub fn history(&self, id: OrderId) -> Vec<&TrackingEntry> {
        self.ledger.history(id)
    }

    pub fn events_since(&self, since_seq: u64) -> Vec<Event> {
        self.events.since(since_seq)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn directory(&self) -> &WorkerDirectory {
        &self.directory
    }

    pub fn queues(&self) -> &DepartmentQueues {
        &self.queues
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Open an entry at `department`, point the order at it, then resolve.
    fn open_and_resolve(
        &mut self,
        id: OrderId,
        department: Department,
        actor: &str,
    ) -> Result<EntryOutcome> {
        let now = Utc::now();
        let entry = self
            .ledger
            .open(id, department, department.sequence(), actor, now)?;

        if let Some(order) = self.orders.get_mut(&id) {
            order.current_department = Some(department);
            order.touch(now);
        }
        self.bump_department(department);
        self.events.record(
            actor,
            EventKind::DepartmentEntered {
                order: id,
                entry: entry.id,
                department,
                sequence: entry.sequence,
            },
        );

        let resolution = self.resolver.resolve(
            id,
            department,
            &self.directory,
            &mut self.ledger,
            &mut self.queues,
            now,
        )?;

        match &resolution {
            Resolution::Assigned { worker } => {
                info!(order = %id, %department, %worker, "worker assigned");
                metrics::assignments().add(
                    1,
                    &[
                        KeyValue::new("department", department.as_str()),
                        KeyValue::new("mode", "auto"),
                    ],
                );
                self.events.record(
                    actor,
                    EventKind::WorkerAssigned {
                        order: id,
                        entry: entry.id,
                        department,
                        worker: worker.clone(),
                        manual: false,
                    },
                );
            }
            Resolution::Queued { position } => {
                info!(order = %id, %department, position, "no assignable worker, order queued");
                metrics::queued().add(1, &[KeyValue::new("department", department.as_str())]);
                self.events.record(
                    actor,
                    EventKind::OrderQueued {
                        order: id,
                        entry: entry.id,
                        department,
                        position: *position,
                    },
                );
            }
        }

        self.outcome(id, entry.id, department, resolution)
    }

    fn outcome(
        &self,
        id: OrderId,
        entry: EntryId,
        department: Department,
        resolution: Resolution,
    ) -> Result<EntryOutcome> {
        Ok(EntryOutcome {
            order: id,
            number: self.get_order(id)?.number.clone(),
            entry,
            department,
            resolution,
        })
    }

    fn bump_department(&mut self, department: Department) {
        *self.department_versions.entry(department).or_insert(0) += 1;
    }

    fn touch_order(&mut self, id: OrderId) {
        if let Some(order) = self.orders.get_mut(&id) {
            order.touch(Utc::now());
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
