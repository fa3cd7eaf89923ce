//! SQLite persistence adapter.
//!
//! Loads an [`Engine`] from disk and writes its changes back. WAL mode for
//! concurrent readers. Orders and departments carry versions; a save only
//! applies when every stored version it touches still matches the one this
//! engine loaded, so two processes working from the same snapshot cannot both
//! win. A department's version covers its queue, its workers' load and its
//! roster, which makes each assign-or-queue decision atomic across processes.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, ToSql, params};
use tracing::debug;

use crate::department::Department;
use crate::engine::{Engine, EngineConfig, Snapshot};
use crate::error::{Error, Result};
use crate::event::{Event, EventKind};
use crate::model::*;
use crate::queue::QueuedOrder;

/// Storage backend. Owns the SQLite connection.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let mut storage = Self { conn };
        storage.init()?;
        Ok(storage)
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut storage = Self { conn };
        storage.init()?;
        Ok(storage)
    }

    fn init(&mut self) -> Result<()> {
        self.conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        self.conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        self.conn.busy_timeout(std::time::Duration::from_secs(5))?;

        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS orders (
                id                  TEXT PRIMARY KEY,
                number              TEXT NOT NULL UNIQUE,
                customer            TEXT,
                notes               TEXT,
                priority            TEXT NOT NULL,
                due_date            TEXT,
                current_department  TEXT,
                status              TEXT NOT NULL,
                version             INTEGER NOT NULL,
                created_at          TEXT NOT NULL,
                updated_at          TEXT NOT NULL,
                completed_at        TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);

            CREATE TABLE IF NOT EXISTS workers (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                department  TEXT NOT NULL,
                active      INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS tracking_entries (
                id          TEXT PRIMARY KEY,
                order_id    TEXT NOT NULL REFERENCES orders(id),
                department  TEXT NOT NULL,
                sequence    INTEGER NOT NULL,
                status      TEXT NOT NULL,
                worker_id   TEXT,
                entered_at  TEXT NOT NULL,
                exited_at   TEXT,
                work_data   TEXT NOT NULL DEFAULT 'null',
                actor       TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_entries_order ON tracking_entries(order_id);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_one_open
                ON tracking_entries(order_id) WHERE exited_at IS NULL;

            CREATE TABLE IF NOT EXISTS queue_entries (
                order_id     TEXT PRIMARY KEY REFERENCES orders(id),
                department   TEXT NOT NULL,
                entry_id     TEXT NOT NULL REFERENCES tracking_entries(id),
                enqueued_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS events (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp   TEXT NOT NULL,
                actor       TEXT NOT NULL,
                kind        TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS order_counters (
                year        INTEGER PRIMARY KEY,
                last_seq    INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS department_versions (
                department  TEXT PRIMARY KEY,
                version     INTEGER NOT NULL
            );
            ",
        )?;

        for department in Department::all() {
            self.conn.execute(
                "INSERT OR IGNORE INTO department_versions (department, version) VALUES (?1, 0)",
                params![department.as_str()],
            )?;
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    /// Execute a closure within a SQLite transaction.
    ///
    /// The transaction commits if the closure returns Ok, rolls back on Err.
    fn with_transaction<F, T>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let tx = self.conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    // -----------------------------------------------------------------------
    // Load / save
    // -----------------------------------------------------------------------

    /// Rebuild an engine from everything stored.
    pub fn load(&self, config: EngineConfig) -> Result<Engine> {
        let snapshot = Snapshot {
            orders: self.query_all("SELECT * FROM orders", row_to_order)?,
            entries: self.query_all(
                "SELECT * FROM tracking_entries ORDER BY rowid ASC",
                row_to_entry,
            )?,
            workers: self.query_all("SELECT * FROM workers ORDER BY id ASC", row_to_worker)?,
            queues: self.query_all(
                "SELECT department, order_id, entry_id, enqueued_at FROM queue_entries
                 ORDER BY enqueued_at ASC, rowid ASC",
                row_to_queued,
            )?,
            events: self.get_events_since(0)?,
            counters: self.query_all("SELECT year, last_seq FROM order_counters", |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?,
            department_versions: self.query_all(
                "SELECT department, version FROM department_versions",
                |row| Ok((parse_col(row, 0)?, row.get::<_, i64>(1)? as u64)),
            )?,
        };

        debug!(
            orders = snapshot.orders.len(),
            entries = snapshot.entries.len(),
            workers = snapshot.workers.len(),
            "engine loaded from storage"
        );
        Engine::restore(config, snapshot)
    }

    /// Write every change made since the engine was loaded or last saved.
    ///
    /// Fails (and writes nothing) with `ConcurrentModification` if a changed
    /// order, or `ConcurrentDepartmentModification` if a changed department
    /// was saved by someone else in the meantime.
    pub fn save(&mut self, engine: &mut Engine) -> Result<()> {
        let dirty: Vec<Order> = engine.dirty_orders().into_iter().cloned().collect();
        let departments = engine.dirty_departments();
        let events = engine.unpersisted_events();
        let workers: Vec<Worker> = engine.dirty_workers().into_iter().cloned().collect();
        let counters = engine.counters();

        {
            let engine = &*engine;
            self.with_transaction(|tx| {
                for order in &dirty {
                    save_order_on(tx, order, engine.persisted_version(order.id))?;
                }

                for &(department, expected, current) in &departments {
                    save_department_version_on(tx, department, expected, current)?;
                }

                for worker in &workers {
                    upsert_worker_on(tx, worker)?;
                }

                for order in &dirty {
                    for entry in engine.ledger().history(order.id) {
                        upsert_entry_on(tx, entry)?;
                    }
                    tx.execute(
                        "DELETE FROM queue_entries WHERE order_id = ?1",
                        params![order.id.0.to_string()],
                    )?;
                }
                for department in Department::all() {
                    for queued in engine.queues().list(department) {
                        if dirty.iter().any(|o| o.id == queued.order_id) {
                            insert_queued_on(tx, department, queued)?;
                        }
                    }
                }

                for event in &events {
                    insert_event_on(tx, event)?;
                }

                for (year, last_seq) in &counters {
                    tx.execute(
                        "INSERT INTO order_counters (year, last_seq) VALUES (?1, ?2)
                         ON CONFLICT(year) DO UPDATE SET last_seq = MAX(last_seq, excluded.last_seq)",
                        params![year, last_seq],
                    )?;
                }
                Ok(())
            })?;
        }

        debug!(
            orders = dirty.len(),
            departments = departments.len(),
            workers = workers.len(),
            events = events.len(),
            "engine saved"
        );
        engine.mark_persisted();
        Ok(())
    }

    /// Stored version of an order, if it exists.
    pub fn order_version(&self, id: OrderId) -> Result<Option<u64>> {
        let version: Option<i64> = self
            .conn
            .query_row(
                "SELECT version FROM orders WHERE id = ?1",
                params![id.0.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version.map(|v| v as u64))
    }

    /// Get events since a sequence number.
    pub fn get_events_since(&self, since_seq: u64) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, timestamp, actor, kind FROM events WHERE seq > ?1 ORDER BY seq ASC",
        )?;

        let events = stmt
            .query_map(params![since_seq as i64], |row| {
                let kind_str: String = row.get(3)?;
                Ok(Event {
                    seq: row.get::<_, i64>(0)? as u64,
                    timestamp: parse_col(row, 1)?,
                    actor: row.get(2)?,
                    kind: serde_json::from_str(&kind_str)
                        .unwrap_or(EventKind::Unknown { raw: kind_str }),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }

    fn query_all<T>(
        &self,
        sql: &str,
        f: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], f)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Inner functions. They take &Connection so they run the same inside a
// transaction (which derefs to Connection).
// ---------------------------------------------------------------------------

fn save_order_on(conn: &Connection, order: &Order, loaded_version: Option<u64>) -> Result<()> {
    let id = order.id.0.to_string();
    let priority = order.priority.to_string();
    let due_date = order.due_date.map(|d| d.to_string());
    let department = order.current_department.map(|d| d.as_str());
    let status = order.status.to_string();
    let version = order.version as i64;
    let created_at = order.created_at.to_rfc3339();
    let updated_at = order.updated_at.to_rfc3339();
    let completed_at = order.completed_at.map(|t| t.to_rfc3339());
    let mut values: Vec<&dyn ToSql> = vec![
        &id,
        &order.number.0,
        &order.customer,
        &order.notes,
        &priority,
        &due_date,
        &department,
        &status,
        &version,
        &created_at,
        &updated_at,
        &completed_at,
    ];

    match loaded_version {
        None => {
            let inserted = conn.execute(
                "INSERT INTO orders (
                    id, number, customer, notes, priority, due_date, current_department,
                    status, version, created_at, updated_at, completed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                values.as_slice(),
            );
            match inserted {
                Ok(_) => Ok(()),
                // Same id or same number already written by someone else.
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(Error::ConcurrentModification {
                        order: order.id,
                        expected: 0,
                    })
                }
                Err(e) => Err(e.into()),
            }
        }
        Some(expected) => {
            let expected_version = expected as i64;
            values.push(&expected_version);
            let updated = conn.execute(
                "UPDATE orders SET
                    number = ?2, customer = ?3, notes = ?4, priority = ?5, due_date = ?6,
                    current_department = ?7, status = ?8, version = ?9, created_at = ?10,
                    updated_at = ?11, completed_at = ?12
                 WHERE id = ?1 AND version = ?13",
                values.as_slice(),
            )?;
            if updated == 0 {
                return Err(Error::ConcurrentModification {
                    order: order.id,
                    expected,
                });
            }
            Ok(())
        }
    }
}

fn save_department_version_on(
    conn: &Connection,
    department: Department,
    expected: u64,
    current: u64,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE department_versions SET version = ?2 WHERE department = ?1 AND version = ?3",
        params![department.as_str(), current as i64, expected as i64],
    )?;
    if updated == 0 {
        return Err(Error::ConcurrentDepartmentModification {
            department,
            expected,
        });
    }
    Ok(())
}

fn upsert_worker_on(conn: &Connection, worker: &Worker) -> Result<()> {
    conn.execute(
        "INSERT INTO workers (id, name, department, active) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, active = excluded.active",
        params![
            worker.id.as_str(),
            worker.name,
            worker.department.as_str(),
            worker.active,
        ],
    )?;
    Ok(())
}

fn upsert_entry_on(conn: &Connection, entry: &TrackingEntry) -> Result<()> {
    let work_data = serde_json::to_string(&entry.work_data)
        .map_err(|e| Error::Other(format!("failed to encode work data: {e}")))?;
    // ON CONFLICT keeps the rowid, which preserves ledger order on reload.
    conn.execute(
        "INSERT INTO tracking_entries (
            id, order_id, department, sequence, status, worker_id,
            entered_at, exited_at, work_data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(id) DO UPDATE SET
            status = excluded.status,
            worker_id = excluded.worker_id,
            exited_at = excluded.exited_at,
            work_data = excluded.work_data",
        params![
            entry.id.0.to_string(),
            entry.order_id.0.to_string(),
            entry.department.as_str(),
            entry.sequence,
            entry.status.to_string(),
            entry.worker.as_ref().map(|w| w.as_str()),
            entry.entered_at.to_rfc3339(),
            entry.exited_at.map(|t| t.to_rfc3339()),
            work_data,
            entry.actor,
        ],
    )?;
    Ok(())
}

fn insert_queued_on(conn: &Connection, department: Department, queued: &QueuedOrder) -> Result<()> {
    conn.execute(
        "INSERT INTO queue_entries (order_id, department, entry_id, enqueued_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            queued.order_id.0.to_string(),
            department.as_str(),
            queued.entry_id.0.to_string(),
            queued.enqueued_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn insert_event_on(conn: &Connection, event: &Event) -> Result<()> {
    let kind = match &event.kind {
        EventKind::Unknown { raw } => raw.clone(),
        kind => serde_json::to_string(kind)
            .map_err(|e| Error::Other(format!("failed to encode event: {e}")))?,
    };
    // seq is assigned by SQLite: another process may have appended meanwhile.
    conn.execute(
        "INSERT INTO events (timestamp, actor, kind) VALUES (?1, ?2, ?3)",
        params![event.timestamp.to_rfc3339(), event.actor, kind],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Row parsing helpers
// ---------------------------------------------------------------------------

/// Parse a text column through `FromStr`.
fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let s: String = row.get(idx)?;
    s.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_opt_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let s: Option<String> = row.get(idx)?;
    s.map(|s| {
        s.parse().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

fn row_to_order(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: OrderId(parse_col(row, 0)?),
        number: OrderNumber(row.get(1)?),
        customer: row.get(2)?,
        notes: row.get(3)?,
        priority: parse_col(row, 4)?,
        due_date: parse_opt_col::<NaiveDate>(row, 5)?,
        current_department: parse_opt_col(row, 6)?,
        status: parse_col(row, 7)?,
        version: row.get::<_, i64>(8)? as u64,
        created_at: parse_col::<DateTime<Utc>>(row, 9)?,
        updated_at: parse_col::<DateTime<Utc>>(row, 10)?,
        completed_at: parse_opt_col::<DateTime<Utc>>(row, 11)?,
    })
}

fn row_to_worker(row: &Row<'_>) -> rusqlite::Result<Worker> {
    Ok(Worker {
        id: WorkerId(row.get(0)?),
        name: row.get(1)?,
        department: parse_col(row, 2)?,
        active: row.get(3)?,
    })
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<TrackingEntry> {
    let work_data: String = row.get(8)?;
    let work_data = serde_json::from_str(&work_data).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(TrackingEntry {
        id: EntryId(parse_col(row, 0)?),
        order_id: OrderId(parse_col(row, 1)?),
        department: parse_col(row, 2)?,
        sequence: row.get(3)?,
        status: parse_col(row, 4)?,
        worker: row.get::<_, Option<String>>(5)?.map(WorkerId),
        entered_at: parse_col(row, 6)?,
        exited_at: parse_opt_col(row, 7)?,
        work_data,
        actor: row.get(9)?,
    })
}

fn row_to_queued(row: &Row<'_>) -> rusqlite::Result<(Department, QueuedOrder)> {
    Ok((
        parse_col(row, 0)?,
        QueuedOrder {
            order_id: OrderId(parse_col(row, 1)?),
            entry_id: EntryId(parse_col(row, 2)?),
            enqueued_at: parse_col(row, 3)?,
        },
    ))
}
