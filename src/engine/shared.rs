//! Thread-safe engine handle.
//!
//! Every operation runs under one lock, so mutations of a single order are
//! serialized and each assign-or-queue decision is atomic with respect to
//! every other decision. Queue admission follows lock acquisition order.
//! Nothing under the lock does I/O.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{Advance, BatchItem, BoardCard, Engine, EntryOutcome};
use crate::department::Department;
use crate::error::{Error, Result};
use crate::model::OrderId;

pub struct SharedEngine {
    inner: Arc<Mutex<Engine>>,
}

impl Clone for SharedEngine {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl SharedEngine {
    pub fn new(engine: Engine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<T>(&self, f: impl FnOnce(&mut Engine) -> Result<T>) -> Result<T> {
        let mut engine = self.lock()?;
        f(&mut engine)
    }

    pub fn send_to_factory(&self, ids: &[OrderId], actor: &str) -> Result<Vec<BatchItem>> {
        Ok(self.lock()?.send_batch_to_factory(ids, actor))
    }

    pub fn enter_factory(&self, id: OrderId, actor: &str) -> Result<EntryOutcome> {
        self.lock()?.enter_factory(id, actor)
    }

    pub fn advance_order(&self, id: OrderId, actor: &str) -> Result<Advance> {
        self.lock()?.advance(id, actor)
    }

    pub fn finish_department(&self, id: OrderId, actor: &str) -> Result<Advance> {
        self.lock()?.finish_department(id, actor)
    }

    pub fn department_board(
        &self,
        department: Department,
        now: DateTime<Utc>,
    ) -> Result<Vec<BoardCard>> {
        Ok(self.lock()?.department_board(department, now))
    }

    /// Take the engine back once every other handle is gone.
    pub fn into_inner(self) -> Result<Engine> {
        Arc::try_unwrap(self.inner)
            .map_err(|_| Error::Other("engine still shared".to_string()))?
            .into_inner()
            .map_err(|_| Error::Other("engine lock poisoned".to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Engine>> {
        self.inner
            .lock()
            .map_err(|_| Error::Other("engine lock poisoned".to_string()))
    }
}
