//! # factory-routing
//!
//! Department routing and work assignment for a jewelry workshop.
//!
//! Orders travel a fixed nine-department path (CAD through ADDITIONAL).
//! Each department visit is a tracking entry; on entry the order goes to
//! the least-loaded active worker of that department, or waits in the
//! department's FIFO queue. State lives in SQLite, observability goes
//! through tracing and OpenTelemetry.

pub mod config;
pub mod department;
pub mod directory;
pub mod engine;
pub mod error;
pub mod event;
pub mod ledger;
pub mod model;
pub mod queue;
pub mod resolver;
pub mod storage;
pub mod telemetry;
