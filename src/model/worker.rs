//! Workers and their derived load.

use serde::{Deserialize, Serialize};

use crate::department::Department;

/// A person on the floor. Belongs to exactly one department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub name: String,
    pub department: Department,
    /// Inactive workers stay on the roster but never receive new work.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Worker {
    pub fn new(id: impl Into<String>, name: impl Into<String>, department: Department) -> Self {
        Self {
            id: WorkerId(id.into()),
            name: name.into(),
            department,
            active: true,
        }
    }
}

/// Worker identity. Ordering is the assignment tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl WorkerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A worker together with the number of entries they currently hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerLoad {
    pub worker: Worker,
    pub active_assignments: usize,
}
