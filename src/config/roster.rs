//! Worker roster files.
//!
//! The directory of workers is owned by HR, not by routing. It reaches the
//! engine as a TOML file:
//!
//! ```toml
//! [[worker]]
//! id = "w-cad-01"
//! name = "Asha"
//! department = "CAD"
//!
//! [[worker]]
//! id = "w-set-02"
//! name = "Ravi"
//! department = "SETTING"
//! active = false
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::model::Worker;

/// Top-level TOML wrapper.
#[derive(Debug, Deserialize)]
struct RosterFile {
    #[serde(default, rename = "worker")]
    workers: Vec<Worker>,
}

/// Parse roster TOML. Worker ids must be unique within the file.
pub fn parse(content: &str) -> Result<Vec<Worker>> {
    let file: RosterFile =
        toml::from_str(content).map_err(|e| Error::Config(format!("bad roster: {e}")))?;

    let mut seen = HashSet::new();
    for worker in &file.workers {
        if !seen.insert(worker.id.clone()) {
            return Err(Error::Config(format!("worker {} listed twice", worker.id)));
        }
    }
    Ok(file.workers)
}

/// Load a roster file from disk.
pub fn load(path: &Path) -> Result<Vec<Worker>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read roster {}: {e}", path.display())))?;
    parse(&content).map_err(|e| match e {
        Error::Config(msg) => Error::Config(format!("{}: {msg}", path.display())),
        other => other,
    })
}
