//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing.

pub mod roster;

use std::path::PathBuf;

use crate::engine::EngineConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    /// Roster file loaded into the worker directory at startup.
    pub roster_path: Option<PathBuf>,
    pub max_active_per_worker: Option<usize>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_path: PathBuf::from(required_var("ROUTING_DB")?),
            roster_path: std::env::var("ROUTING_ROSTER").ok().map(PathBuf::from),
            max_active_per_worker: optional_parsed("ROUTING_MAX_ACTIVE_PER_WORKER")?,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_active_per_worker: self.max_active_per_worker,
        }
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn optional_parsed(name: &str) -> Result<Option<usize>> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(None);
    };
    let value: usize = raw
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{name}={raw:?} is not a number: {e}")))?;
    if value == 0 {
        return Err(Error::Config(format!("{name} must be at least 1")));
    }
    Ok(Some(value))
}
