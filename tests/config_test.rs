use std::sync::Mutex;

use factory_routing::config::{Config, roster};
use factory_routing::department::Department;

// Env vars are process-wide; keep these tests from interleaving.
static ENV: Mutex<()> = Mutex::new(());

fn clear() {
    unsafe {
        std::env::remove_var("ROUTING_DB");
        std::env::remove_var("ROUTING_ROSTER");
        std::env::remove_var("ROUTING_MAX_ACTIVE_PER_WORKER");
    }
}

#[test]
fn config_from_env_loads_required_fields() {
    let _lock = ENV.lock().unwrap();
    clear();
    unsafe {
        std::env::set_var("ROUTING_DB", "/tmp/routing-test.db");
        std::env::set_var("ROUTING_MAX_ACTIVE_PER_WORKER", "3");
    }

    let config = Config::from_env().unwrap();
    assert_eq!(config.database_path.to_str(), Some("/tmp/routing-test.db"));
    assert_eq!(config.engine_config().max_active_per_worker, Some(3));
    assert!(config.roster_path.is_none());
    assert!(!config.log_level.is_empty());

    clear();
}

#[test]
fn config_from_env_fails_without_required() {
    let _lock = ENV.lock().unwrap();
    clear();

    let result = Config::from_env();
    assert!(result.is_err());
}

#[test]
fn config_rejects_zero_or_garbage_cap() {
    let _lock = ENV.lock().unwrap();
    clear();
    unsafe {
        std::env::set_var("ROUTING_DB", "/tmp/routing-test.db");
        std::env::set_var("ROUTING_MAX_ACTIVE_PER_WORKER", "0");
    }
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::set_var("ROUTING_MAX_ACTIVE_PER_WORKER", "lots");
    }
    assert!(Config::from_env().is_err());

    clear();
}

// ---------------------------------------------------------------------------
// Roster files
// ---------------------------------------------------------------------------

#[test]
fn roster_parses_workers_with_default_active() {
    let workers = roster::parse(
        r#"
        [[worker]]
        id = "w-cad-01"
        name = "Asha"
        department = "CAD"

        [[worker]]
        id = "w-pol-02"
        name = "Ravi"
        department = "POLISH_2"
        active = false
        "#,
    )
    .unwrap();

    assert_eq!(workers.len(), 2);
    assert_eq!(workers[0].department, Department::Cad);
    assert!(workers[0].active);
    assert_eq!(workers[1].department, Department::Polish2);
    assert!(!workers[1].active);
}

#[test]
fn roster_rejects_duplicates_and_unknown_departments() {
    let duplicate = r#"
        [[worker]]
        id = "w-1"
        name = "A"
        department = "CAD"

        [[worker]]
        id = "w-1"
        name = "B"
        department = "PRINT"
    "#;
    assert!(roster::parse(duplicate).is_err());

    let unknown = r#"
        [[worker]]
        id = "w-1"
        name = "A"
        department = "ENGRAVING"
    "#;
    assert!(roster::parse(unknown).is_err());
}

#[test]
fn roster_loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("roster.toml");
    std::fs::write(
        &path,
        "[[worker]]\nid = \"w-set-01\"\nname = \"Meera\"\ndepartment = \"SETTING\"\n",
    )
    .unwrap();

    let workers = roster::load(&path).unwrap();
    assert_eq!(workers[0].id.as_str(), "w-set-01");

    assert!(roster::load(&dir.path().join("missing.toml")).is_err());
}
