//! SQLite persistence: reload fidelity and optimistic version checks.

use factory_routing::department::Department;
use factory_routing::engine::{Engine, EngineConfig};
use factory_routing::error::Error;
use factory_routing::event::EventKind;
use factory_routing::model::*;
use factory_routing::storage::Storage;

const OFFICE: &str = "office";

fn temp_db() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("routing.db");
    (dir, path)
}

#[test]
fn saved_state_reloads_identically() {
    let (_dir, path) = temp_db();
    let mut storage = Storage::open(&path).unwrap();
    let mut engine = storage.load(EngineConfig::default()).unwrap();

    engine
        .add_worker(Worker::new("asha", "Asha", Department::Cad), OFFICE)
        .unwrap();
    let assigned = engine.create_order(NewOrder::new().customer("Mehta"), OFFICE).id;
    engine.enter_factory(assigned, OFFICE).unwrap();
    engine.finish_department(assigned, "asha").unwrap();
    let queued = engine.create_order(NewOrder::new(), OFFICE).id;
    let draft = engine.create_order(NewOrder::new(), OFFICE).id;
    engine.enter_factory(queued, OFFICE).unwrap();
    engine.skip_department(queued, "admin").unwrap();

    storage.save(&mut engine).unwrap();
    assert!(engine.dirty_orders().is_empty());

    let reloaded = Storage::open(&path)
        .unwrap()
        .load(EngineConfig::default())
        .unwrap();

    for id in [assigned, queued, draft] {
        assert_eq!(reloaded.get_order(id).unwrap(), engine.get_order(id).unwrap());
        assert_eq!(reloaded.history(id), engine.history(id));
    }
    let queue: Vec<OrderId> = reloaded
        .queues()
        .list(Department::Print)
        .iter()
        .map(|q| q.order_id)
        .collect();
    assert_eq!(queue, vec![assigned, queued]);
    assert_eq!(reloaded.directory().len(), 1);
    assert_eq!(reloaded.events_since(0).len(), engine.events_since(0).len());
}

#[test]
fn order_numbers_continue_after_reload() {
    let mut storage = Storage::in_memory().unwrap();
    let mut engine = storage.load(EngineConfig::default()).unwrap();
    engine.create_order(NewOrder::new(), OFFICE);
    engine.create_order(NewOrder::new(), OFFICE);
    storage.save(&mut engine).unwrap();

    let mut engine = storage.load(EngineConfig::default()).unwrap();
    let third = engine.create_order(NewOrder::new(), OFFICE);
    assert_eq!(third.number.parts().unwrap().1, 3);
}

#[test]
fn stale_engine_cannot_overwrite_newer_save() {
    let (_dir, path) = temp_db();
    let mut storage = Storage::open(&path).unwrap();
    let mut engine = storage.load(EngineConfig::default()).unwrap();
    let id = engine.create_order(NewOrder::new(), OFFICE).id;
    storage.save(&mut engine).unwrap();

    // Two processes load the same state.
    let mut first = storage.load(EngineConfig::default()).unwrap();
    let mut second = Storage::open(&path)
        .unwrap()
        .load(EngineConfig::default())
        .unwrap();

    first.enter_factory(id, "floor-1").unwrap();
    storage.save(&mut first).unwrap();

    second.enter_factory(id, "floor-2").unwrap();
    let mut other = Storage::open(&path).unwrap();
    let err = other.save(&mut second).unwrap_err();

    assert!(matches!(err, Error::ConcurrentModification { order, .. } if order == id));
    assert!(err.is_retriable());

    // Nothing from the losing save landed.
    let stored = storage.load(EngineConfig::default()).unwrap();
    assert_eq!(stored.history(id).len(), 1);
    assert_eq!(stored.history(id)[0].actor, "floor-1");
    assert_eq!(
        storage.order_version(id).unwrap(),
        Some(first.get_order(id).unwrap().version)
    );
}

#[test]
fn unchanged_orders_are_not_rewritten() {
    let mut storage = Storage::in_memory().unwrap();
    let mut engine = storage.load(EngineConfig::default()).unwrap();
    let id = engine.create_order(NewOrder::new(), OFFICE).id;
    storage.save(&mut engine).unwrap();
    let version = storage.order_version(id).unwrap();

    storage.save(&mut engine).unwrap();

    assert_eq!(storage.order_version(id).unwrap(), version);
}

#[test]
fn events_persist_in_order() {
    let mut storage = Storage::in_memory().unwrap();
    let mut engine = storage.load(EngineConfig::default()).unwrap();
    let id = engine.create_order(NewOrder::new(), OFFICE).id;
    engine.enter_factory(id, OFFICE).unwrap();
    storage.save(&mut engine).unwrap();

    let events = storage.get_events_since(0).unwrap();
    assert!(matches!(events[0].kind, EventKind::OrderCreated { order, .. } if order == id));
    assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));

    // A second save appends only what is new.
    engine.cancel(id, OFFICE).ok();
    engine
        .add_worker(Worker::new("asha", "Asha", Department::Cad), OFFICE)
        .unwrap();
    storage.save(&mut engine).unwrap();
    assert_eq!(
        storage.get_events_since(0).unwrap().len(),
        engine.events_since(0).len()
    );
}

#[test]
fn reload_keeps_load_counts() {
    let mut storage = Storage::in_memory().unwrap();
    let mut engine = Engine::new(EngineConfig::default());
    engine
        .add_worker(Worker::new("a", "A", Department::Cad), OFFICE)
        .unwrap();
    engine
        .add_worker(Worker::new("b", "B", Department::Cad), OFFICE)
        .unwrap();
    for _ in 0..3 {
        let id = engine.create_order(NewOrder::new(), OFFICE).id;
        engine.enter_factory(id, OFFICE).unwrap();
    }
    storage.save(&mut engine).unwrap();

    let mut reloaded = storage.load(EngineConfig::default()).unwrap();
    let id = reloaded.create_order(NewOrder::new(), OFFICE).id;
    let outcome = reloaded.enter_factory(id, OFFICE).unwrap();

    // a holds 2, b holds 1.
    assert_eq!(outcome.resolution.worker().unwrap().as_str(), "b");
}

// ---------------------------------------------------------------------------
// Cross-process department and roster conflicts
// ---------------------------------------------------------------------------

/// Saved database with the given CAD workers and two draft orders.
fn two_processes(workers: &[&str]) -> (tempfile::TempDir, std::path::PathBuf, [OrderId; 2]) {
    let (dir, path) = temp_db();
    let mut storage = Storage::open(&path).unwrap();
    let mut engine = storage.load(EngineConfig::default()).unwrap();
    for id in workers {
        engine
            .add_worker(Worker::new(*id, *id, Department::Cad), OFFICE)
            .unwrap();
    }
    let x = engine.create_order(NewOrder::new(), OFFICE).id;
    let y = engine.create_order(NewOrder::new(), OFFICE).id;
    storage.save(&mut engine).unwrap();
    (dir, path, [x, y])
}

fn load(path: &std::path::Path) -> (Storage, Engine) {
    let storage = Storage::open(path).unwrap();
    let engine = storage.load(EngineConfig::default()).unwrap();
    (storage, engine)
}

#[test]
fn stale_assignment_in_same_department_is_rejected() {
    let (_dir, path, [x, y]) = two_processes(&["a", "b"]);
    let (mut s1, mut p1) = load(&path);
    let (mut s2, mut p2) = load(&path);

    // Both see a and b idle, so both pick a.
    p1.enter_factory(x, "floor-1").unwrap();
    p2.enter_factory(y, "floor-2").unwrap();
    s1.save(&mut p1).unwrap();

    let err = s2.save(&mut p2).unwrap_err();
    assert!(matches!(
        err,
        Error::ConcurrentDepartmentModification {
            department: Department::Cad,
            ..
        }
    ));
    assert!(err.is_retriable());

    // Retrying from fresh state picks the other worker.
    let (mut s3, mut p3) = load(&path);
    let outcome = p3.enter_factory(y, "floor-2").unwrap();
    assert_eq!(outcome.resolution.worker().unwrap().as_str(), "b");
    s3.save(&mut p3).unwrap();

    let (_, stored) = load(&path);
    let loads: Vec<usize> = stored
        .workers_in(Department::Cad)
        .iter()
        .map(|l| l.active_assignments)
        .collect();
    assert_eq!(loads, vec![1, 1]);
}

#[test]
fn stale_queue_position_is_rejected() {
    let (_dir, path, [x, y]) = two_processes(&[]);
    let (mut s1, mut p1) = load(&path);
    let (mut s2, mut p2) = load(&path);

    assert_eq!(p1.enter_factory(x, OFFICE).unwrap().resolution.queue_position(), Some(1));
    assert_eq!(p2.enter_factory(y, OFFICE).unwrap().resolution.queue_position(), Some(1));
    s1.save(&mut p1).unwrap();
    assert!(s2.save(&mut p2).is_err());

    let (_, stored) = load(&path);
    assert_eq!(stored.queues().len(Department::Cad), 1);
    assert!(stored.ledger().open_entry(y).is_none());
}

#[test]
fn other_departments_save_independently() {
    let (_dir, path, [x, _]) = two_processes(&["a"]);
    let (mut s1, mut p1) = load(&path);
    let (mut s2, mut p2) = load(&path);

    p1.enter_factory(x, OFFICE).unwrap();
    p2.add_worker(Worker::new("q", "Q", Department::Casting), OFFICE)
        .unwrap();

    s1.save(&mut p1).unwrap();
    s2.save(&mut p2).unwrap();

    let (_, stored) = load(&path);
    assert!(stored.ledger().open_entry(x).is_some());
    assert_eq!(stored.directory().len(), 2);
}

#[test]
fn stale_save_does_not_undo_roster_change() {
    let (_dir, path, _) = two_processes(&["a", "b"]);
    let (mut s1, mut p1) = load(&path);
    let (mut s2, mut p2) = load(&path);

    p1.set_worker_active(&WorkerId::from("a"), false, "hr").unwrap();
    s1.save(&mut p1).unwrap();

    // p2 loaded before the change and never touched the roster.
    p2.create_order(NewOrder::new(), OFFICE);
    s2.save(&mut p2).unwrap();

    let (_, stored) = load(&path);
    assert!(!stored.directory().get(&WorkerId::from("a")).unwrap().active);
}

#[test]
fn concurrent_roster_edits_in_one_department_conflict() {
    let (_dir, path, _) = two_processes(&["a"]);
    let (mut s1, mut p1) = load(&path);
    let (mut s2, mut p2) = load(&path);

    p1.set_worker_active(&WorkerId::from("a"), false, "hr").unwrap();
    p2.add_worker(Worker::new("a", "Renamed", Department::Cad), "hr")
        .unwrap();
    s1.save(&mut p1).unwrap();

    assert!(matches!(
        s2.save(&mut p2),
        Err(Error::ConcurrentDepartmentModification { .. })
    ));
}
