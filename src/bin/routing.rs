//! routing CLI: operator interface to the department routing engine.

use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use factory_routing::config::{Config, roster};
use factory_routing::department::Department;
use factory_routing::engine::{Advance, Engine, EntryOutcome};
use factory_routing::model::{NewOrder, Order, OrderId, OrderStatus, Priority, Worker, WorkerId};
use factory_routing::resolver::Resolution;
use factory_routing::storage::Storage;
use factory_routing::telemetry::{TelemetryConfig, init_telemetry};

#[derive(Parser)]
#[command(name = "routing", about = "Move jewelry orders through the factory")]
struct Cli {
    /// Who is acting (recorded on entries and events). Defaults to $USER.
    #[arg(long, global = true)]
    actor: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Order operations
    Order {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// Send orders to their first department (CAD)
    Send {
        /// Order numbers or ids
        #[arg(required = true)]
        orders: Vec<String>,
    },
    /// Worker starts the assigned entry
    Start { order: String },
    /// Close the current entry as completed
    Complete { order: String },
    /// Move an order with a closed entry to its next department
    Advance { order: String },
    /// Complete the current entry and advance in one step
    Finish { order: String },
    /// Skip the current department (administrative override)
    Skip { order: String },
    /// Assign a specific worker to a waiting order
    Assign { order: String, worker: String },
    /// Show the Kanban board, or one department column
    Board {
        #[arg(long)]
        department: Option<String>,
    },
    /// Worker loads, optionally for one department
    Workers {
        #[arg(long)]
        department: Option<String>,
    },
    /// Roster operations
    Roster {
        #[command(subcommand)]
        action: RosterAction,
    },
    /// Print events after a sequence number as JSON lines
    Events {
        #[arg(long, default_value_t = 0)]
        since: u64,
    },
}

#[derive(Subcommand)]
enum OrderAction {
    /// Create a new DRAFT order
    New {
        #[arg(long)]
        customer: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long, default_value = "NORMAL")]
        priority: String,
        /// Due date, YYYY-MM-DD
        #[arg(long)]
        due: Option<NaiveDate>,
        /// Mark PENDING right away
        #[arg(long)]
        pending: bool,
    },
    /// Show an order with its department history
    Show { order: String },
    /// List orders
    List {
        /// Filter by status
        #[arg(long)]
        status: Option<String>,
    },
    /// Cancel an order that has not entered the factory
    Cancel { order: String },
    /// Move a completed order to quality check
    Qc { order: String },
    /// Mark an order delivered
    Deliver { order: String },
}

#[derive(Subcommand)]
enum RosterAction {
    /// Load workers from a roster TOML file
    Load { path: PathBuf },
    /// Add or update one worker
    Add {
        id: String,
        name: String,
        department: String,
    },
    /// Deactivate a worker
    Deactivate { id: String },
    /// Reactivate a worker
    Activate { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    let _guard = init_telemetry(TelemetryConfig::from_config(&config, "factory-routing"))?;

    let actor = cli
        .actor
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "routing-cli".to_string());

    let mut storage = Storage::open(&config.database_path)?;
    let mut engine = storage.load(config.engine_config())?;

    // The roster file is authoritative. Unchanged records are no-ops and
    // leave the stored roster alone.
    if let Some(ref path) = config.roster_path {
        for worker in roster::load(path)? {
            print_dispatched(&engine.add_worker(worker, &actor)?);
        }
    }

    run(cli.command, &mut engine, &actor)?;
    storage.save(&mut engine)?;
    Ok(())
}

fn run(command: Command, engine: &mut Engine, actor: &str) -> anyhow::Result<()> {
    match command {
        Command::Order { action } => cmd_order(action, engine, actor),
        Command::Send { orders } => {
            let ids = orders
                .iter()
                .map(|o| find_order(engine, o))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let mut failed = 0;
            for item in engine.send_batch_to_factory(&ids, actor) {
                match item.result {
                    Ok(outcome) => print_outcome(&outcome),
                    Err(e) => {
                        failed += 1;
                        eprintln!("{}: {e}", item.order);
                    }
                }
            }
            if failed > 0 {
                println!("{failed} of {} order(s) not sent", ids.len());
            }
            Ok(())
        }
        Command::Start { order } => {
            let id = find_order(engine, &order)?;
            let entry = engine.start_work(id, actor)?;
            println!("{} started at {}", entry.order_id, entry.department);
            Ok(())
        }
        Command::Complete { order } => {
            let id = find_order(engine, &order)?;
            let entry = engine.complete_work(id, actor)?;
            println!(
                "{} completed at {} ({}s)",
                entry.order_id,
                entry.department,
                entry.time_in_department(Utc::now()).num_seconds()
            );
            Ok(())
        }
        Command::Advance { order } => {
            let id = find_order(engine, &order)?;
            print_advance(&engine.advance(id, actor)?);
            Ok(())
        }
        Command::Finish { order } => {
            let id = find_order(engine, &order)?;
            print_advance(&engine.finish_department(id, actor)?);
            Ok(())
        }
        Command::Skip { order } => {
            let id = find_order(engine, &order)?;
            print_advance(&engine.skip_department(id, actor)?);
            Ok(())
        }
        Command::Assign { order, worker } => {
            let id = find_order(engine, &order)?;
            print_outcome(&engine.assign_manually(id, &WorkerId::from(worker.as_str()), actor)?);
            Ok(())
        }
        Command::Board { department } => {
            cmd_board(engine, department.as_deref());
            Ok(())
        }
        Command::Workers { department } => {
            let departments = match department {
                Some(d) => vec![d.parse::<Department>()?],
                None => Department::all().to_vec(),
            };
            println!("{:<12}  {:<16}  {:<20}  {:<6}  ACTIVE", "DEPT", "ID", "NAME", "ON");
            println!("{}", "-".repeat(70));
            for department in departments {
                for load in engine.workers_in(department) {
                    println!(
                        "{:<12}  {:<16}  {:<20}  {:<6}  {}",
                        department,
                        load.worker.id,
                        load.worker.name,
                        if load.worker.active { "yes" } else { "no" },
                        load.active_assignments
                    );
                }
            }
            Ok(())
        }
        Command::Roster { action } => cmd_roster(action, engine, actor),
        Command::Events { since } => {
            for event in engine.events_since(since) {
                println!("{}", serde_json::to_string(&event)?);
            }
            Ok(())
        }
    }
}

fn cmd_order(action: OrderAction, engine: &mut Engine, actor: &str) -> anyhow::Result<()> {
    match action {
        OrderAction::New {
            customer,
            notes,
            priority,
            due,
            pending,
        } => {
            let mut new = NewOrder::new().priority(priority.parse::<Priority>()?);
            if let Some(customer) = customer {
                new = new.customer(customer);
            }
            if let Some(notes) = notes {
                new = new.notes(notes);
            }
            if let Some(due) = due {
                new = new.due(due);
            }
            let order = engine.create_order(new, actor);
            if pending {
                engine.mark_pending(order.id, actor)?;
            }
            println!("Created: {} ({})", order.number, order.id);
            Ok(())
        }
        OrderAction::Show { order } => {
            let id = find_order(engine, &order)?;
            print_order(engine, engine.get_order(id)?)
        }
        OrderAction::List { status } => {
            let status = status
                .map(|s| s.to_ascii_uppercase().replace('-', "_").parse::<OrderStatus>())
                .transpose()?;
            let orders = engine.list_orders(status);
            if orders.is_empty() {
                println!("No orders found.");
                return Ok(());
            }

            println!(
                "{:<14}  {:<12}  {:<8}  {:<12}  {:<10}  CUSTOMER",
                "NUMBER", "STATUS", "PRI", "DEPARTMENT", "DUE"
            );
            println!("{}", "-".repeat(80));
            for o in &orders {
                println!(
                    "{:<14}  {:<12}  {:<8}  {:<12}  {:<10}  {}",
                    o.number,
                    o.status,
                    o.priority,
                    o.current_department.map_or("-", |d| d.as_str()),
                    o.due_date.map_or("-".to_string(), |d| d.to_string()),
                    o.customer.as_deref().unwrap_or("-")
                );
            }
            println!("\n{} order(s)", orders.len());
            Ok(())
        }
        OrderAction::Cancel { order } => {
            let id = find_order(engine, &order)?;
            println!("{} {}", order, engine.cancel(id, actor)?.status);
            Ok(())
        }
        OrderAction::Qc { order } => {
            let id = find_order(engine, &order)?;
            println!("{} {}", order, engine.mark_quality_check(id, actor)?.status);
            Ok(())
        }
        OrderAction::Deliver { order } => {
            let id = find_order(engine, &order)?;
            println!("{} {}", order, engine.deliver(id, actor)?.status);
            Ok(())
        }
    }
}

fn cmd_roster(action: RosterAction, engine: &mut Engine, actor: &str) -> anyhow::Result<()> {
    match action {
        RosterAction::Load { path } => {
            let workers = roster::load(&path)?;
            let count = workers.len();
            for worker in workers {
                print_dispatched(&engine.add_worker(worker, actor)?);
            }
            println!("{count} worker(s) loaded from {}", path.display());
            Ok(())
        }
        RosterAction::Add {
            id,
            name,
            department,
        } => {
            let worker = Worker::new(id, name, department.parse()?);
            print_dispatched(&engine.add_worker(worker, actor)?);
            Ok(())
        }
        RosterAction::Deactivate { id } => {
            engine.set_worker_active(&WorkerId::from(id.as_str()), false, actor)?;
            Ok(())
        }
        RosterAction::Activate { id } => {
            print_dispatched(&engine.set_worker_active(&WorkerId::from(id.as_str()), true, actor)?);
            Ok(())
        }
    }
}

fn cmd_board(engine: &Engine, department: Option<&str>) {
    let now = Utc::now();
    for column in engine.factory_board(now) {
        if department.is_some_and(|d| d.parse::<Department>().ok() != Some(column.department)) {
            continue;
        }
        println!(
            "== {} ({} active, {} queued)",
            column.label, column.active, column.queued
        );
        for card in &column.cards {
            let holder = match (&card.worker, card.queue_position) {
                (Some(worker), _) => worker.to_string(),
                (None, Some(pos)) => format!("queue #{pos}"),
                (None, None) => "-".to_string(),
            };
            println!(
                "   {:<14}  {:<18}  {:<16}  {:>6}m{}",
                card.number,
                card.status,
                holder,
                card.seconds_in_department / 60,
                if card.overdue { "  OVERDUE" } else { "" }
            );
        }
    }
}

/// Resolve an order by number (ORD-2026-0001), full id or id prefix.
fn find_order(engine: &Engine, key: &str) -> anyhow::Result<OrderId> {
    if let Ok(order) = engine.order_by_number(key) {
        return Ok(order.id);
    }
    if let Ok(uuid) = uuid::Uuid::parse_str(key) {
        return Ok(engine.get_order(OrderId(uuid))?.id);
    }

    let matches: Vec<_> = engine
        .list_orders(None)
        .into_iter()
        .filter(|o| o.id.0.to_string().starts_with(key))
        .collect();
    match matches.len() {
        0 => anyhow::bail!("no order matching '{key}'"),
        1 => Ok(matches[0].id),
        n => anyhow::bail!("{n} orders match prefix '{key}', be more specific"),
    }
}

fn print_order(engine: &Engine, order: &Order) -> anyhow::Result<()> {
    println!("Number:      {}", order.number);
    println!("ID:          {}", order.id);
    println!("Status:      {}", order.status);
    println!("Priority:    {}", order.priority);
    println!("Customer:    {}", order.customer.as_deref().unwrap_or("-"));
    println!(
        "Due:         {}",
        order.due_date.map_or("-".to_string(), |d| d.to_string())
    );
    println!(
        "Department:  {}",
        order.current_department.map_or("-", |d| d.label())
    );
    println!("Created:     {}", order.created_at);
    if let Some(completed) = order.completed_at {
        println!("Completed:   {completed}");
    }

    let history = engine.history(order.id);
    if !history.is_empty() {
        println!("---");
        let now = Utc::now();
        for entry in history {
            println!(
                "{:>2}. {:<12}  {:<18}  {:<16}  {}s",
                entry.sequence,
                entry.department,
                entry.status,
                entry.worker.as_ref().map_or("-", |w| w.as_str()),
                entry.time_in_department(now).num_seconds()
            );
            if !entry.work_data.is_null() {
                println!("    {}", serde_json::to_string(&entry.work_data)?);
            }
        }
    }
    Ok(())
}

fn print_outcome(outcome: &EntryOutcome) {
    match &outcome.resolution {
        Resolution::Assigned { worker } => {
            println!("{} -> {} assigned to {worker}", outcome.number, outcome.department)
        }
        Resolution::Queued { position } => println!(
            "{} -> {} queued at position {position}",
            outcome.number, outcome.department
        ),
    }
}

fn print_advance(advance: &Advance) {
    match advance {
        Advance::Next(outcome) => print_outcome(outcome),
        Advance::Completed { number, .. } => println!("{number} finished all departments"),
    }
}

fn print_dispatched(outcomes: &[EntryOutcome]) {
    for outcome in outcomes {
        print_outcome(outcome);
    }
}
