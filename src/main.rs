//! persona-sync: person registry CLI with write-behind to a remote document store.
//!
//! Mutations are applied to the remote store when it answers, and queued locally
//! when it does not. Queued work is replayed by `sync` (one pass) or `daemon`
//! (periodic passes until Ctrl-C).
//!
//! ## Example Usage
//!
//! ```bash
//! # Register a person from a JSON file
//! persona-sync create --file ana.json
//!
//! # Replace a record (the identifier cannot change)
//! persona-sync update 11111111-1 --file ana.json
//!
//! # Inspect and drain the local queue
//! persona-sync pending
//! persona-sync sync
//!
//! # Reconcile every 30 seconds
//! persona-sync daemon --interval-secs 30
//! ```
//!
//! Exit codes: 0 ok, 3 deferred, 2 validation, 4 conflict, 5 not found,
//! 6 unavailable, 1 anything else.

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use persona_outbox::{FsPendingStore, OutboxMetrics, PendingOperation, PendingStore};
use persona_sync::{
    logging, MutationOutcome, PersonService, ReconcileReport, ReconcileScheduler, Reconciler,
    RemoteHandle, RunStatus, ServiceError, SyncConfig,
};
use persona_types::Person;

const EXIT_OK: i32 = 0;
const EXIT_OTHER: i32 = 1;
const EXIT_DEFERRED: i32 = 3;
const EXIT_UNAVAILABLE: i32 = 6;

#[derive(Parser)]
#[command(
    name = "persona-sync",
    author,
    version,
    about = "Person registry with offline write-behind",
    long_about = "Create, update, delete and read person records in a remote document store.\n\n\
                  Mutations made while the store is unreachable are queued locally and \
                  replayed by `sync` or `daemon`."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Local state directory (queue, default credential file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Credential file enabling the remote store
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    /// Remote store endpoint (overrides the credential file)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Remote collection holding person documents
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Reconciliation period for `daemon`
    #[arg(long, global = true)]
    interval_secs: Option<u64>,

    /// Output as JSON instead of human-readable format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (debug logging)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new person from a JSON file ('-' for stdin)
    Create {
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
    },

    /// Replace an existing person from a JSON file ('-' for stdin)
    Update {
        id: String,
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
    },

    /// Delete a person
    Delete { id: String },

    /// Show one person (requires the remote store)
    Get { id: String },

    /// List all persons (requires the remote store)
    List,

    /// Show queued mutations awaiting replay
    Pending,

    /// Run one reconciliation pass
    Sync,

    /// Reconcile periodically until interrupted
    Daemon,
}

struct App {
    service: PersonService,
    reconciler: Arc<Reconciler>,
    metrics: OutboxMetrics,
    interval: Duration,
    json: bool,
}

impl App {
    fn build(config: SyncConfig, json: bool) -> Result<Self> {
        let queue_dir = config.queue_dir();
        let queue: Arc<dyn PendingStore> = Arc::new(
            FsPendingStore::open(&queue_dir)
                .with_context(|| format!("opening queue at {}", queue_dir.display()))?,
        );
        let remote = Arc::new(RemoteHandle::new(config.connector()));
        let metrics = OutboxMetrics::default();

        Ok(Self {
            service: PersonService::new(remote.clone(), queue.clone(), metrics.clone()),
            reconciler: Arc::new(Reconciler::new(remote, queue, metrics.clone())),
            metrics,
            interval: config.sync_interval,
            json,
        })
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let json = cli.json;

    let code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            let code = err
                .downcast_ref::<ServiceError>()
                .map(ServiceError::exit_code)
                .unwrap_or(EXIT_OTHER);
            print_error(&err, json);
            code
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<i32> {
    let config = resolve_config(&cli);
    let app = App::build(config, cli.json)?;

    match cli.command {
        Commands::Create { file } => {
            let person = read_person(&file)?;
            let outcome = app.service.create(person)?;
            Ok(print_mutation(&app, "created", outcome))
        }
        Commands::Update { id, file } => {
            let person = read_person(&file)?;
            let outcome = app.service.update(&id, person)?;
            Ok(print_mutation(&app, "updated", outcome))
        }
        Commands::Delete { id } => {
            let outcome = app.service.delete(&id)?;
            let outcome = match outcome {
                MutationOutcome::Applied(()) => MutationOutcome::Applied(id),
                MutationOutcome::Deferred => MutationOutcome::Deferred,
            };
            Ok(print_mutation(&app, "deleted", outcome))
        }
        Commands::Get { id } => {
            let person = app.service.get(&id)?;
            if app.json {
                println!("{}", serde_json::to_string_pretty(&person)?);
            } else {
                print_person(&person);
            }
            Ok(EXIT_OK)
        }
        Commands::List => {
            let people = app.service.list()?;
            if app.json {
                println!("{}", serde_json::to_string_pretty(&people)?);
            } else {
                print_people(&people);
            }
            Ok(EXIT_OK)
        }
        Commands::Pending => {
            let ops = app.service.pending()?;
            let view = pending_view(&ops);
            if app.json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print_pending(&view);
            }
            Ok(EXIT_OK)
        }
        Commands::Sync => {
            let report = app.reconciler.run()?;
            print_report(&app, &report);
            Ok(report_exit_code(&report))
        }
        Commands::Daemon => {
            let scheduler = ReconcileScheduler::new(app.reconciler.clone(), app.interval);
            scheduler.run_until(shutdown_signal()).await;
            if app.json {
                println!("{}", serde_json::to_string_pretty(&app.metrics.snapshot())?);
            } else {
                println!("{}", app.metrics.snapshot().format_report());
            }
            Ok(EXIT_OK)
        }
    }
}

fn resolve_config(cli: &Cli) -> SyncConfig {
    let mut config = SyncConfig::from_env();
    if let Some(dir) = &cli.data_dir {
        config.set_data_dir(dir.clone());
    }
    if let Some(path) = &cli.credentials {
        config.credentials_path = path.clone();
    }
    if let Some(endpoint) = &cli.endpoint {
        config.endpoint = Some(endpoint.clone());
    }
    if let Some(collection) = &cli.collection {
        config.remote.collection = collection.clone();
    }
    if let Some(secs) = cli.interval_secs {
        config.sync_interval = Duration::from_secs(secs.max(1));
    }
    config
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("interrupt received; shutting down"),
        Err(e) => warn!(error = %e, "cannot listen for Ctrl-C; shutting down"),
    }
}

/// Read a person record from a file, or stdin for `-`.
fn read_person(path: &Path) -> Result<Person> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading person from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading person from {}", path.display()))?
    };
    serde_json::from_str(&text)
        .map_err(|e| ServiceError::Validation(format!("malformed person record: {}", e)).into())
}

fn print_mutation<T: serde::Serialize + Described>(
    app: &App,
    verb: &str,
    outcome: MutationOutcome<T>,
) -> i32 {
    match outcome {
        MutationOutcome::Applied(value) => {
            if app.json {
                println!(
                    "{}",
                    json!({ "status": "applied", "action": verb, "result": value })
                );
            } else {
                println!("{} {}", capitalize(verb), value.describe());
            }
            EXIT_OK
        }
        MutationOutcome::Deferred => {
            if app.json {
                println!("{}", json!({ "status": "deferred", "action": verb }));
            } else {
                println!("Remote store unavailable; change queued for reconciliation");
            }
            EXIT_DEFERRED
        }
    }
}

/// Short human label for a mutation result.
trait Described {
    fn describe(&self) -> String;
}

impl Described for Person {
    fn describe(&self) -> String {
        format!("{} ({} {})", self.id, self.given_name, self.family_name)
    }
}

impl Described for String {
    fn describe(&self) -> String {
        self.clone()
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn print_person(person: &Person) {
    let today = Local::now().date_naive();
    println!("ID:          {}", person.id);
    println!("Name:        {} {}", person.given_name, person.family_name);
    println!(
        "Birth date:  {} (age {})",
        person.birth_date.format(persona_types::BIRTH_DATE_FORMAT),
        person.age_on(today)
    );
    if let Some(address) = &person.address {
        println!(
            "Address:     {}, {}, {}",
            address.street, address.district, address.region
        );
    }
}

fn print_people(people: &[Person]) {
    if people.is_empty() {
        println!("No persons registered");
        return;
    }
    let today = Local::now().date_naive();
    println!("{:<14} {:<32} {:<12} {:>4}", "ID", "NAME", "BIRTH DATE", "AGE");
    for person in people {
        let name = format!("{} {}", person.given_name, person.family_name);
        println!(
            "{:<14} {:<32} {:<12} {:>4}",
            person.id,
            name,
            person.birth_date.format(persona_types::BIRTH_DATE_FORMAT),
            person.age_on(today)
        );
    }
}

/// Queue entry as shown to users. Sequence ids stay internal; position is the
/// 1-based replay order.
#[derive(serde::Serialize)]
struct PendingEntry<'a> {
    position: usize,
    kind: &'a str,
    identifier: &'a str,
    payload: &'a str,
}

fn pending_view(ops: &[PendingOperation]) -> Vec<PendingEntry<'_>> {
    ops.iter()
        .enumerate()
        .map(|(index, op)| PendingEntry {
            position: index + 1,
            kind: &op.kind,
            identifier: &op.identifier,
            payload: &op.payload,
        })
        .collect()
}

fn print_pending(entries: &[PendingEntry<'_>]) {
    if entries.is_empty() {
        println!("No pending operations");
        return;
    }
    println!("{:>4} {:<8} {}", "#", "KIND", "IDENTIFIER");
    for entry in entries {
        println!("{:>4} {:<8} {}", entry.position, entry.kind, entry.identifier);
    }
    println!("\n{} pending operation(s)", entries.len());
}

fn print_report(app: &App, report: &ReconcileReport) {
    if app.json {
        println!(
            "{}",
            json!({
                "status": report.status.to_string(),
                "succeeded": report.succeeded,
                "failed": report.failed,
                "retained": report.retained,
            })
        );
    } else {
        println!("Reconciliation {}", report);
    }
}

fn report_exit_code(report: &ReconcileReport) -> i32 {
    match report.status {
        RunStatus::Completed | RunStatus::AlreadyRunning => EXIT_OK,
        RunStatus::StoreUnavailable | RunStatus::Interrupted => EXIT_UNAVAILABLE,
    }
}

fn print_error(err: &anyhow::Error, json: bool) {
    if json {
        let kind = err
            .downcast_ref::<ServiceError>()
            .map(ServiceError::kind)
            .unwrap_or("ERROR");
        println!("{}", json!({ "error": kind, "message": format!("{:#}", err) }));
    } else {
        eprintln!("Error: {:#}", err);
    }
}
