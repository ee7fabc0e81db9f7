//! warehouse-sync - incremental reporting API to warehouse loader
//!
//! This is the command-line entry point. Jobs run once by default, or
//! forever on per-job intervals with `--repeat` / `REPEAT=1`.

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use warehouse::{
    Endpoints, Entity, Job, ReportingClient, SourceCredentials, SourceError, SqliteWarehouse,
    SyncRun, WarehouseStore, database_path, import_view_history, repeat_enabled, run_job, watermark,
};

mod scheduler;

/// Incremental sync of reporting and SCIM data into a SQLite warehouse
#[derive(Parser)]
#[command(name = "warehouse-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the warehouse database (overrides DB)
    #[arg(global = true, long)]
    db: Option<PathBuf>,

    /// Credentials JSON file to use instead of the environment
    #[arg(global = true, long)]
    credentials: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run sync jobs (all of them when none are named)
    Run {
        /// Jobs to run, e.g. users search-history
        jobs: Vec<Job>,

        /// Keep running each job on its interval until interrupted
        #[arg(short, long)]
        repeat: bool,
    },

    /// Show each entity's watermark and last sync run
    Watermarks,

    /// Load a saved content view history response into the warehouse
    ImportViewHistory {
        /// JSON file holding an array of content view records
        file: PathBuf,
    },

    /// List jobs, the entities they sync and their default intervals
    Jobs,
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Bootstrap data directory
    if let Err(e) = config::init() {
        error!("Failed to initialize data directory: {}", e);
    }

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let db_path = match cli.db {
        Some(path) => path,
        None => database_path()?,
    };

    let command = cli.command.unwrap_or(Commands::Run {
        jobs: Vec::new(),
        repeat: false,
    });

    match command {
        Commands::Run { jobs, repeat } => {
            let jobs = selected_jobs(jobs);
            let store = Arc::new(open_store(&db_path)?);
            let source = Arc::new(connect(cli.credentials.as_deref())?);

            if repeat || repeat_enabled() {
                scheduler::run_forever(&jobs, source, store)?;
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(run_once(&jobs, source.as_ref(), store.as_ref()))
            }
        }
        Commands::Watermarks => {
            let store = open_store(&db_path)?;
            print_status(&store)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::ImportViewHistory { file } => {
            let store = open_store(&db_path)?;
            let saved = import_view_history(&store, &file)?;
            info!("Imported {} content view history records", saved);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Jobs => {
            for job in Job::ALL {
                let entities: Vec<&str> = job.entities().iter().map(|e| e.name()).collect();
                println!(
                    "{:<28} every {:<10} {}",
                    job.name(),
                    job.default_interval().to_string(),
                    entities.join(", ")
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Named jobs in the order given, without repeats; every job if none
fn selected_jobs(named: Vec<Job>) -> Vec<Job> {
    if named.is_empty() {
        return Job::ALL.to_vec();
    }
    let mut jobs = Vec::with_capacity(named.len());
    for job in named {
        if !jobs.contains(&job) {
            jobs.push(job);
        }
    }
    jobs
}

fn open_store(path: &Path) -> Result<SqliteWarehouse> {
    info!("Using warehouse at {}", path.display());
    SqliteWarehouse::new(path)
}

fn connect(credentials_file: Option<&Path>) -> Result<ReportingClient> {
    let credentials = match credentials_file {
        Some(path) => SourceCredentials::from_file(path)?,
        None => load_credentials()?,
    };
    let endpoints = Endpoints::from_env()?;
    ReportingClient::connect(credentials, &endpoints).context("Failed to set up API client")
}

fn load_credentials() -> Result<SourceCredentials> {
    if !SourceCredentials::is_available()
        && let Some(path) = SourceCredentials::default_credentials_path()
    {
        warn!(
            "To configure API access, either:\n\
             1. Place your credentials at: {}\n\
             2. Or set environment variables: TENANT, CLIENT_ID, CLIENT_SECRET and USER_ID",
            path.display()
        );
    }
    SourceCredentials::load()
}

/// Run each job once in order
///
/// A failed job does not stop the others, unless the credentials were
/// rejected: every later job would fail the same way.
fn run_once(jobs: &[Job], source: &ReportingClient, store: &SqliteWarehouse) -> ExitCode {
    let mut failed = 0;
    for &job in jobs {
        if let Err(e) = run_job(job, source, store) {
            error!("{:#}", e);
            failed += 1;
            if is_unauthorized(&e) {
                error!("Credentials rejected, skipping remaining jobs");
                break;
            }
        }
    }

    if failed > 0 {
        error!("{} of {} jobs failed, quitting", failed, jobs.len());
        ExitCode::FAILURE
    } else {
        info!("Main job complete, quitting");
        ExitCode::SUCCESS
    }
}

fn is_unauthorized(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<SourceError>())
        .any(SourceError::is_unauthorized)
}

fn print_status(store: &dyn WarehouseStore) -> Result<()> {
    println!("{:<28} {:<22} LAST RUN", "ENTITY", "WATERMARK");
    for entity in Entity::ALL {
        let mark = if entity.is_watermarked() {
            watermark(store, entity)?.to_rfc3339_opts(SecondsFormat::Secs, true)
        } else {
            "-".to_string()
        };
        let last = match store.last_run(entity)? {
            Some(run) => describe_run(&run),
            None => "never".to_string(),
        };
        println!("{:<28} {:<22} {}", entity.name(), mark, last);
    }
    Ok(())
}

fn describe_run(run: &SyncRun) -> String {
    let finished = run.finished_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    match &run.error {
        Some(error) => format!("{} at {}: {}", run.status, finished, error),
        None => format!(
            "{} at {}, {} records in {} ms",
            run.status,
            finished,
            run.records,
            run.duration_ms()
        ),
    }
}
