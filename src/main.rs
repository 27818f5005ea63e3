//! Driftwatch CLI.
//!
//! Standalone entry point around the scan engine: run a pass, inspect or
//! clear the registry, and force-release a stuck scan lock. Scheduling is
//! left to the operator (cron, systemd timer, a webhook wrapper); every
//! trigger ends up in the same `scan` subcommand and the scan lock sorts
//! out overlap.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use driftwatch::{
    logging, Config, ConfigIdentityStore, Registry, ScanError, ScanLock, ScanOptions,
    ScanOrchestrator, Trigger,
};
use driftwatch::sinks::{DirectoryCatalog, FileActivityLog};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "driftwatch", about = "Idempotent file-store → catalog synchronization")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "driftwatch.toml")]
    config: PathBuf,

    /// Enable verbose logging on stderr
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one scan pass
    Scan {
        /// What kind of trigger this invocation represents
        #[arg(long, default_value = "manual")]
        trigger: String,
    },

    /// Show lock state and registry size
    Status,

    /// Force-release the scan lock (operator escape hatch)
    Unlock,

    /// Registry operations
    #[command(subcommand)]
    Registry(RegistryCommands),
}

#[derive(Subcommand, Debug)]
enum RegistryCommands {
    /// List all registry entries
    List,

    /// Drop every entry, forcing full re-ingestion on the next pass
    Clear,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    let state_dir = config.state_dir();
    std::fs::create_dir_all(&state_dir)
        .with_context(|| format!("Failed to create state directory {}", state_dir.display()))?;
    logging::init_logging(&state_dir, cli.verbose)?;

    match cli.command {
        Commands::Scan { trigger } => {
            let Some(trigger) = Trigger::parse(&trigger) else {
                bail!("unknown trigger '{trigger}' (expected 'manual' or 'scheduled')");
            };
            run_scan(&config, trigger)
        }
        Commands::Status => show_status(&config),
        Commands::Unlock => {
            let lock = ScanLock::new(&config.lock_path());
            if lock.force_release()? {
                println!("Scan lock released.");
            } else {
                println!("No scan lock was held.");
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Registry(cmd) => run_registry(&config, cmd),
    }
}

fn run_scan(config: &Config, trigger: Trigger) -> Result<ExitCode> {
    let store = config.build_store()?;
    let identities = ConfigIdentityStore::new(config.owners.clone());
    let catalog = DirectoryCatalog::new(&config.catalog_dir())
        .context("Failed to open artifact spool directory")?;
    let activity = FileActivityLog::new(&config.activity_log_path());
    let registry = Registry::open(&config.registry_path())?;
    let lock = ScanLock::new(&config.lock_path());

    let orchestrator = ScanOrchestrator::new(
        store.as_ref(),
        &identities,
        &catalog,
        &activity,
        &registry,
        &lock,
        ScanOptions::from_config(config),
    );

    match orchestrator.run(trigger) {
        Ok(report) => {
            println!("Scan finished: {report}");
            for issue in &report.issues {
                println!("  {issue}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(ScanError::AlreadyRunning(e)) => {
            println!("Scan not started: {e}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => Err(e.into()),
    }
}

fn show_status(config: &Config) -> Result<ExitCode> {
    let lock = ScanLock::new(&config.lock_path());
    match lock.status()? {
        Some(state) => println!(
            "Lock: held by {} (pid {}) for {}s, ttl {}s{}",
            state.holder_token,
            state.pid,
            state.held_secs(),
            state.ttl_secs,
            if state.is_stale() { " [stale]" } else { "" }
        ),
        None => println!("Lock: free"),
    }

    let registry = Registry::open(&config.registry_path())?;
    println!("Registry: {} entries", registry.len()?);
    Ok(ExitCode::SUCCESS)
}

fn run_registry(config: &Config, cmd: RegistryCommands) -> Result<ExitCode> {
    let registry = Registry::open(&config.registry_path())?;
    match cmd {
        RegistryCommands::List => {
            let entries = registry.all()?;
            if entries.is_empty() {
                println!("Registry is empty.");
                return Ok(ExitCode::SUCCESS);
            }
            let mut table = Table::new();
            table.set_header(vec!["Owner folder", "Path", "Artifact", "Created", "Trigger"]);
            for entry in &entries {
                table.add_row(vec![
                    entry.owner_folder.clone(),
                    entry.relative_path.clone(),
                    entry.artifact_id.to_string(),
                    entry.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    entry.triggered_by.to_string(),
                ]);
            }
            println!("{table}");
            println!("{} entries", entries.len());
        }
        RegistryCommands::Clear => {
            let dropped = registry.clear()?;
            println!("Dropped {dropped} registry entries; next scan re-ingests everything.");
        }
    }
    Ok(ExitCode::SUCCESS)
}
