//! # azsync CLI - Mirror a directory into Azure Blob Storage
//!
//! Uploads new and changed files from a local directory to a blob
//! container and deletes blobs that no longer have a local file.
//!
//! ## Usage
//! ```bash
//! # Show what would change without touching the container
//! azsync --practice account.json ./public
//!
//! # Same, as JSON lines
//! azsync --practice --format json account.json ./public
//!
//! # Synchronize with 8 parallel workers
//! azsync -j 8 account.json ./public
//! ```
//!
//! The account file is JSON:
//!
//! ```json
//! { "accountName": "...", "accountKey": "...", "containerName": "..." }
//! ```

use azsync::{
    report::format_elapsed, AccountCredentials, AzureBlobStore, ExecutionObserver,
    OperationOutcome, OperationReporter, OperationKind, ReportFormat, Result, SyncError,
    SyncOperation, SyncerBuilder,
};
use clap::{Parser, ValueEnum};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// azsync - Mirror a local directory into an Azure Blob Storage container
#[derive(Parser)]
#[command(name = "azsync")]
#[command(version)]
#[command(about = "Mirror a local directory into an Azure Blob Storage container")]
#[command(long_about = None)]
struct Cli {
    /// Account configuration file (JSON)
    config: PathBuf,

    /// Local directory to mirror
    local_root: PathBuf,

    /// Print the operations instead of applying them
    #[arg(short, long, visible_alias = "dry-run")]
    practice: bool,

    /// Output format for practice runs
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Parallel workers (defaults to the number of CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Follow symbolic links in the local tree
    #[arg(long)]
    follow_symlinks: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => ReportFormat::Text,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("azsync=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        eprintln!(
            "{} {}",
            format!("Error [{}]:", e.stage()).red().bold(),
            e.user_message()
        );
        std::process::exit(1);
    }
}

/// Main command runner
fn run(cli: Cli) -> Result<()> {
    let account = AccountCredentials::load(&cli.config)?;
    let store = AzureBlobStore::new(&account).map_err(|source| SyncError::RemoteConnect {
        store: account.endpoint(),
        source,
    })?;

    let mut builder = SyncerBuilder::new().follow_symlinks(cli.follow_symlinks);
    if let Some(jobs) = cli.jobs {
        builder = builder.parallel_workers(jobs);
    }
    let syncer = builder.build(Arc::new(store), cli.local_root.clone())?;

    // Machine-readable output owns stdout; everything else goes to stderr
    let json = cli.practice && cli.format == OutputFormat::Json;
    let status = |line: String| {
        if json {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
    };

    let start = Instant::now();
    let spinner = spinner(&format!("Connecting to {}...", syncer.store().name()));
    syncer.check_connection().inspect_err(|_| spinner.finish_and_clear())?;

    spinner.set_message(format!(
        "Listing {} and scanning {}...",
        account.container_name,
        cli.local_root.display()
    ));
    let plan = syncer.plan();
    spinner.finish_and_clear();
    let plan = plan?;

    status(format!(
        "{} {} ({})",
        "Planned:".blue().bold(),
        OperationReporter::plan_summary(&plan),
        format_elapsed(start.elapsed())
    ));

    if cli.practice {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        syncer.report(&plan, cli.format.into(), &mut out)?;
        out.flush().map_err(SyncError::Report)?;
        return Ok(());
    }

    if plan.is_empty() {
        println!("{} Container is up to date", "✓".green().bold());
        return Ok(());
    }

    let summary = syncer.apply(&plan, &ConsoleObserver)?;
    println!(
        "{} {} uploaded ({}), {} deleted in {}",
        "✓".green().bold(),
        summary.uploaded.to_string().cyan(),
        format_bytes(summary.bytes_uploaded).cyan(),
        summary.deleted.to_string().cyan(),
        format_elapsed(summary.duration)
    );

    Ok(())
}

/// Prints one line per applied operation
struct ConsoleObserver;

impl ExecutionObserver for ConsoleObserver {
    fn operation_completed(&self, operation: &SyncOperation, outcome: &OperationOutcome) {
        match operation.kind {
            OperationKind::Upload => println!(
                "  {} {} {}",
                "↑".green(),
                operation.path,
                format!("({})", format_bytes(outcome.bytes)).dimmed()
            ),
            OperationKind::Delete => println!("  {} {}", "✗".red(), operation.path),
        }
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    pb
}

/// Format bytes in human-readable form
fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
