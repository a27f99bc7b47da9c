//! Command-line interface and the organize pipeline.
//!
//! A run goes through these stages, stopping at the first fatal error:
//! 1. Compile exclusion filters and build the category mapping
//! 2. Check that the source directory exists
//! 3. Create the category folders under the destination
//! 4. Move every file, sorted by name, collecting outcomes
//! 5. Record successful moves in the history store
//! 6. Report

use crate::config::{AppConfig, CompiledFilters, Overrides, RunSettings};
use crate::error::{AppError, Result};
use crate::file_category::{ExtensionClassifier, FileTask};
use crate::file_organizer::{CollisionSafeMover, DestinationProvisioner, FileOutcome, SkipReason};
use crate::history::{
    self, HistoryStore, MoveHistoryRecorder, SqliteHistory, UnavailableHistory,
};
use crate::logging;
use crate::output::OutputFormatter;
use crate::summary::RunSummary;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Move files into category folders by extension and keep a history of every move.
#[derive(Debug, Parser)]
#[command(name = "automover", version, about)]
pub struct Cli {
    /// Configuration file (default: ./automover.toml, then ~/.config/automover/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory to take files from
    #[arg(long, global = true)]
    pub source: Option<PathBuf>,

    /// Directory that receives the category folders
    #[arg(long, global = true)]
    pub destination: Option<PathBuf>,

    /// SQLite database for the move history
    #[arg(long, global = true)]
    pub history_db: Option<PathBuf>,

    /// Show what would be moved without touching anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Print the result as JSON instead of a table
    #[arg(long, global = true)]
    pub json: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Move files from the source into category folders (default)
    Organize,
    /// Show the most recent recorded moves
    History {
        /// Number of entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
}

/// Knobs for a single organize run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Plan only: no folders, no moves, no history.
    pub dry_run: bool,
    /// No per-file lines or progress bar.
    pub quiet: bool,
}

/// Entry point used by `main`. Loads configuration, sets up logging and
/// dispatches the subcommand.
pub fn run_cli(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    logging::init(&config.logging.level, cli.verbose);

    let overrides = Overrides {
        source_dir: cli.source,
        destination_dir: cli.destination,
        history_db: cli.history_db,
    };

    match cli.command.unwrap_or(Command::Organize) {
        Command::Organize => {
            let settings = config.into_settings(overrides)?;
            let options = RunOptions {
                dry_run: cli.dry_run,
                quiet: cli.json,
            };
            let summary = organize_directory(&settings, options)?;

            if cli.json {
                print_json(&summary);
            } else {
                OutputFormatter::summary_report(&summary);
            }
            Ok(())
        }
        Command::History { limit } => {
            let path = config.history_db_path(&overrides)?;
            let entries = show_history(&path, limit)?;

            if cli.json {
                print_json(&entries);
            } else {
                OutputFormatter::history_table(&entries);
            }
            Ok(())
        }
    }
}

/// Runs the pipeline against the SQLite history configured in `settings`.
///
/// The database is only opened once there is something to record, so a run
/// that aborts early leaves no trace.
pub fn organize_directory(settings: &RunSettings, options: RunOptions) -> Result<RunSummary> {
    organize_with_store(settings, options, || SqliteHistory::open(&settings.history_db))
}

/// Runs the pipeline with a caller-supplied history store.
///
/// # Errors
///
/// Only fatal problems are errors: bad configuration, a missing or unreadable
/// source directory, or a category folder that cannot be created. Per-file and
/// per-record problems end up in the returned [`RunSummary`].
pub fn organize_with_store<S, F>(
    settings: &RunSettings,
    options: RunOptions,
    open_store: F,
) -> Result<RunSummary>
where
    S: HistoryStore,
    F: FnOnce() -> history::Result<S>,
{
    let filters = CompiledFilters::new(&settings.filters)?;
    let mapping = ExtensionClassifier::classify(&settings.categories)?;

    if !settings.source_dir.is_dir() {
        return Err(AppError::SourceMissing {
            path: settings.source_dir.clone(),
        });
    }

    let mut summary = RunSummary::new(options.dry_run);
    if !options.dry_run {
        summary.created_folders =
            DestinationProvisioner::provision(&settings.destination_dir, mapping.categories())?;
        if !options.quiet {
            for folder in &summary.created_folders {
                OutputFormatter::success(&format!("Created folder: {}", folder.display()));
            }
        }
    }

    let tasks = list_source_files(&settings.source_dir)?;
    info!(
        source = %settings.source_dir.display(),
        files = tasks.len(),
        dry_run = options.dry_run,
        "processing source directory"
    );

    let mover = CollisionSafeMover::new(&mapping, &settings.source_dir, &settings.destination_dir);
    let mut records = Vec::new();
    let progress = OutputFormatter::create_progress_bar(tasks.len() as u64, options.quiet);

    for task in tasks {
        progress.set_message(task.file_name.clone());

        let outcome = if !filters.should_include(&task.file_name) {
            FileOutcome::Skipped {
                file_name: task.file_name,
                reason: SkipReason::Excluded,
            }
        } else if options.dry_run {
            mover.plan(task)
        } else {
            mover.process(task)
        };

        if !options.quiet {
            progress.suspend(|| println!("{}", OutputFormatter::outcome_line(&outcome)));
        }
        summary.observe(&outcome);
        if let FileOutcome::Moved(record) = outcome {
            records.push(record);
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    if !records.is_empty() {
        let report = match open_store() {
            Ok(mut store) => {
                let mut recorder = MoveHistoryRecorder::new(&mut store);
                recorder.record_all(&records)
            }
            Err(e) => {
                warn!(error = %e, "history store unavailable, moves will not be recorded");
                let mut store = UnavailableHistory::new(e.to_string());
                let mut recorder = MoveHistoryRecorder::new(&mut store);
                recorder.record_all(&records)
            }
        };
        summary.observe_history(report);
    }

    Ok(summary)
}

/// Regular files directly inside `source`, sorted by name.
pub fn list_source_files(source: &Path) -> Result<Vec<FileTask>> {
    let entries = fs::read_dir(source).map_err(|e| AppError::SourceUnreadable {
        path: source.to_path_buf(),
        source: e,
    })?;

    let mut tasks: Vec<FileTask> = entries
        .flatten()
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
        .map(|entry| FileTask::new(entry.path()))
        .collect();
    tasks.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    Ok(tasks)
}

/// Reads the newest `limit` history rows.
pub fn show_history(path: &Path, limit: usize) -> Result<Vec<history::HistoryEntry>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let store = SqliteHistory::open(path)?;
    Ok(store.recent(limit)?)
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => OutputFormatter::error(&format!("could not serialize output: {}", e)),
    }
}
