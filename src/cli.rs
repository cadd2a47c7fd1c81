//! Command-line interface for dirsort.
//!
//! Parses arguments with `clap`, opens the engine with the loaded
//! configuration and renders reports through [`OutputFormatter`].

use crate::batch_log::{BatchRedoReport, BatchUndoReport};
use crate::classifier::{ClassifyOptions, ClassifyReport, OrganizeMode};
use crate::collaborators::{KeywordExtractor, PlainTextKeywords};
use crate::config::EngineConfig;
use crate::engine::EngineState;
use crate::history::ExportFormat;
use crate::output::OutputFormatter;
use crate::scheduler::{FolderOutcome, Scheduler, WatchPreferences};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

/// Organize folders by type, date or name, with undo.
#[derive(Parser, Debug)]
#[command(name = "dirsort", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Organize the top level of a folder
    Organize {
        folder: PathBuf,

        #[arg(short, long, value_enum, default_value_t = OrganizeMode::Type)]
        mode: OrganizeMode,

        /// Show what would move without touching anything
        #[arg(long)]
        dry_run: bool,

        /// Only consider the first N files
        #[arg(long)]
        limit: Option<usize>,

        /// Smallest group for name mode (defaults to the configured value)
        #[arg(long)]
        min_group: Option<usize>,
    },

    /// Reverse every logged organization batch
    UndoBatch,

    /// Replay the most recently undone batch
    RedoBatch,

    /// Organize watched folders periodically
    Watch {
        /// Preferences JSON (defaults to <data_dir>/preferences.json)
        #[arg(long)]
        preferences: Option<PathBuf>,
    },

    /// Move a file or directory
    Mv { source: PathBuf, destination: PathBuf },

    /// Copy a file or directory
    Cp { source: PathBuf, destination: PathBuf },

    /// Rename a file or directory in place
    Rename { path: PathBuf, new_name: String },

    /// Move a file or directory to the trash
    Rm { path: PathBuf },

    /// Create an empty file
    Touch { path: PathBuf },

    /// Create a directory
    Mkdir { path: PathBuf },

    /// Undo the last recorded operation
    Undo,

    /// Redo the last undone operation
    Redo,

    /// Inspect and maintain the operation history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Print the most frequent words of a text file
    Keywords { file: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// List recorded operations, oldest first
    List {
        /// Only show the newest N entries
        #[arg(long)]
        last: Option<usize>,
    },

    /// Drop entries older than the retention window
    Prune {
        #[arg(long)]
        days: Option<i64>,
    },

    /// Remove every entry and forget undo/redo state
    Clear,

    /// Write the history to a file
    Export {
        #[arg(long, value_enum)]
        format: ExportFormat,

        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Runs one parsed command.
pub fn run_cli(cli: Cli) -> Result<(), String> {
    let config = EngineConfig::load(cli.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;

    if let Commands::Keywords { file } = &cli.command {
        return show_keywords(file);
    }

    let mut engine =
        EngineState::open(config).map_err(|e| format!("Error opening engine: {}", e))?;

    match cli.command {
        Commands::Organize {
            folder,
            mode,
            dry_run,
            limit,
            min_group,
        } => {
            let options = ClassifyOptions {
                simulate: dry_run,
                limit,
                min_group_size: min_group.unwrap_or(engine.config().engine.min_group_size),
            };
            organize(&mut engine, &folder, mode, &options)
        }
        Commands::UndoBatch => {
            let report = engine.undo_last_batch().map_err(|e| e.to_string())?;
            print_undo_report(&report);
            Ok(())
        }
        Commands::RedoBatch => {
            let report = engine.redo_last_undo().map_err(|e| e.to_string())?;
            print_redo_report(&report);
            Ok(())
        }
        Commands::Watch { preferences } => watch(&mut engine, preferences),
        Commands::Mv {
            source,
            destination,
        } => report_action(engine.move_path(&source, &destination)),
        Commands::Cp {
            source,
            destination,
        } => report_action(engine.copy_path(&source, &destination)),
        Commands::Rename { path, new_name } => report_action(engine.rename_path(&path, &new_name)),
        Commands::Rm { path } => report_action(engine.delete_path(&path)),
        Commands::Touch { path } => report_action(engine.create_file(&path, &[])),
        Commands::Mkdir { path } => report_action(engine.create_dir(&path)),
        Commands::Undo => {
            let action = engine.undo().map_err(|e| format!("Undo failed: {}", e))?;
            OutputFormatter::success(&format!("Undone: {}", action.describe()));
            Ok(())
        }
        Commands::Redo => {
            let action = engine.redo().map_err(|e| format!("Redo failed: {}", e))?;
            OutputFormatter::success(&format!("Redone: {}", action.describe()));
            Ok(())
        }
        Commands::History { action } => history(&mut engine, action),
        Commands::Keywords { .. } => Ok(()),
    }
}

fn organize(
    engine: &mut EngineState,
    folder: &Path,
    mode: OrganizeMode,
    options: &ClassifyOptions,
) -> Result<(), String> {
    let spinner = OutputFormatter::spinner(&format!(
        "Organizing {} by {}...",
        folder.display(),
        mode
    ));
    let result = engine.classify(folder, mode, options);
    spinner.finish_and_clear();

    let report = result.map_err(|e| format!("Error organizing {}: {}", folder.display(), e))?;
    print_classify_report(&report, options.simulate);
    Ok(())
}

fn print_classify_report(report: &ClassifyReport, simulate: bool) {
    if simulate {
        OutputFormatter::dry_run_notice("Files would be organized as follows:");
        for planned in &report.planned {
            OutputFormatter::move_line(&planned.source, &planned.destination);
        }
    } else {
        for action in &report.batch.actions {
            OutputFormatter::move_line(&action.source, &action.destination);
        }
    }

    let counts = report.destination_counts();
    if !counts.is_empty() {
        let total = counts.values().sum();
        OutputFormatter::summary_table(&counts, total);
    }

    if report.skipped > 0 {
        OutputFormatter::info(&format!("{} files left in place (no group)", report.skipped));
    }
    for failure in &report.failed {
        OutputFormatter::error(&format!("{}: {}", failure.path.display(), failure.reason));
    }

    if simulate {
        OutputFormatter::dry_run_notice("No files were modified.");
    } else if report.processed == 0 {
        OutputFormatter::info("Nothing to organize.");
    } else {
        OutputFormatter::success(&format!(
            "{} of {} files organized. Use 'dirsort undo-batch' to revert.",
            report.processed, report.scanned
        ));
    }
}

fn print_undo_report(report: &BatchUndoReport) {
    OutputFormatter::success(&format!(
        "Undid {} batches, {} files restored",
        report.batches, report.restored_files
    ));
    for backup in &report.backups {
        OutputFormatter::warning(&format!("Existing file kept as {}", backup.display()));
    }
    print_problems(&report.skipped_files, &report.failed_restores, report.corrupt_lines);
}

fn print_redo_report(report: &BatchRedoReport) {
    OutputFormatter::success(&format!("{} files moved again", report.replayed_files));
    print_problems(&report.skipped_files, &report.failed_moves, report.corrupt_lines);
}

fn print_problems(skipped: &[(PathBuf, String)], failed: &[(PathBuf, String)], corrupt: usize) {
    if !skipped.is_empty() {
        OutputFormatter::warning(&format!("Skipped: {}", skipped.len()));
        for (path, reason) in skipped {
            OutputFormatter::plain(&format!("    - {}: {}", path.display(), reason));
        }
    }
    if !failed.is_empty() {
        OutputFormatter::error(&format!("Failed: {}", failed.len()));
        for (path, reason) in failed {
            OutputFormatter::plain(&format!("    - {}: {}", path.display(), reason));
        }
    }
    if corrupt > 0 {
        OutputFormatter::warning(&format!("{} corrupt log lines ignored", corrupt));
    }
}

fn watch(engine: &mut EngineState, preferences: Option<PathBuf>) -> Result<(), String> {
    let path = preferences.unwrap_or_else(|| engine.config().preferences_path());
    let prefs = WatchPreferences::load(&path).map_err(|e| e.to_string())?;
    if prefs.folders.is_empty() {
        OutputFormatter::warning("No watched folders configured.");
        return Ok(());
    }

    let mut scheduler = Scheduler::new(prefs, engine.config().poll_interval());
    OutputFormatter::info(&format!(
        "Watching {} folders. Press Ctrl+C to stop.",
        scheduler.folders().len()
    ));

    let stop = AtomicBool::new(false);
    scheduler.run(engine, &stop, print_folder_outcome);
    Ok(())
}

fn print_folder_outcome(folder: &Path, outcome: &FolderOutcome) {
    match outcome {
        FolderOutcome::Organized { processed, failed } => OutputFormatter::success(&format!(
            "{}: {} organized, {} failed",
            folder.display(),
            processed,
            failed
        )),
        FolderOutcome::NotDue => {}
        FolderOutcome::NotADirectory => OutputFormatter::warning(&format!(
            "{}: not a directory, skipped",
            folder.display()
        )),
        FolderOutcome::Failed(reason) => {
            OutputFormatter::error(&format!("{}: {}", folder.display(), reason))
        }
    }
}

fn report_action(result: crate::error::EngineResult<crate::action::Action>) -> Result<(), String> {
    let action = result.map_err(|e| e.to_string())?;
    OutputFormatter::success(&action.describe());
    Ok(())
}

fn history(engine: &mut EngineState, action: HistoryAction) -> Result<(), String> {
    match action {
        HistoryAction::List { last } => {
            let entries = match last {
                Some(count) => engine.history().tail(count),
                None => engine.history().entries(),
            };
            if entries.is_empty() {
                OutputFormatter::info("History is empty.");
            }
            for entry in entries {
                OutputFormatter::action_line(entry);
            }
            Ok(())
        }
        HistoryAction::Prune { days } => {
            let removed = engine
                .prune_history(days, Local::now())
                .map_err(|e| e.to_string())?;
            OutputFormatter::success(&format!("{} entries removed", removed));
            Ok(())
        }
        HistoryAction::Clear => {
            engine.clear_history().map_err(|e| e.to_string())?;
            OutputFormatter::success("History cleared");
            Ok(())
        }
        HistoryAction::Export { format, output } => {
            let count = engine
                .export_history(format, &output)
                .map_err(|e| e.to_string())?;
            OutputFormatter::success(&format!(
                "{} entries exported to {}",
                count,
                output.display()
            ));
            Ok(())
        }
    }
}

fn show_keywords(file: &Path) -> Result<(), String> {
    let keywords = PlainTextKeywords::new()
        .extract_keywords(file)
        .map_err(|e| e.to_string())?;
    if keywords.is_empty() {
        OutputFormatter::info("No keywords found.");
    } else {
        OutputFormatter::plain(&keywords.join(", "));
    }
    Ok(())
}
