//! Terminal output for the command-line front end.
//!
//! Status lines are colored, long classifications show a spinner and
//! organize runs end with a per-folder summary table. Library code logs
//! through `log` instead and never calls into this module.

use crate::action::Action;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use dirsort::output::OutputFormatter;
    /// OutputFormatter::success("12 files organized");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message to stderr in red.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Starts a spinner with `message`; finish it with `finish_and_clear`.
    pub fn spinner(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("Invalid spinner template"),
        );
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }

    /// One line per action: `source → destination` in dim/normal text.
    pub fn action_line(action: &Action) {
        println!(
            "  {} {}",
            format!("[{}]", action.timestamp.format("%Y-%m-%d %H:%M:%S")).dimmed(),
            action.describe()
        );
    }

    /// `source → destination` for a planned or performed move.
    pub fn move_line(source: &Path, destination: &Path) {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let folder = destination
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        println!("  {} → {}/", name, folder.cyan());
    }

    /// Table of file counts per destination folder.
    pub fn summary_table(folder_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let width = folder_counts
            .keys()
            .map(|name| name.chars().count())
            .max()
            .unwrap_or(0)
            .max("Folder".len());

        println!("{:<width$} | {}", "Folder".bold(), "Files".bold(), width = width);
        println!("{}", "-".repeat(width + 10));
        for (folder, count) in folder_counts {
            println!(
                "{:<width$} | {} {}",
                folder,
                count.to_string().green(),
                plural(*count),
                width = width
            );
        }
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files),
            width = width
        );
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}
