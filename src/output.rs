//! Output formatting and styling module.
//!
//! All console output goes through [`OutputFormatter`] so the pipeline itself
//! only deals in outcomes. Diagnostics go through `tracing` instead.

use crate::file_organizer::FileOutcome;
use crate::history::HistoryEntry;
use crate::summary::{FailedFile, RunSummary};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Consistent styling for status lines, progress and summary tables.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark, to stderr.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Progress bar for the move loop. Hidden when `quiet` is set.
    ///
    /// ```no_run
    /// use automover::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(10, false);
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar(total: u64, quiet: bool) -> ProgressBar {
        if quiet {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// One status line per processed file.
    pub fn outcome_line(outcome: &FileOutcome) -> String {
        match outcome {
            FileOutcome::Moved(record) => {
                let mut line = format!(
                    "{} {} → {}/",
                    "✓".green(),
                    record.file_name,
                    record.category
                );
                if let Some(renamed) = renamed_to(&record.file_name, &record.destination) {
                    line.push_str(&format!(" (renamed to {})", renamed).yellow().to_string());
                }
                line
            }
            FileOutcome::Planned {
                file_name,
                category,
                destination,
            } => {
                let mut line = format!("{} {} → {}/", "→".cyan(), file_name, category);
                if let Some(renamed) = renamed_to(file_name, destination) {
                    line.push_str(&format!(" (as {})", renamed));
                }
                line
            }
            FileOutcome::Skipped { file_name, reason } => {
                format!("{} {} skipped: {}", "⚠".yellow(), file_name, reason)
            }
            FileOutcome::Failed { file_name, error } => {
                format!("{} {}: {}", "✗".red(), file_name, error)
            }
        }
    }

    /// Per-category table followed by skipped, failed and history problems.
    pub fn summary_report(summary: &RunSummary) {
        Self::header(if summary.dry_run {
            "DRY RUN SUMMARY"
        } else {
            "MOVE SUMMARY"
        });

        let max_category_len = summary
            .moved
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(8); // At least "Category" width

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = max_category_len
        );
        println!("{}", "-".repeat(max_category_len + 10));

        for (category, count) in &summary.moved {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(*count),
                width = max_category_len
            );
        }

        let total = summary.total_moved();
        println!("{}", "-".repeat(max_category_len + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total.to_string().green().bold(),
            plural(total),
            width = max_category_len
        );

        if !summary.skipped.is_empty() {
            Self::header(&format!("Skipped ({})", summary.skipped.len()));
            for skipped in &summary.skipped {
                println!("  - {}: {}", skipped.file_name, skipped.reason);
            }
        }

        Self::failure_list("Failed", &summary.failed);
        Self::failure_list("History not recorded", &summary.history_failures);

        if summary.dry_run {
            println!();
            Self::warning("[DRY RUN] No files were moved.");
        }
    }

    fn failure_list(title: &str, failures: &[FailedFile]) {
        if failures.is_empty() {
            return;
        }
        Self::header(&format!("{} ({})", title, failures.len()).red().to_string());
        for failure in failures {
            println!("  - {}: {}", failure.file_name, failure.reason);
        }
    }

    /// Table of history rows, newest first.
    pub fn history_table(entries: &[HistoryEntry]) {
        if entries.is_empty() {
            Self::info("No moves recorded yet.");
            return;
        }
        Self::header("MOVE HISTORY");
        for entry in entries {
            println!(
                "{} {} [{}] {} → {}",
                format!("#{}", entry.id).dimmed(),
                entry.created_at,
                entry.file_type.cyan(),
                entry.file_name,
                entry.destination_path
            );
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

/// The destination file name, if it differs from the original one.
fn renamed_to(file_name: &str, destination: &Path) -> Option<String> {
    let final_name = destination.file_name()?.to_string_lossy();
    (final_name != file_name).then(|| final_name.to_string())
}
