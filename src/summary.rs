//! End-of-run tallies.

use crate::file_organizer::{FileOutcome, SkipReason};
use crate::history::HistoryReport;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A skipped file and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub file_name: String,
    pub reason: SkipReason,
}

/// A file or record that failed, with the error text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub file_name: String,
    pub reason: String,
}

/// Outcome counts for one run. Built incrementally, printed, then dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// `true` when nothing was actually moved.
    pub dry_run: bool,
    /// Category folders this run had to create.
    pub created_folders: Vec<PathBuf>,
    /// Files moved (or planned, on a dry run) per category.
    pub moved: BTreeMap<String, usize>,
    pub skipped: Vec<SkippedFile>,
    pub failed: Vec<FailedFile>,
    pub history_written: usize,
    pub history_failures: Vec<FailedFile>,
}

impl RunSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            ..Default::default()
        }
    }

    pub fn observe(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Moved(record) => self.count(&record.category),
            FileOutcome::Planned { category, .. } => self.count(category),
            FileOutcome::Skipped { file_name, reason } => self.skipped.push(SkippedFile {
                file_name: file_name.clone(),
                reason: reason.clone(),
            }),
            FileOutcome::Failed { file_name, error } => self.failed.push(FailedFile {
                file_name: file_name.clone(),
                reason: error.to_string(),
            }),
        }
    }

    pub fn observe_history(&mut self, report: HistoryReport) {
        self.history_written += report.written;
        self.history_failures
            .extend(report.failures.into_iter().map(|f| FailedFile {
                file_name: f.file_name,
                reason: f.reason,
            }));
    }

    fn count(&mut self, category: &str) {
        *self.moved.entry(category.to_string()).or_insert(0) += 1;
    }

    pub fn total_moved(&self) -> usize {
        self.moved.values().sum()
    }

    pub fn moved_in(&self, category: &str) -> usize {
        self.moved.get(category).copied().unwrap_or(0)
    }

    /// No move or history write failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.history_failures.is_empty()
    }
}
