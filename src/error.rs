//! Error types for automover.
//!
//! Errors are split by how the pipeline reacts to them: [`AppError`] aborts
//! the whole run, while [`MoveError`] and [`HistoryError`] are scoped to a
//! single file or record and only show up in the final summary.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a run before (or instead of) moving files.
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed configuration or category/extension table.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The source directory does not exist or is not a directory.
    #[error("source directory {} does not exist", .path.display())]
    SourceMissing { path: PathBuf },

    /// The source directory exists but could not be listed.
    #[error("could not read source directory {}: {source}", .path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A category folder could not be created under the destination root.
    #[error("could not create folder for category '{category}' at {}: {source}", .path.display())]
    Provisioning {
        category: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The history store could not be read (history listing only).
    #[error(transparent)]
    History(#[from] HistoryError),
}

/// Configuration problems, reported before any file system mutation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("could not read configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(#[from] toml::de::Error),

    #[error("missing required setting '{0}'")]
    MissingSetting(&'static str),

    #[error("category '{category}': {reason}")]
    InvalidCategory { category: String, reason: String },

    #[error("extension '{extension}' is listed in both '{first}' and '{second}'")]
    DuplicateExtension {
        extension: String,
        first: String,
        second: String,
    },

    #[error("invalid glob pattern '{pattern}': {reason}")]
    InvalidGlobPattern { pattern: String, reason: String },

    #[error("invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },
}

/// A single file could not be moved. The run continues with the next file.
#[derive(Error, Debug)]
pub enum MoveError {
    #[error("failed to move {} to {}: {source}", .from.display(), .to.display())]
    Io {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no free destination name for {} after {attempts} attempts", .from.display())]
    NoFreeName { from: PathBuf, attempts: usize },
}

/// History persistence failures. Never undo a move.
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("history database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("history store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, AppError>;
