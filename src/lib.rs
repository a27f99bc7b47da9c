//! automover - move files into category folders by extension
//!
//! This library classifies the files of one source directory by extension,
//! moves them into per-category folders under a destination root without
//! overwriting anything, and records each move in a SQLite history table.

pub mod cli;
pub mod config;
pub mod error;
pub mod file_category;
pub mod file_organizer;
pub mod history;
pub mod logging;
pub mod output;
pub mod summary;

pub use cli::{Cli, RunOptions, organize_directory, organize_with_store, run_cli};
pub use config::{AppConfig, RunSettings};
pub use error::{AppError, ConfigError, HistoryError, MoveError};
pub use file_category::{CategoryMapping, ExtensionClassifier, FileTask};
pub use file_organizer::{CollisionSafeMover, DestinationProvisioner, FileOutcome, MoveRecord};
pub use history::{HistoryStore, MoveHistoryRecorder, SqliteHistory};
pub use summary::RunSummary;
