//! SQLite move history.
//!
//! Every successful move becomes one row in the append-only
//! `FileMoveHistory` table. Writes are best-effort: a failed insert is
//! logged and reported, and never affects the file that was moved.

use crate::error::HistoryError;
use crate::file_organizer::MoveRecord;
use rusqlite::{Connection, params};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

pub type Result<T> = std::result::Result<T, HistoryError>;

/// Anything that can durably store a [`MoveRecord`].
pub trait HistoryStore {
    fn insert(&mut self, record: &MoveRecord) -> Result<()>;
}

/// History stored in a SQLite database file.
pub struct SqliteHistory {
    conn: Connection,
}

/// One row read back from the history table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub created_at: String,
    pub file_name: String,
    pub file_type: String,
    pub source_path: String,
    pub destination_path: String,
}

impl SqliteHistory {
    /// Open or create the database, creating its parent folder if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                HistoryError::Unavailable(format!("{}: {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS FileMoveHistory (
                Id INTEGER PRIMARY KEY AUTOINCREMENT,
                CreateDate TEXT NOT NULL,
                FileName TEXT NOT NULL,
                FileType TEXT NOT NULL,
                SourcePath TEXT NOT NULL,
                DestinationPath TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_file_move_history_create_date
                ON FileMoveHistory(CreateDate);
            "#,
        )?;
        Ok(())
    }

    /// Newest entries first.
    pub fn recent(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT Id, CreateDate, FileName, FileType, SourcePath, DestinationPath
            FROM FileMoveHistory
            ORDER BY Id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(HistoryEntry {
                id: row.get(0)?,
                created_at: row.get(1)?,
                file_name: row.get(2)?,
                file_type: row.get(3)?,
                source_path: row.get(4)?,
                destination_path: row.get(5)?,
            })
        })?;

        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    #[cfg(test)]
    pub fn count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM FileMoveHistory", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl HistoryStore for SqliteHistory {
    fn insert(&mut self, record: &MoveRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO FileMoveHistory (CreateDate, FileName, FileType, SourcePath, DestinationPath)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.created_at.to_rfc3339(),
                record.file_name,
                record.category,
                record.source_dir.to_string_lossy().to_string(),
                record.destination.to_string_lossy().to_string(),
            ],
        )?;
        Ok(())
    }
}

/// Stand-in used when the real store could not be opened, so every record
/// still shows up as a history failure.
pub struct UnavailableHistory {
    reason: String,
}

impl UnavailableHistory {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl HistoryStore for UnavailableHistory {
    fn insert(&mut self, _record: &MoveRecord) -> Result<()> {
        Err(HistoryError::Unavailable(self.reason.clone()))
    }
}

/// A record that could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryFailure {
    pub file_name: String,
    pub reason: String,
}

/// Outcome of writing a run's records.
#[derive(Debug, Default)]
pub struct HistoryReport {
    pub written: usize,
    pub failures: Vec<HistoryFailure>,
}

/// Writes move records to a [`HistoryStore`], one independent insert each.
pub struct MoveHistoryRecorder<'a> {
    store: &'a mut dyn HistoryStore,
}

impl<'a> MoveHistoryRecorder<'a> {
    pub fn new(store: &'a mut dyn HistoryStore) -> Self {
        Self { store }
    }

    /// Attempts every record even after failures.
    pub fn record_all(&mut self, records: &[MoveRecord]) -> HistoryReport {
        let mut report = HistoryReport::default();

        for record in records {
            match self.store.insert(record) {
                Ok(()) => {
                    debug!(file = %record.file_name, "history recorded");
                    report.written += 1;
                }
                Err(e) => {
                    warn!(file = %record.file_name, error = %e, "could not record move history");
                    report.failures.push(HistoryFailure {
                        file_name: record.file_name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report
    }
}
