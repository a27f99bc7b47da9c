//! Moving files into their category folders.
//!
//! [`DestinationProvisioner`] creates the category folders up front, and
//! [`CollisionSafeMover`] moves each file into its folder without ever
//! overwriting something already there.

use crate::error::{AppError, MoveError};
use crate::file_category::{CategoryMapping, FileTask};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Upper bound on destination names tried for one file.
pub const MAX_NAME_ATTEMPTS: usize = 100;

/// Format of the timestamp inserted into a colliding file name.
pub const COLLISION_STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// One completed move.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveRecord {
    /// File name as it was in the source directory.
    pub file_name: String,
    /// Category the file was filed under.
    pub category: String,
    /// Directory the file was moved out of.
    pub source_dir: PathBuf,
    /// Absolute path the file now lives at.
    pub destination: PathBuf,
    /// When the move completed.
    pub created_at: DateTime<Local>,
}

/// Why a file was left where it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// No category claims the file's extension.
    UnmappedExtension { extension: Option<String> },
    /// Matched an exclusion filter.
    Excluded,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnmappedExtension {
                extension: Some(ext),
            } => write!(f, "unmapped extension {}", ext),
            SkipReason::UnmappedExtension { extension: None } => {
                write!(f, "unmapped extension (file has no extension)")
            }
            SkipReason::Excluded => write!(f, "excluded by filter"),
        }
    }
}

/// Result of processing one [`FileTask`].
#[derive(Debug)]
pub enum FileOutcome {
    Moved(MoveRecord),
    /// Dry run: where the file would have gone.
    Planned {
        file_name: String,
        category: String,
        destination: PathBuf,
    },
    Skipped {
        file_name: String,
        reason: SkipReason,
    },
    Failed {
        file_name: String,
        error: MoveError,
    },
}

/// Creates the per-category folders under the destination root.
pub struct DestinationProvisioner;

impl DestinationProvisioner {
    /// Ensures `<root>/<category>` exists for every category and returns the
    /// folders that had to be created.
    ///
    /// Safe to call repeatedly; existing folders are left alone.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Provisioning` for the first folder that cannot be
    /// created, including when a regular file already sits at that path.
    pub fn provision<'a>(
        root: &Path,
        categories: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<PathBuf>, AppError> {
        let mut created = Vec::new();

        for category in categories {
            let path = root.join(category);
            if path.is_dir() {
                continue;
            }

            let result = if path.exists() {
                Err(io::Error::new(
                    ErrorKind::AlreadyExists,
                    "path exists and is not a directory",
                ))
            } else {
                fs::create_dir_all(&path)
            };

            result.map_err(|source| AppError::Provisioning {
                category: category.to_string(),
                path: path.clone(),
                source,
            })?;

            info!(category, path = %path.display(), "created category folder");
            created.push(path);
        }

        Ok(created)
    }
}

/// Moves classified files into `<destination>/<category>/`.
///
/// The collision check runs against the live file system right before each
/// move. A taken name gets `_<YYYYMMDDHHMMSS>` inserted before the extension,
/// and if that is taken too, a counter is appended (`_<stamp>_1`, `_<stamp>_2`).
pub struct CollisionSafeMover<'a> {
    mapping: &'a CategoryMapping,
    source_dir: PathBuf,
    destination_root: PathBuf,
}

impl<'a> CollisionSafeMover<'a> {
    pub fn new(mapping: &'a CategoryMapping, source_dir: &Path, destination_root: &Path) -> Self {
        Self {
            mapping,
            source_dir: source_dir.to_path_buf(),
            destination_root: destination_root.to_path_buf(),
        }
    }

    /// Classifies and moves one file.
    ///
    /// Never panics or aborts on a bad file: every problem comes back as a
    /// `Skipped` or `Failed` outcome.
    pub fn process(&self, mut task: FileTask) -> FileOutcome {
        let Some(category) = self.categorize(&mut task) else {
            return Self::unmapped(task);
        };

        match self.move_into(&task, &category) {
            Ok(destination) => {
                info!(
                    file = %task.file_name,
                    category = %category,
                    destination = %destination.display(),
                    "moved file"
                );
                FileOutcome::Moved(MoveRecord {
                    file_name: task.file_name,
                    category,
                    source_dir: self.source_dir.clone(),
                    destination,
                    created_at: Local::now(),
                })
            }
            Err(error) => {
                warn!(file = %task.file_name, %error, "move failed");
                FileOutcome::Failed {
                    file_name: task.file_name,
                    error,
                }
            }
        }
    }

    /// Classifies one file and works out its destination without touching
    /// anything.
    pub fn plan(&self, mut task: FileTask) -> FileOutcome {
        let Some(category) = self.categorize(&mut task) else {
            return Self::unmapped(task);
        };

        let dir = self.destination_root.join(&category);
        let mut stamp = None;
        let free = (0..MAX_NAME_ATTEMPTS)
            .map(|attempt| dir.join(candidate_name(&task.name, attempt, &mut stamp)))
            .find(|candidate| !is_occupied(candidate));

        match free {
            Some(destination) => FileOutcome::Planned {
                file_name: task.file_name,
                category,
                destination,
            },
            None => FileOutcome::Failed {
                error: MoveError::NoFreeName {
                    from: task.path,
                    attempts: MAX_NAME_ATTEMPTS,
                },
                file_name: task.file_name,
            },
        }
    }

    fn categorize(&self, task: &mut FileTask) -> Option<String> {
        task.classify(self.mapping);
        task.category.clone()
    }

    fn unmapped(task: FileTask) -> FileOutcome {
        debug!(file = %task.file_name, extension = ?task.extension, "no category, skipping");
        FileOutcome::Skipped {
            file_name: task.file_name,
            reason: SkipReason::UnmappedExtension {
                extension: task.extension,
            },
        }
    }

    fn move_into(&self, task: &FileTask, category: &str) -> Result<PathBuf, MoveError> {
        let dir = self.destination_root.join(category);
        let mut stamp = None;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let target = dir.join(candidate_name(&task.name, attempt, &mut stamp));
            if is_occupied(&target) {
                debug!(target = %target.display(), "destination taken");
                continue;
            }

            match move_no_clobber(&task.path, &target) {
                Ok(()) => return Ok(target),
                // Taken between the check and the move.
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => {
                    return Err(MoveError::Io {
                        from: task.path.clone(),
                        to: target,
                        source,
                    });
                }
            }
        }

        Err(MoveError::NoFreeName {
            from: task.path.clone(),
            attempts: MAX_NAME_ATTEMPTS,
        })
    }
}

/// Name to try for the given attempt: the original name first, then the
/// timestamped variants. The stamp is captured on the first collision and
/// reused for the rest of this file's attempts.
fn candidate_name(file_name: &OsStr, attempt: usize, stamp: &mut Option<String>) -> OsString {
    if attempt == 0 {
        return file_name.to_os_string();
    }
    let stamp = stamp.get_or_insert_with(collision_stamp);
    disambiguated_name(file_name, stamp, attempt - 1)
}

fn collision_stamp() -> String {
    Local::now().format(COLLISION_STAMP_FORMAT).to_string()
}

/// `report.pdf` -> `report_<stamp>.pdf`, or `report_<stamp>_<n>.pdf` for n > 0.
///
/// Stem and extension bytes are carried over untouched.
pub fn disambiguated_name(file_name: impl AsRef<OsStr>, stamp: &str, n: usize) -> OsString {
    let file_name = file_name.as_ref();
    let path = Path::new(file_name);
    let mut name = path.file_stem().unwrap_or(file_name).to_os_string();

    name.push("_");
    name.push(stamp);
    if n > 0 {
        name.push(format!("_{}", n));
    }
    if let Some(extension) = path.extension() {
        name.push(".");
        name.push(extension);
    }
    name
}

/// Dangling symlinks count as taken.
fn is_occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Moves `from` to `to`, failing with `AlreadyExists` instead of replacing an
/// existing file.
///
/// Hard-links the file into place and unlinks the source. When a hard link is
/// not possible (another volume, unsupported file system) the content is
/// copied into a freshly created file and the source removed afterwards. On
/// any failure the new path is cleaned up so the file exists exactly once.
pub fn move_no_clobber(from: &Path, to: &Path) -> io::Result<()> {
    match fs::hard_link(from, to) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(from) {
                return Err(discard_partial(to, e));
            }
            Ok(())
        }
        Err(e) if matches!(e.kind(), ErrorKind::AlreadyExists | ErrorKind::NotFound) => Err(e),
        Err(e) => {
            debug!(error = %e, from = %from.display(), "hard link unavailable, copying");
            copy_then_delete(from, to)
        }
    }
}

fn copy_then_delete(from: &Path, to: &Path) -> io::Result<()> {
    let mut reader = File::open(from)?;
    let mut writer = OpenOptions::new().write(true).create_new(true).open(to)?;

    let copied = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all());
    drop(writer);
    if let Err(e) = copied {
        return Err(discard_partial(to, e));
    }

    if let Ok(metadata) = reader.metadata() {
        let _ = fs::set_permissions(to, metadata.permissions());
    }
    drop(reader);

    if let Err(e) = fs::remove_file(from) {
        return Err(discard_partial(to, e));
    }
    Ok(())
}

/// Removes the half-finished destination after `cause`. If that fails too, the
/// returned error says so, because the file may now exist twice.
fn discard_partial(to: &Path, cause: io::Error) -> io::Error {
    match fs::remove_file(to) {
        Ok(()) => cause,
        Err(cleanup) => {
            warn!(
                path = %to.display(),
                error = %cleanup,
                "could not remove partial destination, file may exist twice"
            );
            io::Error::new(
                cause.kind(),
                format!(
                    "{}; leftover copy at {} could not be removed: {}",
                    cause,
                    to.display(),
                    cleanup
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_category::ExtensionClassifier;
    use regex::Regex;
    use tempfile::TempDir;

    fn mapping() -> CategoryMapping {
        ExtensionClassifier::classify(&[
            ("Documents".to_string(), ".doc,.docx".to_string()),
            ("Pdf Files".to_string(), ".pdf".to_string()),
        ])
        .expect("valid table")
    }

    struct Dirs {
        _temp: TempDir,
        source: PathBuf,
        destination: PathBuf,
    }

    fn dirs() -> Dirs {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let source = temp.path().join("inbox");
        let destination = temp.path().join("sorted");
        fs::create_dir(&source).expect("Failed to create source");
        fs::create_dir(&destination).expect("Failed to create destination");
        Dirs {
            _temp: temp,
            source,
            destination,
        }
    }

    #[test]
    fn test_provision_creates_missing_folders() {
        let d = dirs();
        let created =
            DestinationProvisioner::provision(&d.destination, ["Documents", "Pdf Files"])
                .expect("provisioning failed");

        assert_eq!(created.len(), 2);
        assert!(d.destination.join("Documents").is_dir());
        assert!(d.destination.join("Pdf Files").is_dir());
    }

    #[test]
    fn test_provision_is_idempotent() {
        let d = dirs();
        DestinationProvisioner::provision(&d.destination, ["Documents"]).unwrap();
        let second = DestinationProvisioner::provision(&d.destination, ["Documents"]).unwrap();

        assert!(second.is_empty());
        let entries: Vec<_> = fs::read_dir(&d.destination).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_provision_creates_missing_root() {
        let d = dirs();
        let root = d.destination.join("nested").join("root");
        DestinationProvisioner::provision(&root, ["Documents"]).unwrap();
        assert!(root.join("Documents").is_dir());
    }

    #[test]
    fn test_provision_fails_when_file_in_the_way() {
        let d = dirs();
        fs::write(d.destination.join("Documents"), "not a folder").unwrap();

        let err = DestinationProvisioner::provision(&d.destination, ["Documents"]).unwrap_err();
        match err {
            AppError::Provisioning { category, .. } => assert_eq!(category, "Documents"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_move_preserves_content() {
        let d = dirs();
        let mapping = mapping();
        DestinationProvisioner::provision(&d.destination, mapping.categories()).unwrap();
        let file = d.source.join("notes.docx");
        fs::write(&file, b"\x00\x01binary\xffcontent").unwrap();

        let mover = CollisionSafeMover::new(&mapping, &d.source, &d.destination);
        let outcome = mover.process(FileTask::new(file.clone()));

        let FileOutcome::Moved(record) = outcome else {
            panic!("expected a move, got {outcome:?}");
        };
        assert_eq!(record.file_name, "notes.docx");
        assert_eq!(record.category, "Documents");
        assert_eq!(record.source_dir, d.source);
        assert_eq!(record.destination, d.destination.join("Documents").join("notes.docx"));
        assert!(!file.exists());
        assert_eq!(
            fs::read(&record.destination).unwrap(),
            b"\x00\x01binary\xffcontent"
        );
    }

    #[test]
    fn test_collision_gets_timestamp_suffix() {
        let d = dirs();
        let mapping = mapping();
        DestinationProvisioner::provision(&d.destination, mapping.categories()).unwrap();
        let existing = d.destination.join("Pdf Files").join("report.pdf");
        fs::write(&existing, "old report").unwrap();
        let file = d.source.join("report.pdf");
        fs::write(&file, "new report").unwrap();

        let mover = CollisionSafeMover::new(&mapping, &d.source, &d.destination);
        let FileOutcome::Moved(record) = mover.process(FileTask::new(file)) else {
            panic!("expected a move");
        };

        let name = record.destination.file_name().unwrap().to_string_lossy().to_string();
        let pattern = Regex::new(r"^report_\d{14}\.pdf$").unwrap();
        assert!(pattern.is_match(&name), "unexpected name {name}");
        assert_eq!(fs::read_to_string(&existing).unwrap(), "old report");
        assert_eq!(fs::read_to_string(&record.destination).unwrap(), "new report");
    }

    #[test]
    fn test_same_second_collisions_do_not_clobber() {
        let d = dirs();
        let mapping = mapping();
        DestinationProvisioner::provision(&d.destination, mapping.categories()).unwrap();
        let folder = d.destination.join("Pdf Files");
        fs::write(folder.join("report.pdf"), "original").unwrap();

        // Pre-occupy every timestamped name this second (and the next) could produce.
        let now = Local::now();
        for offset in 0..2 {
            let stamp = (now + chrono::Duration::seconds(offset))
                .format(COLLISION_STAMP_FORMAT)
                .to_string();
            fs::write(folder.join(disambiguated_name("report.pdf", &stamp, 0)), "taken").unwrap();
        }

        let file = d.source.join("report.pdf");
        fs::write(&file, "newest").unwrap();
        let mover = CollisionSafeMover::new(&mapping, &d.source, &d.destination);
        let FileOutcome::Moved(record) = mover.process(FileTask::new(file)) else {
            panic!("expected a move");
        };

        assert_eq!(fs::read_to_string(&record.destination).unwrap(), "newest");
        let pattern = Regex::new(r"^report_\d{14}(_\d+)?\.pdf$").unwrap();
        let name = record.destination.file_name().unwrap().to_string_lossy().to_string();
        assert!(pattern.is_match(&name), "unexpected name {name}");
        let taken = fs::read_dir(&folder)
            .unwrap()
            .flatten()
            .filter(|e| fs::read_to_string(e.path()).unwrap() == "taken")
            .count();
        assert_eq!(taken, 2);
    }

    #[test]
    fn test_unmapped_extension_is_skipped() {
        let d = dirs();
        let mapping = mapping();
        let file = d.source.join("c.unknownext");
        fs::write(&file, "data").unwrap();

        let mover = CollisionSafeMover::new(&mapping, &d.source, &d.destination);
        match mover.process(FileTask::new(file.clone())) {
            FileOutcome::Skipped { file_name, reason } => {
                assert_eq!(file_name, "c.unknownext");
                assert_eq!(
                    reason,
                    SkipReason::UnmappedExtension {
                        extension: Some(".unknownext".to_string())
                    }
                );
            }
            other => panic!("expected skip, got {other:?}"),
        }
        assert!(file.exists());
    }

    #[test]
    fn test_missing_category_folder_is_a_move_error() {
        let d = dirs();
        let mapping = mapping();
        let file = d.source.join("a.doc");
        fs::write(&file, "doc").unwrap();

        // Folders deliberately not provisioned.
        let mover = CollisionSafeMover::new(&mapping, &d.source, &d.destination);
        match mover.process(FileTask::new(file.clone())) {
            FileOutcome::Failed { file_name, error } => {
                assert_eq!(file_name, "a.doc");
                assert!(matches!(error, MoveError::Io { .. }));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(file.exists());
    }

    #[test]
    fn test_plan_touches_nothing() {
        let d = dirs();
        let mapping = mapping();
        let file = d.source.join("a.docx");
        fs::write(&file, "doc").unwrap();

        let mover = CollisionSafeMover::new(&mapping, &d.source, &d.destination);
        match mover.plan(FileTask::new(file.clone())) {
            FileOutcome::Planned {
                category,
                destination,
                ..
            } => {
                assert_eq!(category, "Documents");
                assert_eq!(destination, d.destination.join("Documents").join("a.docx"));
            }
            other => panic!("expected plan, got {other:?}"),
        }
        assert!(file.exists());
        assert!(!d.destination.join("Documents").exists());
    }

    #[test]
    fn test_move_no_clobber_refuses_existing_target() {
        let d = dirs();
        let from = d.source.join("a.txt");
        let to = d.destination.join("a.txt");
        fs::write(&from, "mine").unwrap();
        fs::write(&to, "theirs").unwrap();

        let err = move_no_clobber(&from, &to).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(fs::read_to_string(&from).unwrap(), "mine");
        assert_eq!(fs::read_to_string(&to).unwrap(), "theirs");
    }

    #[test]
    fn test_copy_then_delete_moves_content() {
        let d = dirs();
        let from = d.source.join("big.bin");
        let to = d.destination.join("big.bin");
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&from, &data).unwrap();

        copy_then_delete(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), data);
    }

    #[test]
    fn test_discard_partial_removes_destination() {
        let d = dirs();
        let to = d.destination.join("partial.pdf");
        fs::write(&to, "half").unwrap();

        let err = discard_partial(&to, io::Error::new(ErrorKind::PermissionDenied, "source locked"));
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert_eq!(err.to_string(), "source locked");
        assert!(!to.exists());
    }

    #[test]
    fn test_discard_partial_reports_leftover() {
        let d = dirs();
        // remove_file refuses directories, so cleanup fails.
        let to = d.destination.join("stuck.pdf");
        fs::create_dir(&to).unwrap();

        let err = discard_partial(&to, io::Error::new(ErrorKind::PermissionDenied, "source locked"));
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        let message = err.to_string();
        assert!(message.starts_with("source locked; leftover copy at "), "{message}");
        assert!(message.contains("stuck.pdf"), "{message}");
        assert!(to.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_is_kept_byte_for_byte() {
        use std::os::unix::ffi::OsStrExt;

        let d = dirs();
        let mapping = mapping();
        DestinationProvisioner::provision(&d.destination, mapping.categories()).unwrap();
        let name = OsStr::from_bytes(b"caf\xE9.pdf");
        let file = d.source.join(name);
        fs::write(&file, "menu").unwrap();

        let mover = CollisionSafeMover::new(&mapping, &d.source, &d.destination);
        let FileOutcome::Moved(record) = mover.process(FileTask::new(file)) else {
            panic!("expected a move");
        };

        assert_eq!(record.destination, d.destination.join("Pdf Files").join(name));
        assert_eq!(fs::read_to_string(&record.destination).unwrap(), "menu");
        assert_eq!(record.file_name, "caf\u{FFFD}.pdf");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_names_do_not_collide_with_each_other() {
        use std::os::unix::ffi::OsStrExt;

        let d = dirs();
        let mapping = mapping();
        DestinationProvisioner::provision(&d.destination, mapping.categories()).unwrap();
        let mover = CollisionSafeMover::new(&mapping, &d.source, &d.destination);

        for bytes in [&b"caf\xE9.pdf"[..], &b"caf\xE8.pdf"[..]] {
            let name = OsStr::from_bytes(bytes);
            let file = d.source.join(name);
            fs::write(&file, "menu").unwrap();
            let FileOutcome::Moved(record) = mover.process(FileTask::new(file)) else {
                panic!("expected a move");
            };
            assert_eq!(record.destination.file_name(), Some(name));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_disambiguated_name_keeps_raw_bytes() {
        use std::os::unix::ffi::OsStrExt;

        let name = disambiguated_name(OsStr::from_bytes(b"caf\xE9.pdf"), "20261018103000", 1);
        assert_eq!(name.as_bytes(), b"caf\xE9_20261018103000_1.pdf");
    }

    #[test]
    fn test_disambiguated_name() {
        assert_eq!(
            disambiguated_name("report.pdf", "20261018103000", 0),
            "report_20261018103000.pdf"
        );
        assert_eq!(
            disambiguated_name("report.PDF", "20261018103000", 2),
            "report_20261018103000_2.PDF"
        );
        assert_eq!(
            disambiguated_name("archive.tar.gz", "20261018103000", 0),
            "archive.tar_20261018103000.gz"
        );
    }
}
