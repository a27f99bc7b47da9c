//! Extension-based file categorization.
//!
//! A [`CategoryMapping`] is built once from the configured category table and
//! then only read. Extensions are stored lowercase with their leading dot, so
//! `.PDF` and `.pdf` land in the same category.
//!
//! # Examples
//!
//! ```
//! use automover::file_category::ExtensionClassifier;
//!
//! let mapping = ExtensionClassifier::classify(&[
//!     ("Documents".to_string(), ".doc,.docx".to_string()),
//!     ("Images".to_string(), ".png, .JPG".to_string()),
//! ])
//! .unwrap();
//!
//! assert_eq!(mapping.category_for(".DOCX"), Some("Documents"));
//! assert_eq!(mapping.category_for(".jpg"), Some("Images"));
//! assert_eq!(mapping.category_for(".zip"), None);
//! ```

use crate::error::ConfigError;
use std::collections::{BTreeSet, HashMap};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Immutable lookup from normalized extension to category name.
#[derive(Debug, Clone, Default)]
pub struct CategoryMapping {
    by_extension: HashMap<String, String>,
    categories: BTreeSet<String>,
}

impl CategoryMapping {
    /// Returns the category for an extension such as `.pdf`, ignoring case.
    pub fn category_for(&self, extension: &str) -> Option<&str> {
        self.by_extension
            .get(&extension.to_lowercase())
            .map(String::as_str)
    }

    /// Distinct category names, sorted.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(String::as_str)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.by_extension.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.by_extension.is_empty()
    }
}

/// Builds a [`CategoryMapping`] from `(category, "ext,ext,...")` pairs.
pub struct ExtensionClassifier;

impl ExtensionClassifier {
    /// Validates the category table and flattens it into a lookup.
    ///
    /// # Errors
    ///
    /// * `ConfigError::InvalidCategory` when a category name is not a usable
    ///   folder name, its extension list is empty, or an entry lacks the
    ///   leading dot.
    /// * `ConfigError::DuplicateExtension` when two categories claim the same
    ///   extension. Repeats inside one category are ignored.
    pub fn classify(table: &[(String, String)]) -> Result<CategoryMapping, ConfigError> {
        let mut mapping = CategoryMapping::default();

        for (category, extensions) in table {
            Self::validate_category_name(category)?;
            if extensions.trim().is_empty() {
                return Err(invalid(category, "extension list is empty"));
            }

            for raw in extensions.split(',') {
                let extension = Self::normalize_extension(category, raw)?;

                match mapping.by_extension.get(&extension) {
                    Some(existing) if existing == category => {}
                    Some(existing) => {
                        return Err(ConfigError::DuplicateExtension {
                            extension,
                            first: existing.clone(),
                            second: category.clone(),
                        });
                    }
                    None => {
                        mapping.by_extension.insert(extension, category.clone());
                    }
                }
            }
            mapping.categories.insert(category.clone());
        }

        Ok(mapping)
    }

    fn validate_category_name(category: &str) -> Result<(), ConfigError> {
        if category.trim().is_empty() {
            return Err(invalid(category, "category name is empty"));
        }
        if category == "." || category == ".." || category.contains(['/', '\\']) {
            return Err(invalid(category, "category name must be a single folder name"));
        }
        Ok(())
    }

    /// Trims and lowercases one list entry, rejecting anything that could not
    /// come back from a directory listing as an extension.
    fn normalize_extension(category: &str, raw: &str) -> Result<String, ConfigError> {
        let entry = raw.trim();
        if entry.is_empty() {
            return Err(invalid(category, "extension list has a blank entry"));
        }
        if !entry.starts_with('.') || entry.len() == 1 {
            return Err(invalid(
                category,
                &format!("extension '{}' must start with '.' followed by a name", entry),
            ));
        }
        if entry[1..].contains(['.', '/', '\\']) || entry.chars().any(char::is_whitespace) {
            return Err(invalid(
                category,
                &format!("extension '{}' is malformed", entry),
            ));
        }
        Ok(entry.to_lowercase())
    }
}

fn invalid(category: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidCategory {
        category: category.to_string(),
        reason: reason.to_string(),
    }
}

/// One file waiting to be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    /// Absolute path of the file in the source directory.
    pub path: PathBuf,
    /// File name exactly as listed in the source directory. Destination
    /// names are built from this, so non-UTF-8 names survive the move.
    pub name: OsString,
    /// `name` for display, logs and history.
    pub file_name: String,
    /// Lowercase extension with its leading dot, if the name has one.
    pub extension: Option<String>,
    /// Category resolved by [`FileTask::classify`].
    pub category: Option<String>,
}

impl FileTask {
    pub fn new(path: PathBuf) -> Self {
        let name = path.file_name().map(OsString::from).unwrap_or_default();
        let file_name = name.to_string_lossy().to_string();
        let extension = extension_of(&path);
        Self {
            path,
            name,
            file_name,
            extension,
            category: None,
        }
    }

    /// Resolves the category from the mapping. Returns `true` if one was found.
    pub fn classify(&mut self, mapping: &CategoryMapping) -> bool {
        self.category = self
            .extension
            .as_deref()
            .and_then(|ext| mapping.category_for(ext))
            .map(str::to_string);
        self.category.is_some()
    }
}

/// Extension in directory-listing form (`.pdf`), lowercased.
///
/// Dotfiles such as `.bashrc` have no extension.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}
