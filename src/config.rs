//! Configuration loading and file exclusion rules.
//!
//! Configuration is read once, merged with command-line overrides and handed
//! to the pipeline as a plain [`RunSettings`] value.
//!
//! # Configuration File Format
//!
//! ```toml
//! source_dir = "/home/me/Downloads"
//! destination_dir = "/home/me/Sorted"
//! history_db = "/home/me/Sorted/.automover_history.db"
//!
//! [logging]
//! level = "info"
//!
//! [[categories]]
//! name = "Documents"
//! extensions = ".doc,.docx"
//!
//! [[categories]]
//! name = "Images"
//! extensions = ".jpg,.jpeg,.png"
//!
//! [filters]
//! skip_hidden = true
//!
//! [filters.exclude]
//! filenames = ["desktop.ini"]
//! patterns = ["*.part"]
//! regex = ["^~\\$"]
//! ```

use crate::error::ConfigError;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the history database when none is configured. Lives in the
/// destination root.
pub const DEFAULT_HISTORY_FILE: &str = ".automover_history.db";

/// Name of the configuration file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "automover.toml";

/// Categories used when the configuration lists none.
const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Documents", ".doc,.docx"),
    ("Pdf Files", ".pdf"),
    ("Excel Files", ".xls,.xlsx"),
    ("Csv Files", ".csv"),
    ("Txt Files", ".txt"),
    ("Images", ".jpg,.jpeg,.png,.gif,.bmp"),
];

/// On-disk configuration. Every field is optional; missing paths can be
/// supplied on the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source_dir: Option<PathBuf>,
    pub destination_dir: Option<PathBuf>,
    /// SQLite database holding the move history.
    pub history_db: Option<PathBuf>,
    pub categories: Vec<CategoryConfig>,
    pub logging: LoggingConfig,
    pub filters: FilterRules,
}

/// One category and its comma-separated extension list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub extensions: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. "info" or "automover=debug".
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Rules for leaving files in the source directory untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    /// Leave files starting with "." alone.
    pub skip_hidden: bool,
    pub exclude: ExcludeRules,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeRules {
    /// Exact file names (e.g. "desktop.ini").
    pub filenames: Vec<String>,
    /// Glob patterns matched against the file name (e.g. "*.part").
    pub patterns: Vec<String>,
    /// Regular expressions matched against the file name.
    pub regex: Vec<String>,
}

/// Values given on the command line, which win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub source_dir: Option<PathBuf>,
    pub destination_dir: Option<PathBuf>,
    pub history_db: Option<PathBuf>,
}

/// Everything one run needs, fully resolved.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub source_dir: PathBuf,
    pub destination_dir: PathBuf,
    pub history_db: PathBuf,
    /// `(category, "ext,ext")` pairs in configuration order.
    pub categories: Vec<(String, String)>,
    pub filters: FilterRules,
}

impl AppConfig {
    /// Load configuration, falling back to defaults.
    ///
    /// Lookup order:
    /// 1. `config_path`, if given (must exist)
    /// 2. `automover.toml` in the current directory
    /// 3. `~/.config/automover/config.toml`
    /// 4. built-in defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("automover")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// History database location without requiring a source directory.
    pub fn history_db_path(&self, overrides: &Overrides) -> Result<PathBuf, ConfigError> {
        if let Some(path) = overrides.history_db.clone().or_else(|| self.history_db.clone()) {
            return absolute(path, "history_db");
        }
        let destination = overrides
            .destination_dir
            .clone()
            .or_else(|| self.destination_dir.clone())
            .ok_or(ConfigError::MissingSetting("destination_dir"))?;
        Ok(absolute(destination, "destination_dir")?.join(DEFAULT_HISTORY_FILE))
    }

    /// Merge command-line overrides and resolve every path to an absolute one.
    ///
    /// # Errors
    ///
    /// `ConfigError::MissingSetting` when no source or destination is known.
    pub fn into_settings(self, overrides: Overrides) -> Result<RunSettings, ConfigError> {
        let source_dir = overrides
            .source_dir
            .or(self.source_dir)
            .ok_or(ConfigError::MissingSetting("source_dir"))?;
        let destination_dir = overrides
            .destination_dir
            .or(self.destination_dir)
            .ok_or(ConfigError::MissingSetting("destination_dir"))?;

        let source_dir = absolute(source_dir, "source_dir")?;
        let destination_dir = absolute(destination_dir, "destination_dir")?;
        let history_db = match overrides.history_db.or(self.history_db) {
            Some(path) => absolute(path, "history_db")?,
            None => destination_dir.join(DEFAULT_HISTORY_FILE),
        };

        let categories = if self.categories.is_empty() {
            default_categories()
        } else {
            self.categories
                .into_iter()
                .map(|c| (c.name, c.extensions))
                .collect()
        };

        Ok(RunSettings {
            source_dir,
            destination_dir,
            history_db,
            categories,
            filters: self.filters,
        })
    }
}

/// Built-in category table.
pub fn default_categories() -> Vec<(String, String)> {
    DEFAULT_CATEGORIES
        .iter()
        .map(|(name, exts)| (name.to_string(), exts.to_string()))
        .collect()
}

fn absolute(path: PathBuf, setting: &'static str) -> Result<PathBuf, ConfigError> {
    if path.as_os_str().is_empty() {
        return Err(ConfigError::MissingSetting(setting));
    }
    std::path::absolute(&path).map_err(|source| ConfigError::Io { path, source })
}

/// Filter rules with every pattern compiled.
#[derive(Debug)]
pub struct CompiledFilters {
    skip_hidden: bool,
    filenames: HashSet<String>,
    patterns: Vec<Pattern>,
    regexes: Vec<Regex>,
}

impl CompiledFilters {
    /// # Errors
    ///
    /// Returns an error naming the first invalid glob or regex pattern.
    pub fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let patterns = rules
            .exclude
            .patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|e| ConfigError::InvalidGlobPattern {
                    pattern: pattern.clone(),
                    reason: e.msg.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            skip_hidden: rules.skip_hidden,
            filenames: rules.exclude.filenames.iter().cloned().collect(),
            patterns,
            regexes,
        })
    }

    /// `false` if any rule excludes this file name.
    pub fn should_include(&self, file_name: &str) -> bool {
        if self.skip_hidden && file_name.starts_with('.') {
            return false;
        }
        if self.filenames.contains(file_name) {
            return false;
        }
        if self.patterns.iter().any(|p| p.matches(file_name)) {
            return false;
        }
        !self.regexes.iter().any(|r| r.is_match(file_name))
    }
}
