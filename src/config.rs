//! Engine configuration.
//!
//! Settings are read from a TOML file, looked up in this order:
//! 1. the path given on the command line,
//! 2. `.dirsortrc.toml` in the current directory,
//! 3. `~/.config/dirsort/config.toml`,
//! 4. built-in defaults.
//!
//! # Configuration File Format
//!
//! ```toml
//! [engine]
//! data_dir = "/home/me/.config/dirsort"
//! undo_capacity = 50
//! history_max_entries = 100
//! history_retention_days = 30
//! retry_delay_ms = 1000
//! min_group_size = 2
//! poll_interval_secs = 60
//! backup_max_bytes = 1048576
//!
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.part"]
//! extensions = ["crdownload"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//!
//! [[categories]]
//! name = "Documents"
//! extensions = [".pdf", ".txt"]
//! ```
//!
//! When `[[categories]]` is present it replaces the built-in extension table;
//! the order of the entries decides which category wins for a shared extension.

use crate::file_category::{CategoryRule, CategoryTable};
use crate::file_organizer::RetryPolicy;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const LOCAL_CONFIG_FILE: &str = ".dirsortrc.toml";
const APP_DIR: &str = "dirsort";

pub const BATCH_LOG_FILE: &str = "organisations.jsonl";
pub const UNDONE_LOG_FILE: &str = "undone.jsonl";
pub const HISTORY_FILE: &str = "history.json";
pub const PREFERENCES_FILE: &str = "preferences.json";
pub const TRASH_DIR: &str = "trash";

/// Errors raised while loading the configuration or compiling its filters.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid configuration in {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    #[error("IO error reading configuration {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Complete engine configuration as stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub filters: FilterRules,

    /// Replaces the built-in extension table when non-empty.
    #[serde(default)]
    pub categories: Vec<CategoryRule>,
}

/// Tunables of the `[engine]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Directory holding the logs, the history and the trash.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_undo_capacity")]
    pub undo_capacity: usize,

    #[serde(default = "default_history_max_entries")]
    pub history_max_entries: usize,

    #[serde(default = "default_history_retention_days")]
    pub history_retention_days: i64,

    /// Delay before the single retry of a failed move.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_min_group_size")]
    pub min_group_size: usize,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Files up to this size get their bytes stored with delete/create actions.
    #[serde(default = "default_backup_max_bytes")]
    pub backup_max_bytes: u64,
}

fn default_data_dir() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".config").join(APP_DIR),
        Err(_) => PathBuf::from(".dirsort"),
    }
}

fn default_undo_capacity() -> usize {
    50
}

fn default_history_max_entries() -> usize {
    100
}

fn default_history_retention_days() -> i64 {
    30
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_min_group_size() -> usize {
    2
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_backup_max_bytes() -> u64 {
    1024 * 1024
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            undo_capacity: default_undo_capacity(),
            history_max_entries: default_history_max_entries(),
            history_retention_days: default_history_retention_days(),
            retry_delay_ms: default_retry_delay_ms(),
            min_group_size: default_min_group_size(),
            poll_interval_secs: default_poll_interval_secs(),
            backup_max_bytes: default_backup_max_bytes(),
        }
    }
}

impl EngineConfig {
    /// Loads the configuration following the lookup chain described above.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but
    /// missing, or if any file found along the chain is unreadable or invalid.
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
                .join(APP_DIR)
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    /// Loads configuration from one specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Invalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Default settings with all data files under `data_dir`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.engine.data_dir = data_dir.into();
        config
    }

    /// Extension table: the configured categories, or the built-in ones.
    pub fn category_table(&self) -> CategoryTable {
        if self.categories.is_empty() {
            CategoryTable::default()
        } else {
            CategoryTable::new(self.categories.clone())
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_backoff(Duration::from_millis(self.engine.retry_delay_ms))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.engine.poll_interval_secs)
    }

    pub fn batch_log_path(&self) -> PathBuf {
        self.engine.data_dir.join(BATCH_LOG_FILE)
    }

    pub fn undone_log_path(&self) -> PathBuf {
        self.engine.data_dir.join(UNDONE_LOG_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.engine.data_dir.join(HISTORY_FILE)
    }

    pub fn preferences_path(&self) -> PathBuf {
        self.engine.data_dir.join(PREFERENCES_FILE)
    }

    pub fn trash_dir(&self) -> PathBuf {
        self.engine.data_dir.join(TRASH_DIR)
    }
}

/// Rules deciding which files the classifiers may touch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether hidden files (starting with ".") are organized too.
    #[serde(default)]
    pub enable_hidden_files: bool,

    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Whitelist, overrides every exclude rule.
    #[serde(default)]
    pub include: IncludeRules,
}

/// Rules for leaving files out of organization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames, e.g. "desktop.ini".
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns, e.g. "*.part".
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Extensions without the dot, compared case-insensitively.
    #[serde(default)]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub regex: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl FilterRules {
    /// Compiles the rules into matchers.
    ///
    /// # Errors
    ///
    /// Returns an error if any glob or regex pattern is invalid.
    pub fn compile(&self) -> Result<CompiledFilters, ConfigError> {
        let exclude_regexes = self
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

        Ok(CompiledFilters {
            enable_hidden_files: self.enable_hidden_files,
            exclude_filenames: self.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: self
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&self.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&self.include.patterns)?,
        })
    }
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

/// Pre-compiled filter rules.
#[derive(Debug, Clone, Default)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    /// Whether a file may be organized.
    ///
    /// Include patterns win outright. Otherwise the file is rejected when it
    /// is hidden (unless enabled), or matches an excluded filename, extension,
    /// glob or regex.
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(file_path))
        {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = file_path.extension()
            && self
                .exclude_extensions
                .contains(&ext.to_string_lossy().to_lowercase())
        {
            return false;
        }

        let excluded = self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(file_path))
            || self
                .exclude_regexes
                .iter()
                .any(|regex| regex.is_match(&file_name));
        !excluded
    }
}
