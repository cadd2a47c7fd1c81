//! Error taxonomy shared by the classifiers, the logs and the undo machinery.

use crate::config::ConfigError;
use std::path::PathBuf;

/// Errors that can occur while organizing, logging or reversing file operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A path the operation depends on does not exist.
    #[error("Path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    /// No free `name_(n).ext` variant was found within the attempt budget.
    #[error("No free destination name for {} after {attempts} attempts", path.display())]
    ConflictExhausted { path: PathBuf, attempts: u32 },

    /// A single move attempt failed; the caller may retry.
    #[error("Transient failure moving {} to {}: {source}", from.display(), to.display())]
    TransientIo {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// A move failed on every attempt allowed by the retry policy.
    #[error("Failed to move {} to {} after {attempts} attempts: {source}", from.display(), to.display())]
    PermanentIo {
        from: PathBuf,
        to: PathBuf,
        attempts: u32,
        source: std::io::Error,
    },

    /// The watched-folder preferences file is absent.
    #[error("Configuration not found: {}", .0.display())]
    ConfigMissing(PathBuf),

    /// A configuration document could not be parsed.
    #[error("Invalid configuration {}: {reason}", path.display())]
    ConfigInvalid { path: PathBuf, reason: String },

    /// A log line or document could not be decoded.
    #[error("Corrupt log entry in {} (line {line}): {reason}", path.display())]
    LogCorrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Generic I/O failure tied to a path.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The restore target is already occupied and cannot be replaced.
    #[error("Destination already exists: {}", .0.display())]
    DestinationOccupied(PathBuf),

    /// A restore failed after the occupant of its target was moved aside and
    /// could not be put back.
    #[error("Could not restore {}, its previous occupant is at {}: {source}", path.display(), backup.display())]
    RestoreStranded {
        path: PathBuf,
        backup: PathBuf,
        source: Box<EngineError>,
    },

    /// A deleted file has neither a trash copy nor a byte backup.
    #[error("No trash copy or backup available to restore {}", .0.display())]
    MissingBackup(PathBuf),

    /// A new file name is empty or contains a path separator.
    #[error("Invalid file name: '{0}'")]
    InvalidName(String),

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Wraps an `std::io::Error` with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error only affects one file and must not abort a batch.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Self::PathNotFound(_)
                | Self::ConflictExhausted { .. }
                | Self::TransientIo { .. }
                | Self::PermanentIo { .. }
                | Self::DestinationOccupied(_)
                | Self::RestoreStranded { .. }
                | Self::Io { .. }
        )
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
