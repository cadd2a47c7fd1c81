//! dirsort - reversible folder organization
//!
//! This library sorts the top level of a folder by file type, creation year
//! or name similarity, records every move so a whole run can be undone and
//! redone later, keeps a bounded per-action undo/redo history for direct file
//! operations, and re-runs the classifiers on watched folders at a daily,
//! weekly or monthly pace.

pub mod action;
pub mod batch_log;
pub mod classifier;
pub mod cli;
pub mod collaborators;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod file_category;
pub mod file_organizer;
pub mod history;
pub mod name_grouping;
pub mod operations;
pub mod output;
pub mod scheduler;
pub mod undo;

pub use action::{Action, ActionKind, ByteBackup, OrganizationBatch};
pub use batch_log::{BatchLog, BatchRedoReport, BatchUndoReport};
pub use classifier::{ClassifyOptions, ClassifyReport, Classifier, OrganizeMode};
pub use collaborators::{
    CreationDateSource, FixedCreationDate, FsCreationDate, KeywordExtractor, PlainTextKeywords,
};
pub use config::{CompiledFilters, ConfigError, EngineConfig};
pub use engine::EngineState;
pub use error::{EngineError, EngineResult};
pub use file_category::CategoryTable;
pub use history::{ExportFormat, HistoryLog};
pub use scheduler::{Frequency, Scheduler, WatchPreferences, WatchedFolderConfig};
pub use undo::UndoRedoStack;
