//! The engine state: configuration, logs, stacks and classifier in one owner.
//!
//! Nothing here is global. The CLI and the scheduler receive an
//! [`EngineState`] by reference and every operation goes through it, so the
//! undo stack, the history file and the batch log always move together.

use crate::action::Action;
use crate::batch_log::{BatchLog, BatchRedoReport, BatchUndoReport};
use crate::classifier::{ClassifyOptions, ClassifyReport, Classifier, OrganizeMode};
use crate::collaborators::{CreationDateSource, FsCreationDate};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::file_organizer::ensure_dir;
use crate::history::{ExportFormat, HistoryLog};
use crate::operations::Operations;
use crate::undo::{UndoRedoStack, apply_redo, apply_undo};
use chrono::{DateTime, Local};
use std::path::Path;

pub struct EngineState {
    config: EngineConfig,
    classifier: Classifier,
    batch_log: BatchLog,
    history: HistoryLog,
    stack: UndoRedoStack,
    operations: Operations,
}

impl EngineState {
    /// Opens the engine with file-system creation dates.
    pub fn open(config: EngineConfig) -> EngineResult<Self> {
        Self::with_date_source(config, Box::new(FsCreationDate))
    }

    /// Opens the engine with a custom creation-date source.
    ///
    /// Creates the data directory if needed, loads the history and seeds the
    /// undo stack with its newest entries.
    pub fn with_date_source(
        config: EngineConfig,
        dates: Box<dyn CreationDateSource>,
    ) -> EngineResult<Self> {
        ensure_dir(&config.engine.data_dir)?;

        let classifier = Classifier::new(
            config.category_table(),
            config.filters.compile()?,
            config.retry_policy(),
            dates,
        );
        let batch_log = BatchLog::new(config.batch_log_path(), config.undone_log_path());
        let history = HistoryLog::open(config.history_path(), config.engine.history_max_entries)?;
        let stack = UndoRedoStack::seeded(config.engine.undo_capacity, history.entries());
        let operations = Operations::new(config.trash_dir(), config.engine.backup_max_bytes);

        log::debug!(
            "Engine opened in {} ({} undoable actions)",
            config.engine.data_dir.display(),
            stack.undo_len()
        );

        Ok(Self {
            config,
            classifier,
            batch_log,
            history,
            stack,
            operations,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn batch_log(&self) -> &BatchLog {
        &self.batch_log
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn stack(&self) -> &UndoRedoStack {
        &self.stack
    }

    /// Classifier options with the configured group size.
    pub fn default_options(&self) -> ClassifyOptions {
        ClassifyOptions {
            min_group_size: self.config.engine.min_group_size,
            ..Default::default()
        }
    }

    /// Runs a classifier and records its batch.
    pub fn classify(
        &mut self,
        folder: &Path,
        mode: OrganizeMode,
        options: &ClassifyOptions,
    ) -> EngineResult<ClassifyReport> {
        let report = self.classifier.classify(folder, mode, options)?;
        if !options.simulate {
            self.batch_log.append_batch(&report.batch)?;
        }
        Ok(report)
    }

    pub fn undo_last_batch(&self) -> EngineResult<BatchUndoReport> {
        self.batch_log.undo_last_batch()
    }

    pub fn redo_last_undo(&self) -> EngineResult<BatchRedoReport> {
        self.batch_log.redo_last_undo()
    }

    /// Records an action that has already been performed.
    ///
    /// The action stays undoable even if the history file cannot be written.
    pub fn record(&mut self, action: Action) {
        log::info!("{}", action.describe());
        self.stack.push(action.clone());
        if let Err(e) = self.history.append(action) {
            log::warn!("Could not update history: {}", e);
        }
    }

    pub fn move_path(&mut self, source: &Path, destination: &Path) -> EngineResult<Action> {
        let action = self.operations.move_path(source, destination)?;
        self.record(action.clone());
        Ok(action)
    }

    pub fn copy_path(&mut self, source: &Path, destination: &Path) -> EngineResult<Action> {
        let action = self.operations.copy_path(source, destination)?;
        self.record(action.clone());
        Ok(action)
    }

    pub fn rename_path(&mut self, path: &Path, new_name: &str) -> EngineResult<Action> {
        let action = self.operations.rename_path(path, new_name)?;
        self.record(action.clone());
        Ok(action)
    }

    pub fn delete_path(&mut self, path: &Path) -> EngineResult<Action> {
        let action = self.operations.delete_path(path)?;
        self.record(action.clone());
        Ok(action)
    }

    pub fn create_file(&mut self, path: &Path, contents: &[u8]) -> EngineResult<Action> {
        let action = self.operations.create_file(path, contents)?;
        self.record(action.clone());
        Ok(action)
    }

    pub fn create_dir(&mut self, path: &Path) -> EngineResult<Action> {
        let action = self.operations.create_dir(path)?;
        self.record(action.clone());
        Ok(action)
    }

    pub fn can_undo(&self) -> bool {
        self.stack.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.stack.can_redo()
    }

    /// Reverses the newest recorded action.
    ///
    /// On failure the stacks and the file system are left unchanged.
    pub fn undo(&mut self) -> EngineResult<Action> {
        let action = self.stack.undo_with(apply_undo)?;
        if let Err(e) = self.history.remove_last_if(&action) {
            log::warn!("Could not update history after undo: {}", e);
        }
        log::info!("Undone: {}", action.describe());
        Ok(action)
    }

    /// Performs the newest undone action again.
    pub fn redo(&mut self) -> EngineResult<Action> {
        let action = self.stack.redo_with(apply_redo)?;
        if let Err(e) = self.history.append(action.clone()) {
            log::warn!("Could not update history after redo: {}", e);
        }
        log::info!("Redone: {}", action.describe());
        Ok(action)
    }

    /// Drops history entries older than `days`, or the configured retention.
    pub fn prune_history(&mut self, days: Option<i64>, now: DateTime<Local>) -> EngineResult<usize> {
        let days = days.unwrap_or(self.config.engine.history_retention_days);
        self.history.prune(days, now)
    }

    /// Empties the history and both stacks.
    pub fn clear_history(&mut self) -> EngineResult<()> {
        self.stack.clear();
        self.history.clear()
    }

    pub fn export_history(&self, format: ExportFormat, output: &Path) -> EngineResult<usize> {
        self.history.export(format, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::FixedCreationDate;
    use crate::error::EngineError;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn engine(temp_dir: &TempDir) -> EngineState {
        let mut config = EngineConfig::with_data_dir(temp_dir.path().join("data"));
        config.engine.retry_delay_ms = 0;
        let date = Local.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        EngineState::with_date_source(config, Box::new(FixedCreationDate(date)))
            .expect("Failed to open engine")
    }

    #[test]
    fn test_classify_records_batch() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let folder = temp_dir.path().join("inbox");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("a.pdf"), "a").unwrap();

        let mut state = engine(&temp_dir);
        let options = state.default_options();
        state.classify(&folder, OrganizeMode::Type, &options).unwrap();

        assert_eq!(state.batch_log().batches().unwrap().len(), 1);
    }

    #[test]
    fn test_simulation_records_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let folder = temp_dir.path().join("inbox");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("a.pdf"), "a").unwrap();

        let mut state = engine(&temp_dir);
        let options = ClassifyOptions {
            simulate: true,
            ..state.default_options()
        };
        let report = state.classify(&folder, OrganizeMode::Date, &options).unwrap();

        assert_eq!(report.planned[0].destination, folder.join("2020").join("a.pdf"));
        assert!(state.batch_log().batches().unwrap().is_empty());
    }

    #[test]
    fn test_undo_redo_keeps_history_in_step() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, "a").unwrap();

        let mut state = engine(&temp_dir);
        state.rename_path(&file, "b.txt").unwrap();
        assert_eq!(state.history().len(), 1);

        state.undo().unwrap();
        assert!(file.exists());
        assert!(state.history().is_empty());
        assert!(state.can_redo());

        state.redo().unwrap();
        assert!(temp_dir.path().join("b.txt").exists());
        assert_eq!(state.history().len(), 1);
        assert!(!state.can_redo());
    }

    #[test]
    fn test_failed_undo_changes_nothing() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = temp_dir.path().join("a.txt");
        fs::write(&file, "a").unwrap();

        let mut state = engine(&temp_dir);
        let action = state.rename_path(&file, "b.txt").unwrap();
        fs::remove_file(&action.destination).unwrap();

        assert!(matches!(state.undo(), Err(EngineError::PathNotFound(_))));
        assert!(state.can_undo());
        assert!(!state.can_redo());
        assert_eq!(state.history().len(), 1);
    }

    #[test]
    fn test_reopen_seeds_undo_stack() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().join("made");

        {
            let mut state = engine(&temp_dir);
            state.create_dir(&dir).unwrap();
        }

        let mut reopened = engine(&temp_dir);
        assert!(reopened.can_undo());
        reopened.undo().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_unwritable_history_keeps_operation_undoable() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut state = engine(&temp_dir);
        // A directory where the history file should be makes every save fail
        fs::create_dir(state.config().history_path()).unwrap();

        let dir = temp_dir.path().join("made");
        state.create_dir(&dir).unwrap();

        assert!(dir.is_dir());
        assert!(state.can_undo());
        state.undo().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_clear_history_empties_stacks() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut state = engine(&temp_dir);
        state.create_file(&temp_dir.path().join("n.txt"), b"n").unwrap();

        state.clear_history().unwrap();
        assert!(!state.can_undo());
        assert!(state.history().is_empty());
    }
}
