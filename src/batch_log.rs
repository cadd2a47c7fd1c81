//! Durable log of organization batches.
//!
//! Two newline-delimited JSON files are kept side by side: the batch log,
//! holding one JSON array of actions per classifier run, and the undone log,
//! holding the batches that were reversed. Appends are write-through.
//!
//! Batch undo is coarse: it always reverses *every* logged batch, newest
//! first, and moves them all to the undone log. Batch redo replays only the
//! most recently undone line.
//!
//! A line that does not decode is reported as corrupt, skipped with a warning
//! and processing continues with the remaining lines.

use crate::action::{Action, OrganizationBatch};
use crate::error::{EngineError, EngineResult};
use crate::file_organizer::{ensure_parent, move_path, remove_dir_if_empty, restore_to};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Result of reversing the batch log.
#[derive(Debug, Default)]
pub struct BatchUndoReport {
    pub batches: usize,
    pub restored_files: usize,
    /// Files whose moved copy could not be found.
    pub skipped_files: Vec<(PathBuf, String)>,
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Occupants renamed aside so an original path could be restored.
    pub backups: Vec<PathBuf>,
    pub corrupt_lines: usize,
}

impl BatchUndoReport {
    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty() && self.skipped_files.is_empty()
    }
}

/// Result of replaying the last undone batch.
#[derive(Debug, Default)]
pub struct BatchRedoReport {
    pub replayed_files: usize,
    pub skipped_files: Vec<(PathBuf, String)>,
    pub failed_moves: Vec<(PathBuf, String)>,
    pub corrupt_lines: usize,
}

impl BatchRedoReport {
    pub fn is_complete_success(&self) -> bool {
        self.failed_moves.is_empty() && self.skipped_files.is_empty()
    }
}

/// One raw line of a log file and, if it decoded, its actions.
struct LogLine {
    raw: String,
    actions: Option<Vec<Action>>,
}

/// Handle on the batch log and the undone log.
#[derive(Debug, Clone)]
pub struct BatchLog {
    batch_path: PathBuf,
    undone_path: PathBuf,
}

impl BatchLog {
    pub fn new(batch_path: impl Into<PathBuf>, undone_path: impl Into<PathBuf>) -> Self {
        Self {
            batch_path: batch_path.into(),
            undone_path: undone_path.into(),
        }
    }

    pub fn batch_path(&self) -> &Path {
        &self.batch_path
    }

    /// Appends a batch as one line. An empty batch is not written.
    ///
    /// Returns whether a line was written.
    pub fn append_batch(&self, batch: &OrganizationBatch) -> EngineResult<bool> {
        if batch.is_empty() {
            log::warn!("Empty batch, nothing recorded");
            return Ok(false);
        }
        append_line(&self.batch_path, &serde_json::to_string(&batch.actions)?)?;
        log::info!(
            "Recorded batch of {} moves in {}",
            batch.len(),
            self.batch_path.display()
        );
        Ok(true)
    }

    /// Logged batches, oldest first. Corrupt lines are skipped.
    pub fn batches(&self) -> EngineResult<Vec<OrganizationBatch>> {
        Ok(decoded(read_lines(&self.batch_path)?))
    }

    /// Undone batches, oldest first. Corrupt lines are skipped.
    pub fn undone_batches(&self) -> EngineResult<Vec<OrganizationBatch>> {
        Ok(decoded(read_lines(&self.undone_path)?))
    }

    /// Reverses every logged batch, newest batch first and each batch's
    /// actions in reverse order.
    ///
    /// A moved file that can no longer be found is skipped. A file that sits
    /// where an original is restored is renamed aside first. Folders emptied
    /// by the restore are removed. The reversed lines are then appended
    /// verbatim to the undone log and the batch log is truncated.
    ///
    /// # Errors
    ///
    /// [`EngineError::NothingToUndo`] when the log holds no readable batch.
    pub fn undo_last_batch(&self) -> EngineResult<BatchUndoReport> {
        let lines = read_lines(&self.batch_path)?;
        let mut report = BatchUndoReport {
            corrupt_lines: lines.iter().filter(|l| l.actions.is_none()).count(),
            ..Default::default()
        };

        let valid: Vec<&LogLine> = lines.iter().filter(|l| l.actions.is_some()).collect();
        if valid.is_empty() {
            return Err(EngineError::NothingToUndo);
        }

        for line in valid.iter().rev() {
            report.batches += 1;
            if let Some(actions) = &line.actions {
                for action in actions.iter().rev() {
                    undo_move(action, &mut report);
                }
            }
        }

        for line in &valid {
            append_line(&self.undone_path, &line.raw)?;
        }
        fs::write(&self.batch_path, "").map_err(|e| EngineError::io(&self.batch_path, e))?;

        log::info!(
            "Undid {} batches: {} restored, {} skipped, {} failed",
            report.batches,
            report.restored_files,
            report.skipped_files.len(),
            report.failed_restores.len()
        );
        Ok(report)
    }

    /// Replays the most recently undone batch and moves it back to the batch log.
    ///
    /// Only the actions that succeeded are re-appended. The replayed line is
    /// removed from the undone log; every other line is kept as is.
    ///
    /// # Errors
    ///
    /// [`EngineError::NothingToRedo`] when the undone log holds no readable batch.
    pub fn redo_last_undo(&self) -> EngineResult<BatchRedoReport> {
        let mut lines = read_lines(&self.undone_path)?;
        let mut report = BatchRedoReport {
            corrupt_lines: lines.iter().filter(|l| l.actions.is_none()).count(),
            ..Default::default()
        };

        let index = lines
            .iter()
            .rposition(|l| l.actions.is_some())
            .ok_or(EngineError::NothingToRedo)?;
        let line = lines.remove(index);

        let mut replayed = Vec::new();
        for action in line.actions.into_iter().flatten() {
            if redo_move(&action, &mut report) {
                replayed.push(action);
            }
        }

        let batch = OrganizationBatch::from_actions(replayed);
        if !batch.is_empty() {
            append_line(&self.batch_path, &serde_json::to_string(&batch.actions)?)?;
        }
        rewrite_lines(&self.undone_path, &lines)?;

        log::info!(
            "Redid batch: {} replayed, {} skipped, {} failed",
            report.replayed_files,
            report.skipped_files.len(),
            report.failed_moves.len()
        );
        Ok(report)
    }
}

fn undo_move(action: &Action, report: &mut BatchUndoReport) {
    if !action.is_move() {
        log::warn!("Not a move, skipping: {}", action.describe());
        report
            .skipped_files
            .push((action.destination.clone(), "Not a move action".to_string()));
        return;
    }
    if action.destination.symlink_metadata().is_err() {
        log::warn!(
            "File not found at expected location: {}",
            action.destination.display()
        );
        report.skipped_files.push((
            action.destination.clone(),
            "File not found at expected location".to_string(),
        ));
        return;
    }

    match restore_to(&action.destination, &action.source) {
        Ok(backup) => {
            report.restored_files += 1;
            report.backups.extend(backup);
            if let Some(parent) = action.destination.parent() {
                remove_dir_if_empty(parent);
            }
        }
        Err(e) => {
            log::error!("Failed to restore {}: {}", action.source.display(), e);
            if let EngineError::RestoreStranded { backup, .. } = &e {
                report.backups.push(backup.clone());
            }
            report
                .failed_restores
                .push((action.destination.clone(), e.to_string()));
        }
    }
}

fn redo_move(action: &Action, report: &mut BatchRedoReport) -> bool {
    if action.source.symlink_metadata().is_err() {
        log::warn!("Source vanished, skipping: {}", action.source.display());
        report
            .skipped_files
            .push((action.source.clone(), "Source not found".to_string()));
        return false;
    }
    if action.destination.symlink_metadata().is_ok() {
        let err = EngineError::DestinationOccupied(action.destination.clone());
        log::error!("{}", err);
        report
            .failed_moves
            .push((action.source.clone(), err.to_string()));
        return false;
    }

    let replayed = ensure_parent(&action.destination)
        .and_then(|()| move_path(&action.source, &action.destination));
    match replayed {
        Ok(()) => {
            report.replayed_files += 1;
            true
        }
        Err(e) => {
            log::error!("Failed to replay {}: {}", action.describe(), e);
            report.failed_moves.push((action.source.clone(), e.to_string()));
            false
        }
    }
}

fn decoded(lines: Vec<LogLine>) -> Vec<OrganizationBatch> {
    lines
        .into_iter()
        .filter_map(|l| l.actions)
        .map(OrganizationBatch::from_actions)
        .collect()
}

fn read_lines(path: &Path) -> EngineResult<Vec<LogLine>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;

    let mut lines = Vec::new();
    for (number, raw) in content.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        let actions = match serde_json::from_str::<Vec<Action>>(raw) {
            Ok(actions) => Some(actions),
            Err(e) => {
                let err = EngineError::LogCorrupt {
                    path: path.to_path_buf(),
                    line: number + 1,
                    reason: e.to_string(),
                };
                log::warn!("{}; line skipped", err);
                None
            }
        };
        lines.push(LogLine {
            raw: raw.to_string(),
            actions,
        });
    }
    Ok(lines)
}

fn append_line(path: &Path, line: &str) -> EngineResult<()> {
    ensure_parent(path)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| EngineError::io(path, e))?;
    writeln!(file, "{}", line).map_err(|e| EngineError::io(path, e))
}

fn rewrite_lines(path: &Path, lines: &[LogLine]) -> EngineResult<()> {
    let mut content = String::new();
    for line in lines {
        content.push_str(&line.raw);
        content.push('\n');
    }
    let tmp = path.with_extension("jsonl.tmp");
    fs::write(&tmp, content).map_err(|e| EngineError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| EngineError::io(path, e))
}
