/// Per-action undo and redo.
///
/// [`UndoRedoStack`] holds two bounded LIFO stacks of [`Action`]s. Recording a
/// new action clears the redo stack and evicts the oldest undo entry once the
/// capacity is exceeded. Moving an action between the stacks only happens
/// after its file-system effect succeeded, so a failed undo or redo leaves
/// both stacks exactly as they were.
///
/// [`apply_undo`] and [`apply_redo`] perform the file-system effect of one
/// action, dispatching on its kind:
///
/// | kind   | undo                              | redo                               |
/// |--------|-----------------------------------|------------------------------------|
/// | Move   | move destination back to source   | move source to destination         |
/// | Copy   | delete the copy                   | copy again                         |
/// | Rename | rename back                       | rename again                       |
/// | Delete | restore from trash or byte backup | move to trash again, or delete     |
/// | Create | delete it                         | recreate dir, backup bytes or empty file |
use crate::action::{Action, ActionKind};
use crate::error::{EngineError, EngineResult};
use crate::file_organizer::{copy_path, ensure_dir, ensure_parent, move_path, remove_path};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

/// Default number of actions that can be undone.
pub const DEFAULT_UNDO_CAPACITY: usize = 50;

/// Bounded undo and redo stacks.
#[derive(Debug, Clone)]
pub struct UndoRedoStack {
    undo: VecDeque<Action>,
    redo: Vec<Action>,
    capacity: usize,
}

impl UndoRedoStack {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// A stack whose undo side holds the newest `capacity` of `history`.
    pub fn seeded(capacity: usize, history: &[Action]) -> Self {
        let mut stack = Self::new(capacity);
        let start = history.len().saturating_sub(stack.capacity);
        stack.undo.extend(history[start..].iter().cloned());
        stack
    }

    /// Records a new forward action. The redo stack is emptied.
    pub fn push(&mut self, action: Action) {
        self.redo.clear();
        self.push_undo(action);
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn peek_undo(&self) -> Option<&Action> {
        self.undo.back()
    }

    /// Runs `apply` on the newest undoable action and, if it succeeds, moves
    /// that action to the redo stack.
    ///
    /// # Errors
    ///
    /// [`EngineError::NothingToUndo`] on an empty stack, or whatever `apply`
    /// returned. Neither stack changes on error.
    pub fn undo_with<F>(&mut self, apply: F) -> EngineResult<Action>
    where
        F: FnOnce(&Action) -> EngineResult<()>,
    {
        let action = self.undo.back().ok_or(EngineError::NothingToUndo)?;
        apply(action)?;

        let action = self.undo.pop_back().ok_or(EngineError::NothingToUndo)?;
        self.redo.push(action.clone());
        Ok(action)
    }

    /// Runs `apply` on the newest redoable action and, if it succeeds, moves
    /// it back to the undo stack with a fresh timestamp.
    ///
    /// Returns the re-stamped action.
    pub fn redo_with<F>(&mut self, apply: F) -> EngineResult<Action>
    where
        F: FnOnce(&Action) -> EngineResult<()>,
    {
        let action = self.redo.last().ok_or(EngineError::NothingToRedo)?;
        apply(action)?;

        let action = self.redo.pop().ok_or(EngineError::NothingToRedo)?;
        let restamped = action.restamped();
        self.push_undo(restamped.clone());
        Ok(restamped)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    fn push_undo(&mut self, action: Action) {
        self.undo.push_back(action);
        while self.undo.len() > self.capacity {
            self.undo.pop_front();
        }
    }
}

impl Default for UndoRedoStack {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_CAPACITY)
    }
}

/// Reverses the file-system effect of `action`.
pub fn apply_undo(action: &Action) -> EngineResult<()> {
    match &action.kind {
        ActionKind::Move | ActionKind::Rename => {
            require_present(&action.destination)?;
            require_free(&action.source)?;
            ensure_parent(&action.source)?;
            move_path(&action.destination, &action.source)
        }
        ActionKind::Copy | ActionKind::Create { .. } => {
            require_present(&action.destination)?;
            remove_path(&action.destination)
        }
        ActionKind::Delete { trash_path, backup } => {
            require_free(&action.source)?;
            ensure_parent(&action.source)?;
            match (trash_path, backup) {
                (Some(trash), _) if trash.symlink_metadata().is_ok() => {
                    move_path(trash, &action.source)
                }
                (_, Some(bytes)) => fs::write(&action.source, bytes.as_bytes())
                    .map_err(|e| EngineError::io(&action.source, e)),
                _ => Err(EngineError::MissingBackup(action.source.clone())),
            }
        }
    }
}

/// Performs the file-system effect of `action` again.
pub fn apply_redo(action: &Action) -> EngineResult<()> {
    match &action.kind {
        ActionKind::Move | ActionKind::Rename => {
            require_present(&action.source)?;
            require_free(&action.destination)?;
            ensure_parent(&action.destination)?;
            move_path(&action.source, &action.destination)
        }
        ActionKind::Copy => {
            require_present(&action.source)?;
            require_free(&action.destination)?;
            copy_path(&action.source, &action.destination)
        }
        ActionKind::Delete { trash_path, .. } => {
            require_present(&action.source)?;
            match trash_path {
                Some(trash) => {
                    require_free(trash)?;
                    ensure_parent(trash)?;
                    move_path(&action.source, trash)
                }
                None => remove_path(&action.source),
            }
        }
        ActionKind::Create { is_dir, backup } => {
            require_free(&action.destination)?;
            if *is_dir {
                return ensure_dir(&action.destination);
            }
            ensure_parent(&action.destination)?;
            let bytes = backup.as_ref().map(|b| b.as_bytes()).unwrap_or_default();
            fs::write(&action.destination, bytes)
                .map_err(|e| EngineError::io(&action.destination, e))
        }
    }
}

fn require_present(path: &Path) -> EngineResult<()> {
    if path.symlink_metadata().is_err() {
        return Err(EngineError::PathNotFound(path.to_path_buf()));
    }
    Ok(())
}

fn require_free(path: &Path) -> EngineResult<()> {
    if path.symlink_metadata().is_ok() {
        return Err(EngineError::DestinationOccupied(path.to_path_buf()));
    }
    Ok(())
}
