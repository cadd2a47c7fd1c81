//! Direct file operations that produce reversible [`Action`]s.
//!
//! Each function performs the file-system effect and returns the action
//! describing it; recording it on the undo stack and in the history is left
//! to the engine. New paths are resolved through the conflict resolver, so
//! nothing is ever overwritten. Deletions are moves into the engine trash.

use crate::action::{Action, ByteBackup};
use crate::conflict;
use crate::error::{EngineError, EngineResult};
use crate::file_organizer::{copy_path, ensure_dir, ensure_parent, move_path};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Performs operations against a trash directory with a backup size limit.
#[derive(Debug, Clone)]
pub struct Operations {
    trash_dir: PathBuf,
    backup_max_bytes: u64,
}

impl Operations {
    pub fn new(trash_dir: impl Into<PathBuf>, backup_max_bytes: u64) -> Self {
        Self {
            trash_dir: trash_dir.into(),
            backup_max_bytes,
        }
    }

    pub fn trash_dir(&self) -> &Path {
        &self.trash_dir
    }

    /// Moves `source` to `destination`, or into it when it is a directory.
    pub fn move_path(&self, source: &Path, destination: &Path) -> EngineResult<Action> {
        require_present(source)?;
        let target = conflict::resolve(&target_for(source, destination))?;
        ensure_parent(&target)?;
        move_path(source, &target)?;
        Ok(Action::moved(source, target))
    }

    /// Copies a file or directory tree, same destination rules as [`Self::move_path`].
    pub fn copy_path(&self, source: &Path, destination: &Path) -> EngineResult<Action> {
        require_present(source)?;
        let target = conflict::resolve(&target_for(source, destination))?;
        copy_path(source, &target)?;
        Ok(Action::copied(source, target))
    }

    /// Renames `path` within its directory.
    pub fn rename_path(&self, path: &Path, new_name: &str) -> EngineResult<Action> {
        if new_name.trim().is_empty() || new_name.contains(['/', '\\']) {
            return Err(EngineError::InvalidName(new_name.to_string()));
        }
        require_present(path)?;
        let target = conflict::resolve(&path.with_file_name(new_name))?;
        move_path(path, &target)?;
        Ok(Action::renamed(path, target))
    }

    /// Moves `path` into the trash. Small files also keep a byte backup.
    pub fn delete_path(&self, path: &Path) -> EngineResult<Action> {
        require_present(path)?;
        let backup = self.backup_of(path)?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "item".to_string());
        let trash_path = self.trash_dir.join(format!("{}-{}", Uuid::new_v4(), name));
        ensure_dir(&self.trash_dir)?;
        move_path(path, &trash_path)?;

        log::debug!("Trashed {} as {}", path.display(), trash_path.display());
        Ok(Action::deleted(path, Some(trash_path), backup))
    }

    /// Creates a file holding `contents`.
    pub fn create_file(&self, path: &Path, contents: &[u8]) -> EngineResult<Action> {
        let target = conflict::resolve(path)?;
        ensure_parent(&target)?;
        fs::write(&target, contents).map_err(|e| EngineError::io(&target, e))?;

        let backup = (contents.len() as u64 <= self.backup_max_bytes)
            .then(|| ByteBackup(contents.to_vec()));
        Ok(Action::created(target, false, backup))
    }

    /// Creates a directory and any missing parents.
    pub fn create_dir(&self, path: &Path) -> EngineResult<Action> {
        let target = conflict::resolve(path)?;
        ensure_dir(&target)?;
        Ok(Action::created(target, true, None))
    }

    fn backup_of(&self, path: &Path) -> EngineResult<Option<ByteBackup>> {
        let metadata = fs::metadata(path).map_err(|e| EngineError::io(path, e))?;
        if !metadata.is_file() || metadata.len() > self.backup_max_bytes {
            return Ok(None);
        }
        let bytes = fs::read(path).map_err(|e| EngineError::io(path, e))?;
        Ok(Some(ByteBackup(bytes)))
    }
}

fn target_for(source: &Path, destination: &Path) -> PathBuf {
    match source.file_name() {
        Some(name) if destination.is_dir() => destination.join(name),
        _ => destination.to_path_buf(),
    }
}

fn require_present(path: &Path) -> EngineResult<()> {
    if path.symlink_metadata().is_err() {
        return Err(EngineError::PathNotFound(path.to_path_buf()));
    }
    Ok(())
}
