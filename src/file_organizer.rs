/// File-system primitives shared by the classifiers and the undo machinery.
///
/// Moves are plain renames with a copy-and-delete fallback when source and
/// destination live on different devices. Classification wraps them in a
/// [`RetryPolicy`]: one retry after a fixed delay, then the file is given up.
use crate::conflict;
use crate::error::{EngineError, EngineResult};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use walkdir::WalkDir;

/// How many times a move is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Two attempts with the given delay between them.
    pub fn with_backoff(backoff: Duration) -> Self {
        Self::new(2, backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_backoff(Duration::from_secs(1))
    }
}

/// Moves a file or directory in one attempt.
///
/// Returns [`EngineError::PathNotFound`] when the source is gone and
/// [`EngineError::TransientIo`] for any other failure.
pub fn move_path(from: &Path, to: &Path) -> EngineResult<()> {
    if from.symlink_metadata().is_err() {
        return Err(EngineError::PathNotFound(from.to_path_buf()));
    }

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_then_remove(from, to).map_err(|source| EngineError::TransientIo {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source,
            })
        }
        Err(source) => Err(EngineError::TransientIo {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        }),
    }
}

/// Moves a file, retrying according to `policy`.
///
/// A vanished source is not retried. When every attempt fails the last error
/// is reported as [`EngineError::PermanentIo`].
pub fn move_with_retry(from: &Path, to: &Path, policy: RetryPolicy) -> EngineResult<()> {
    retry_move(from, to, policy, move_path)
}

/// [`move_with_retry`] over a custom single-attempt move.
pub fn retry_move<F>(
    from: &Path,
    to: &Path,
    policy: RetryPolicy,
    mut attempt_move: F,
) -> EngineResult<()>
where
    F: FnMut(&Path, &Path) -> EngineResult<()>,
{
    let mut attempt = 1;
    loop {
        match attempt_move(from, to) {
            Ok(()) => {
                if attempt > 1 {
                    log::info!("Moved after retry: {} → {}", from.display(), to.display());
                }
                return Ok(());
            }
            Err(EngineError::TransientIo { source, .. }) if attempt >= policy.max_attempts => {
                log::error!(
                    "Giving up on {} after {} attempts: {}",
                    from.display(),
                    attempt,
                    source
                );
                return Err(EngineError::PermanentIo {
                    from: from.to_path_buf(),
                    to: to.to_path_buf(),
                    attempts: attempt,
                    source,
                });
            }
            Err(err @ EngineError::TransientIo { .. }) => {
                log::warn!("{}; retrying in {:?}", err, policy.backoff);
                thread::sleep(policy.backoff);
                attempt += 1;
            }
            Err(other) => return Err(other),
        }
    }
}

/// Creates `dir` and its parents if missing.
pub fn ensure_dir(dir: &Path) -> EngineResult<()> {
    fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))
}

/// Creates the parent directory of `path` if missing.
pub fn ensure_parent(path: &Path) -> EngineResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// Moves `from` back onto `to`, never overwriting an occupant.
///
/// If something already sits at `to` it is first renamed to a free
/// timestamped `.bak` path. Returns that backup path when one was made.
///
/// When the move itself fails the occupant is put back on `to`. If even that
/// fails the error is [`EngineError::RestoreStranded`], naming the backup.
pub fn restore_to(from: &Path, to: &Path) -> EngineResult<Option<PathBuf>> {
    ensure_parent(to)?;

    if to.symlink_metadata().is_err() {
        move_path(from, to)?;
        return Ok(None);
    }

    let backup_path = generate_backup_path(to)?;
    fs::rename(to, &backup_path).map_err(|e| EngineError::io(to, e))?;
    log::warn!(
        "Moved conflicting {} aside to {}",
        to.display(),
        backup_path.display()
    );

    if let Err(err) = move_path(from, to) {
        return match fs::rename(&backup_path, to) {
            Ok(()) => Err(err),
            Err(e) => {
                log::error!(
                    "Could not put {} back on {}: {}",
                    backup_path.display(),
                    to.display(),
                    e
                );
                Err(EngineError::RestoreStranded {
                    path: to.to_path_buf(),
                    backup: backup_path,
                    source: Box::new(err),
                })
            }
        };
    }
    Ok(Some(backup_path))
}

/// A free backup path next to `original_path`, stamped to the second.
///
/// Example: `file.txt` becomes `file.txt.bak.20251109-143052`, or
/// `file.txt.bak_(1).20251109-143052` when that name is already taken.
pub fn generate_backup_path(original_path: &Path) -> EngineResult<PathBuf> {
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let filename = original_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("file");

    let backup_name = format!("{}.bak.{}", filename, timestamp);
    let candidate = match original_path.parent() {
        Some(parent) => parent.join(backup_name),
        None => PathBuf::from(backup_name),
    };
    conflict::resolve(&candidate)
}

/// Removes `dir` if it exists and holds no entries. Returns whether it was removed.
pub fn remove_dir_if_empty(dir: &Path) -> bool {
    let is_empty = fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false);
    if is_empty && fs::remove_dir(dir).is_ok() {
        log::debug!("Removed empty directory {}", dir.display());
        return true;
    }
    false
}

/// Deletes a file or a whole directory tree.
pub fn remove_path(path: &Path) -> EngineResult<()> {
    let metadata = path
        .symlink_metadata()
        .map_err(|_| EngineError::PathNotFound(path.to_path_buf()))?;
    let result = if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| EngineError::io(path, e))
}

/// Copies a file, or a directory tree recursively.
pub fn copy_path(from: &Path, to: &Path) -> EngineResult<()> {
    if !from.exists() {
        return Err(EngineError::PathNotFound(from.to_path_buf()));
    }
    ensure_parent(to)?;
    copy_recursive(from, to).map_err(|e| EngineError::io(from, e))
}

fn copy_recursive(from: &Path, to: &Path) -> io::Result<()> {
    if from.is_file() {
        fs::copy(from, to)?;
        return Ok(());
    }

    fs::create_dir_all(to)?;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(io::Error::other)?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    copy_recursive(from, to)?;
    if from.is_dir() {
        fs::remove_dir_all(from)
    } else {
        fs::remove_file(from)
    }
}
