//! Destination conflict resolution.
//!
//! A taken destination `dir/name.ext` is replaced by the first free
//! `dir/name_(n).ext`, counting from 1. The check is not atomic with respect
//! to other writers; the engine assumes it is the only process moving files
//! in the folders it manages.

use crate::error::{EngineError, EngineResult};
use std::path::{Path, PathBuf};

/// Highest counter tried before giving up.
pub const MAX_CONFLICT_ATTEMPTS: u32 = 1000;

/// Returns a path that does not exist at call time.
///
/// If `path` is free it is returned unchanged. Given the same set of existing
/// files the result is always the same.
///
/// # Examples
///
/// ```no_run
/// use dirsort::conflict::resolve;
/// use std::path::Path;
///
/// // With `Documents/invoice.pdf` already present:
/// let free = resolve(Path::new("Documents/invoice.pdf")).unwrap();
/// assert_eq!(free, Path::new("Documents/invoice_(1).pdf"));
/// ```
pub fn resolve(path: &Path) -> EngineResult<PathBuf> {
    if !exists(path) {
        return Ok(path.to_path_buf());
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for counter in 1..=MAX_CONFLICT_ATTEMPTS {
        let candidate = path.with_file_name(format!("{}_({}){}", stem, counter, extension));
        if !exists(&candidate) {
            return Ok(candidate);
        }
    }

    log::error!("Too many name conflicts for {}", path.display());
    Err(EngineError::ConflictExhausted {
        path: path.to_path_buf(),
        attempts: MAX_CONFLICT_ATTEMPTS,
    })
}

// Broken symlinks count as taken.
fn exists(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}
