//! Flat chronological history of individual actions.
//!
//! The history is a single pretty-printed JSON array rewritten on every save
//! through a temporary file. It is bounded: once more than `max_entries`
//! actions are stored the oldest ones are dropped, whatever the undo/redo
//! position. A document that cannot be parsed is renamed aside with a
//! `.corrupt-<timestamp>` suffix and the history starts over empty.

use crate::action::Action;
use crate::error::{EngineError, EngineResult};
use crate::file_organizer::ensure_parent;
use chrono::{DateTime, Duration, Local};
use std::fs;
use std::path::{Path, PathBuf};

pub const CSV_HEADER: &str = "Date,Action,Source,Destination";

/// Output format of a history export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
}

/// The persisted action history.
#[derive(Debug)]
pub struct HistoryLog {
    path: PathBuf,
    max_entries: usize,
    entries: Vec<Action>,
}

impl HistoryLog {
    /// Loads the history stored at `path`, or starts an empty one.
    pub fn open(path: impl Into<PathBuf>, max_entries: usize) -> EngineResult<Self> {
        let path = path.into();
        let entries = load_entries(&path)?;
        let mut history = Self {
            path,
            max_entries: max_entries.max(1),
            entries,
        };
        if history.trim() > 0 {
            history.save()?;
        }
        Ok(history)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Recorded actions, oldest first.
    pub fn entries(&self) -> &[Action] {
        &self.entries
    }

    /// The newest `count` actions, oldest first.
    pub fn tail(&self, count: usize) -> &[Action] {
        let start = self.entries.len().saturating_sub(count);
        &self.entries[start..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends an action, evicting the oldest entries past the bound.
    pub fn append(&mut self, action: Action) -> EngineResult<()> {
        self.entries.push(action);
        let evicted = self.trim();
        if evicted > 0 {
            log::debug!("History full, dropped {} oldest entries", evicted);
        }
        self.save()
    }

    /// Removes the newest entry if it is `action`. Returns whether it did.
    pub fn remove_last_if(&mut self, action: &Action) -> EngineResult<bool> {
        if self.entries.last() != Some(action) {
            return Ok(false);
        }
        self.entries.pop();
        self.save()?;
        Ok(true)
    }

    /// Drops entries older than `retention_days` before `now`.
    ///
    /// Returns the number of entries removed.
    pub fn prune(&mut self, retention_days: i64, now: DateTime<Local>) -> EngineResult<usize> {
        let threshold = now - Duration::days(retention_days);
        let before = self.entries.len();
        self.entries.retain(|action| action.timestamp >= threshold);
        let removed = before - self.entries.len();
        if removed > 0 {
            self.save()?;
            log::info!(
                "Pruned {} history entries older than {} days",
                removed,
                retention_days
            );
        }
        Ok(removed)
    }

    /// Empties the history.
    pub fn clear(&mut self) -> EngineResult<()> {
        self.entries.clear();
        self.save()?;
        log::info!("History cleared");
        Ok(())
    }

    /// Writes the history to `output` in the given format.
    pub fn export(&self, format: ExportFormat, output: &Path) -> EngineResult<usize> {
        match format {
            ExportFormat::Csv => self.export_csv(output),
            ExportFormat::Json => self.export_json(output),
        }
    }

    /// Writes the history as CSV with a `Date,Action,Source,Destination` header.
    ///
    /// Returns the number of rows written.
    pub fn export_csv(&self, output: &Path) -> EngineResult<usize> {
        let mut content = String::from(CSV_HEADER);
        content.push('\n');
        for action in &self.entries {
            let row = [
                action.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                action.kind.label().to_string(),
                action.source.display().to_string(),
                action.destination.display().to_string(),
            ];
            let fields: Vec<String> = row.iter().map(|f| csv_field(f)).collect();
            content.push_str(&fields.join(","));
            content.push('\n');
        }

        ensure_parent(output)?;
        fs::write(output, content).map_err(|e| EngineError::io(output, e))?;
        log::info!("Exported {} entries to {}", self.entries.len(), output.display());
        Ok(self.entries.len())
    }

    /// Writes the history as a pretty JSON array.
    pub fn export_json(&self, output: &Path) -> EngineResult<usize> {
        ensure_parent(output)?;
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(output, json).map_err(|e| EngineError::io(output, e))?;
        log::info!("Exported {} entries to {}", self.entries.len(), output.display());
        Ok(self.entries.len())
    }

    fn trim(&mut self) -> usize {
        let excess = self.entries.len().saturating_sub(self.max_entries);
        self.entries.drain(..excess);
        excess
    }

    fn save(&self) -> EngineResult<()> {
        ensure_parent(&self.path)?;
        let json = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| EngineError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| EngineError::io(&self.path, e))
    }
}

fn load_entries(path: &Path) -> EngineResult<Vec<Action>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str(&content) {
        Ok(entries) => Ok(entries),
        Err(e) => {
            let aside = corrupt_path(path);
            log::warn!(
                "History {} is corrupt ({}); moved to {}",
                path.display(),
                e,
                aside.display()
            );
            fs::rename(path, &aside).map_err(|e| EngineError::io(path, e))?;
            Ok(Vec::new())
        }
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "history.json".to_string());
    path.with_file_name(format!("{}.corrupt-{}", name, timestamp))
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn history_in(temp_dir: &TempDir, max_entries: usize) -> HistoryLog {
        HistoryLog::open(temp_dir.path().join("history.json"), max_entries)
            .expect("Failed to open history")
    }

    fn dated(source: &str, year: i32, month: u32, day: u32) -> Action {
        let mut action = Action::renamed(source, format!("{}.new", source));
        action.timestamp = Local.with_ymd_and_hms(year, month, day, 10, 0, 0).unwrap();
        action
    }

    #[test]
    fn test_append_persists() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut history = history_in(&temp_dir, 100);
        history.append(Action::moved("/a/x", "/a/b/x")).unwrap();

        let reopened = history_in(&temp_dir, 100);
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.entries()[0].source, PathBuf::from("/a/x"));
    }

    #[test]
    fn test_bound_evicts_oldest_first() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut history = history_in(&temp_dir, 3);
        for i in 0..5 {
            history.append(Action::moved(format!("/f{}", i), "/d")).unwrap();
        }

        let sources: Vec<_> = history.entries().iter().map(|a| a.source.clone()).collect();
        assert_eq!(
            sources,
            vec![PathBuf::from("/f2"), PathBuf::from("/f3"), PathBuf::from("/f4")]
        );
        assert_eq!(history.tail(2).len(), 2);
        assert_eq!(history.tail(10).len(), 3);
    }

    #[test]
    fn test_remove_last_if_only_matches_tail() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut history = history_in(&temp_dir, 10);
        let first = Action::moved("/a", "/b");
        let second = Action::moved("/c", "/d");
        history.append(first.clone()).unwrap();
        history.append(second.clone()).unwrap();

        assert!(!history.remove_last_if(&first).unwrap());
        assert!(history.remove_last_if(&second).unwrap());
        assert_eq!(history.entries(), &[first]);
    }

    #[test]
    fn test_prune_by_age() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut history = history_in(&temp_dir, 10);
        history.append(dated("/old", 2024, 1, 1)).unwrap();
        history.append(dated("/recent", 2024, 3, 20)).unwrap();

        let now = Local.with_ymd_and_hms(2024, 3, 25, 12, 0, 0).unwrap();
        assert_eq!(history.prune(30, now).unwrap(), 1);
        assert_eq!(history.entries()[0].source, PathBuf::from("/recent"));
    }

    #[test]
    fn test_corrupt_document_is_moved_aside() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("history.json");
        fs::write(&path, "[{ broken").unwrap();

        let history = history_in(&temp_dir, 10);
        assert!(history.is_empty());
        assert!(!path.exists());

        let aside: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".corrupt-"))
            .collect();
        assert_eq!(aside.len(), 1);
    }

    #[test]
    fn test_export_csv_quotes_fields() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut history = history_in(&temp_dir, 10);
        history.append(dated("/docs/a,b.txt", 2024, 5, 6)).unwrap();

        let output = temp_dir.path().join("out").join("history.csv");
        assert_eq!(history.export_csv(&output).unwrap(), 1);

        let content = fs::read_to_string(&output).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(
            lines.next(),
            Some("2024-05-06 10:00:00,Rename,\"/docs/a,b.txt\",\"/docs/a,b.txt.new\"")
        );
    }

    #[test]
    fn test_export_json_and_clear() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut history = history_in(&temp_dir, 10);
        history.append(Action::copied("/a", "/b")).unwrap();

        let output = temp_dir.path().join("history_export.json");
        history.export_json(&output).unwrap();
        let exported: Vec<Action> =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(exported.len(), 1);

        history.clear().unwrap();
        assert!(history_in(&temp_dir, 10).is_empty());
    }

    #[test]
    fn test_csv_field_escaping() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
