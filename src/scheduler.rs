//! Periodic organization of watched folders.
//!
//! Watched folders come from a JSON preferences document:
//!
//! ```json
//! { "dossiers": [ { "chemin": "/home/me/Downloads", "mode": "type", "frequence": "journalier" } ] }
//! ```
//!
//! The scheduler keeps a `last_run` time per folder path. A folder that has
//! not run since the scheduler started is always due, so every folder is
//! organized once on the first pass whatever its frequency. A pass visits
//! the folders in order and runs each due one to completion before looking
//! at the next. Folders listed twice with the same path share one `last_run`.

use crate::classifier::OrganizeMode;
use crate::engine::EngineState;
use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Datelike, Duration as DateDuration, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// How often a watched folder is organized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    #[serde(rename = "journalier", alias = "daily")]
    Daily,
    #[serde(rename = "hebdomadaire", alias = "weekly")]
    Weekly,
    #[serde(rename = "mensuel", alias = "monthly")]
    Monthly,
}

impl Frequency {
    /// Whether a folder last organized at `last_run` is due at `now`.
    ///
    /// Daily means a calendar day boundary was crossed, weekly means at least
    /// seven days elapsed and monthly means the calendar month changed.
    pub fn is_due(self, last_run: DateTime<Local>, now: DateTime<Local>) -> bool {
        match self {
            Frequency::Daily => now.date_naive() > last_run.date_naive(),
            Frequency::Weekly => now - last_run >= DateDuration::days(7),
            Frequency::Monthly => {
                now.month() != last_run.month() || now.year() != last_run.year()
            }
        }
    }
}

/// One watched folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedFolderConfig {
    #[serde(rename = "chemin")]
    pub path: PathBuf,
    pub mode: OrganizeMode,
    #[serde(rename = "frequence")]
    pub frequency: Frequency,
}

/// The watched-folder preferences document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchPreferences {
    #[serde(rename = "dossiers", default)]
    pub folders: Vec<WatchedFolderConfig>,
}

impl WatchPreferences {
    /// Reads the preferences document.
    ///
    /// # Errors
    ///
    /// [`EngineError::ConfigMissing`] when the file does not exist and
    /// [`EngineError::ConfigInvalid`] when it cannot be parsed.
    pub fn load(path: &Path) -> EngineResult<Self> {
        if !path.exists() {
            return Err(EngineError::ConfigMissing(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        serde_json::from_str(&content).map_err(|e| EngineError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// What a pass did with one watched folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderOutcome {
    Organized { processed: usize, failed: usize },
    NotDue,
    NotADirectory,
    Failed(String),
}

/// Polls the watched folders and organizes the due ones.
pub struct Scheduler {
    folders: Vec<WatchedFolderConfig>,
    last_runs: HashMap<PathBuf, DateTime<Local>>,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(preferences: WatchPreferences, poll_interval: Duration) -> Self {
        Self {
            folders: preferences.folders,
            last_runs: HashMap::new(),
            poll_interval,
        }
    }

    pub fn folders(&self) -> &[WatchedFolderConfig] {
        &self.folders
    }

    pub fn last_run(&self, path: &Path) -> Option<DateTime<Local>> {
        self.last_runs.get(path).copied()
    }

    /// Visits every watched folder once and organizes those that are due.
    ///
    /// A folder that never ran is due whatever its frequency, so weekly and
    /// monthly folders also run on the first pass instead of waiting a period.
    pub fn run_pass(
        &mut self,
        engine: &mut EngineState,
        now: DateTime<Local>,
    ) -> Vec<(PathBuf, FolderOutcome)> {
        let mut outcomes = Vec::with_capacity(self.folders.len());

        for folder in &self.folders {
            if !folder.path.is_dir() {
                log::warn!("Watched folder is not a directory: {}", folder.path.display());
                outcomes.push((folder.path.clone(), FolderOutcome::NotADirectory));
                continue;
            }

            let due = match self.last_runs.get(&folder.path) {
                Some(&last_run) => folder.frequency.is_due(last_run, now),
                None => true,
            };
            if !due {
                outcomes.push((folder.path.clone(), FolderOutcome::NotDue));
                continue;
            }

            log::info!(
                "Organizing {} by {} ({:?})",
                folder.path.display(),
                folder.mode,
                folder.frequency
            );
            let options = engine.default_options();
            let outcome = match engine.classify(&folder.path, folder.mode, &options) {
                Ok(report) => FolderOutcome::Organized {
                    processed: report.processed,
                    failed: report.failed.len(),
                },
                Err(e) => {
                    log::error!("Organizing {} failed: {}", folder.path.display(), e);
                    FolderOutcome::Failed(e.to_string())
                }
            };
            self.last_runs.insert(folder.path.clone(), now);
            outcomes.push((folder.path.clone(), outcome));
        }

        outcomes
    }

    /// Runs passes until `stop` is set, sleeping the poll interval in between.
    /// Every outcome of every pass is handed to `on_outcome`.
    ///
    /// The flag is only looked at between passes; a running classification
    /// always completes.
    pub fn run<F>(&mut self, engine: &mut EngineState, stop: &AtomicBool, mut on_outcome: F)
    where
        F: FnMut(&Path, &FolderOutcome),
    {
        log::info!(
            "Watching {} folders every {:?}",
            self.folders.len(),
            self.poll_interval
        );
        while !stop.load(Ordering::SeqCst) {
            for (folder, outcome) in self.run_pass(engine, Local::now()) {
                on_outcome(&folder, &outcome);
            }
            self.sleep_until_next_pass(stop);
        }
        log::info!("Watcher stopped");
    }

    fn sleep_until_next_pass(&self, stop: &AtomicBool) {
        let step = Duration::from_millis(200);
        let mut slept = Duration::ZERO;
        while slept < self.poll_interval && !stop.load(Ordering::SeqCst) {
            let nap = step.min(self.poll_interval - slept);
            thread::sleep(nap);
            slept += nap;
        }
    }
}
