//! Policy classifiers: by type, by creation year and by name similarity.
//!
//! All three share one pipeline. The top level of the folder is scanned for
//! regular files that pass the configured filters, the list is cut to
//! `limit` entries and each file gets a destination sub-folder. Destinations
//! then go through the conflict resolver and the file is moved with the
//! retry policy. A failing file is reported and left in place; it never stops
//! the rest of the run.
//!
//! The successful moves of a run form one [`OrganizationBatch`].

use crate::action::OrganizationBatch;
use crate::collaborators::CreationDateSource;
use crate::config::CompiledFilters;
use crate::conflict;
use crate::error::{EngineError, EngineResult};
use crate::file_category::{CategoryTable, capitalize};
use crate::file_organizer::{RetryPolicy, ensure_dir, move_path, retry_move};
use crate::name_grouping::NameGrouper;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// The classification policy applied to a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum OrganizeMode {
    #[serde(rename = "type")]
    Type,
    #[serde(rename = "date")]
    Date,
    #[serde(rename = "nom", alias = "name")]
    Name,
}

impl std::fmt::Display for OrganizeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OrganizeMode::Type => "type",
            OrganizeMode::Date => "date",
            OrganizeMode::Name => "name",
        };
        f.write_str(label)
    }
}

/// Options shared by every classifier run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifyOptions {
    /// Compute destinations without touching the file system.
    pub simulate: bool,
    /// Only consider the first N files of the listing. `Some(0)` means no limit.
    pub limit: Option<usize>,
    /// Smallest group the name classifier will create a folder for.
    pub min_group_size: usize,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            simulate: false,
            limit: None,
            min_group_size: 2,
        }
    }
}

/// A move computed during a simulated run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// A file the run could not move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of one classifier run.
#[derive(Debug, Clone, Default)]
pub struct ClassifyReport {
    /// Files considered after filtering and `limit`.
    pub scanned: usize,
    /// Files actually moved.
    pub processed: usize,
    /// Moves a simulated run would have made.
    pub planned: Vec<PlannedMove>,
    /// Files left alone on purpose, such as names outside every group.
    pub skipped: usize,
    pub failed: Vec<FileFailure>,
    pub batch: OrganizationBatch,
}

impl ClassifyReport {
    /// Number of files per destination folder, for the summary table.
    pub fn destination_counts(&self) -> BTreeMap<String, usize> {
        let destinations = self
            .batch
            .actions
            .iter()
            .map(|a| a.destination.as_path())
            .chain(self.planned.iter().map(|p| p.destination.as_path()));

        let mut counts = BTreeMap::new();
        for destination in destinations {
            let folder = destination
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            *counts.entry(folder).or_insert(0) += 1;
        }
        counts
    }
}

/// One move attempt; the retry policy decides whether to call it again.
type MoveFn = Box<dyn Fn(&Path, &Path) -> EngineResult<()>>;

/// Runs the classification policies over a folder.
pub struct Classifier {
    categories: CategoryTable,
    filters: CompiledFilters,
    retry: RetryPolicy,
    dates: Box<dyn CreationDateSource>,
    grouper: NameGrouper,
    mover: MoveFn,
}

impl Classifier {
    pub fn new(
        categories: CategoryTable,
        filters: CompiledFilters,
        retry: RetryPolicy,
        dates: Box<dyn CreationDateSource>,
    ) -> Self {
        Self {
            categories,
            filters,
            retry,
            dates,
            grouper: NameGrouper::new(),
            mover: Box::new(move_path),
        }
    }

    /// Runs the classifier selected by `mode`.
    pub fn classify(
        &self,
        folder: &Path,
        mode: OrganizeMode,
        options: &ClassifyOptions,
    ) -> EngineResult<ClassifyReport> {
        match mode {
            OrganizeMode::Type => self.classify_by_type(folder, options),
            OrganizeMode::Date => self.classify_by_date(folder, options),
            OrganizeMode::Name => self.classify_by_name(folder, options),
        }
    }

    /// Sorts files into category folders by extension.
    pub fn classify_by_type(
        &self,
        folder: &Path,
        options: &ClassifyOptions,
    ) -> EngineResult<ClassifyReport> {
        let files = self.scan(folder, options.limit)?;
        let plan = files
            .into_iter()
            .map(|file| {
                let category = self.categories.category_for_path(&file);
                (file, category)
            })
            .collect();
        Ok(self.execute(folder, plan, options))
    }

    /// Sorts files into folders named after their creation year.
    pub fn classify_by_date(
        &self,
        folder: &Path,
        options: &ClassifyOptions,
    ) -> EngineResult<ClassifyReport> {
        let files = self.scan(folder, options.limit)?;
        let mut plan = Vec::with_capacity(files.len());
        let mut failed = Vec::new();

        for file in files {
            match self.dates.creation_date(&file) {
                Ok(date) => plan.push((file, format!("{:04}", date.year()))),
                Err(e) => {
                    log::error!("No creation date for {}: {}", file.display(), e);
                    failed.push(FileFailure {
                        reason: e.to_string(),
                        path: file,
                    });
                }
            }
        }

        let mut report = self.execute(folder, plan, options);
        report.scanned += failed.len();
        report.failed.extend(failed);
        Ok(report)
    }

    /// Moves groups of similarly named files into one folder per group.
    pub fn classify_by_name(
        &self,
        folder: &Path,
        options: &ClassifyOptions,
    ) -> EngineResult<ClassifyReport> {
        let files = self.scan(folder, options.limit)?;

        let mut by_name: HashMap<String, PathBuf> = HashMap::new();
        let mut names = Vec::with_capacity(files.len());
        for file in files {
            if let Some(name) = file.file_name().map(|n| n.to_string_lossy().to_string()) {
                names.push(name.clone());
                by_name.insert(name, file);
            }
        }

        let groups = self.grouper.group(&names, options.min_group_size);
        let mut plan = Vec::new();
        for group in groups {
            let folder_name = self.grouper.sanitize_folder_name(&capitalize(&group.key));
            log::debug!(
                "Group '{}' → {} ({} files)",
                group.key,
                folder_name,
                group.files.len()
            );
            for name in group.files {
                if let Some(file) = by_name.remove(&name) {
                    plan.push((file, folder_name.clone()));
                }
            }
        }

        let skipped = by_name.len();
        let mut report = self.execute(folder, plan, options);
        report.scanned += skipped;
        report.skipped = skipped;
        Ok(report)
    }

    /// Regular files directly inside `folder` that pass the filters, in
    /// listing order, cut to `limit`.
    fn scan(&self, folder: &Path, limit: Option<usize>) -> EngineResult<Vec<PathBuf>> {
        if !folder.is_dir() {
            return Err(EngineError::PathNotFound(folder.to_path_buf()));
        }

        let entries = fs::read_dir(folder).map_err(|e| EngineError::io(folder, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EngineError::io(folder, e))?;
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            let relative = PathBuf::from(entry.file_name());
            if !self.filters.should_include(&relative) {
                log::debug!("Filtered out {}", relative.display());
                continue;
            }
            files.push(entry.path());
        }

        if let Some(limit) = limit.filter(|&n| n > 0) {
            files.truncate(limit);
        }
        Ok(files)
    }

    fn execute(
        &self,
        folder: &Path,
        plan: Vec<(PathBuf, String)>,
        options: &ClassifyOptions,
    ) -> ClassifyReport {
        let mut report = ClassifyReport {
            scanned: plan.len(),
            ..Default::default()
        };

        for (file, subfolder) in plan {
            match self.place(folder, &file, &subfolder, options.simulate) {
                Ok(destination) if options.simulate => {
                    report.planned.push(PlannedMove {
                        source: file,
                        destination,
                    });
                }
                Ok(destination) => {
                    log::debug!("Moved {} → {}", file.display(), destination.display());
                    report.batch.record_move(&file, &destination);
                    report.processed += 1;
                }
                Err(e) => {
                    log::error!("Could not organize {}: {}", file.display(), e);
                    report.failed.push(FileFailure {
                        path: file,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if options.simulate {
            log::info!(
                "Simulation: {} of {} files would move in {}",
                report.planned.len(),
                report.scanned,
                folder.display()
            );
        } else {
            log::info!(
                "Organized {} of {} files in {} ({} failed)",
                report.processed,
                report.scanned,
                folder.display(),
                report.failed.len()
            );
        }
        report
    }

    fn place(
        &self,
        folder: &Path,
        file: &Path,
        subfolder: &str,
        simulate: bool,
    ) -> EngineResult<PathBuf> {
        let target_dir = folder.join(subfolder);
        let file_name = file
            .file_name()
            .ok_or_else(|| EngineError::PathNotFound(file.to_path_buf()))?;

        if !simulate {
            ensure_dir(&target_dir)?;
        }
        let destination = conflict::resolve(&target_dir.join(file_name))?;

        if !simulate {
            retry_move(file, &destination, self.retry, &self.mover)?;
        }
        Ok(destination)
    }
}
