/// Integration tests for dirsort
///
/// These tests drive the engine the way the command line does: real files in
/// a temporary directory, a data directory holding the logs, and no retry
/// delay. Creation dates come from a fixed source.
///
/// Test categories:
/// 1. Classification workflows
/// 2. Batch undo and redo
/// 3. Per-action undo and redo
/// 4. History maintenance
/// 5. Scheduler passes
/// 6. Configuration
use chrono::{DateTime, Duration, Local, TimeZone};
use dirsort::classifier::{ClassifyOptions, OrganizeMode};
use dirsort::collaborators::FixedCreationDate;
use dirsort::config::EngineConfig;
use dirsort::engine::EngineState;
use dirsort::error::EngineError;
use dirsort::scheduler::{FolderOutcome, Frequency, Scheduler, WatchPreferences, WatchedFolderConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary workspace with an `inbox` folder to organize and a `data`
/// folder for the engine's logs.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(temp_dir.path().join("inbox")).expect("Failed to create inbox");
        TestFixture { temp_dir }
    }

    fn inbox(&self) -> PathBuf {
        self.temp_dir.path().join("inbox")
    }

    fn data_dir(&self) -> PathBuf {
        self.temp_dir.path().join("data")
    }

    fn config(&self) -> EngineConfig {
        let mut config = EngineConfig::with_data_dir(self.data_dir());
        config.engine.retry_delay_ms = 0;
        config
    }

    fn engine(&self) -> EngineState {
        self.engine_with(self.config())
    }

    fn engine_with(&self, config: EngineConfig) -> EngineState {
        let created = Local.with_ymd_and_hms(2022, 8, 14, 9, 30, 0).unwrap();
        EngineState::with_date_source(config, Box::new(FixedCreationDate(created)))
            .expect("Failed to open engine")
    }

    /// Create a file with content in the inbox.
    fn create_file(&self, rel_path: &str, content: &str) -> PathBuf {
        let path = self.inbox().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.inbox().join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_file_not_exists(&self, rel_path: &str) {
        let path = self.inbox().join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    /// Relative paths of every file under the inbox, sorted.
    fn list_files_recursive(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(self.inbox())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.path().strip_prefix(self.inbox()).ok().map(Path::to_path_buf))
            .collect();
        files.sort();
        files
    }
}

fn run(engine: &mut EngineState, folder: &Path, mode: OrganizeMode) -> dirsort::ClassifyReport {
    let options = engine.default_options();
    engine
        .classify(folder, mode, &options)
        .expect("Classification failed")
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

// ============================================================================
// Test Suite 1: Classification
// ============================================================================

#[test]
fn test_type_classification_sorts_into_categories() {
    let fixture = TestFixture::new();
    fixture.create_file("report.pdf", "pdf");
    fixture.create_file("photo.jpg", "jpg");

    let mut engine = fixture.engine();
    let report = run(&mut engine, &fixture.inbox(), OrganizeMode::Type);

    assert_eq!(report.processed, 2);
    fixture.assert_file_exists("Documents/report.pdf");
    fixture.assert_file_exists("Images/photo.jpg");
    fixture.assert_file_not_exists("report.pdf");
    fixture.assert_file_not_exists("photo.jpg");
}

#[test]
fn test_existing_destination_gets_counter_suffix() {
    let fixture = TestFixture::new();
    fixture.create_file("invoice_2023.pdf", "new");
    fixture.create_file("Documents/invoice_2023.pdf", "old");

    let mut engine = fixture.engine();
    let report = run(&mut engine, &fixture.inbox(), OrganizeMode::Type);

    assert_eq!(report.processed, 1);
    assert_eq!(
        report.batch.actions[0].destination,
        fixture.inbox().join("Documents").join("invoice_2023_(1).pdf")
    );
    assert_eq!(
        fs::read_to_string(fixture.inbox().join("Documents/invoice_2023.pdf")).unwrap(),
        "old"
    );
}

#[test]
fn test_name_classification_groups_versions() {
    let fixture = TestFixture::new();
    fixture.create_file("projectA_1.txt", "1");
    fixture.create_file("projectA_2.txt", "2");
    fixture.create_file("projectA_final.txt", "final");

    let mut engine = fixture.engine();
    let report = run(&mut engine, &fixture.inbox(), OrganizeMode::Name);

    assert_eq!(report.processed, 3);
    fixture.assert_file_exists("Projecta/projectA_1.txt");
    fixture.assert_file_exists("Projecta/projectA_2.txt");
    fixture.assert_file_exists("Projecta/projectA_final.txt");
}

#[test]
fn test_date_classification_buckets_by_year() {
    let fixture = TestFixture::new();
    fixture.create_file("scan.png", "png");
    fixture.create_file("notes.md", "md");

    let mut engine = fixture.engine();
    run(&mut engine, &fixture.inbox(), OrganizeMode::Date);

    fixture.assert_file_exists("2022/scan.png");
    fixture.assert_file_exists("2022/notes.md");
}

#[test]
fn test_resolved_destinations_were_free_and_sources_are_gone() {
    let fixture = TestFixture::new();
    fixture.create_file("a.txt", "a");
    fixture.create_file("Documents/a.txt", "taken");
    fixture.create_file("Documents/a_(1).txt", "taken");
    fixture.create_file("b.txt", "b");

    let before = fixture.list_files_recursive();
    let mut engine = fixture.engine();
    let report = run(&mut engine, &fixture.inbox(), OrganizeMode::Type);

    for action in &report.batch.actions {
        let relative = action.destination.strip_prefix(fixture.inbox()).unwrap();
        assert!(!before.contains(&relative.to_path_buf()));
        assert!(!action.source.exists());
        assert!(action.destination.exists());
    }
    fixture.assert_file_exists("Documents/a_(2).txt");
}

#[test]
fn test_second_run_moves_nothing() {
    for mode in [OrganizeMode::Type, OrganizeMode::Date, OrganizeMode::Name] {
        let fixture = TestFixture::new();
        fixture.create_file("draft_1.doc", "1");
        fixture.create_file("draft_2.doc", "2");
        fixture.create_file("song.mp3", "mp3");

        let mut engine = fixture.engine();
        run(&mut engine, &fixture.inbox(), mode);
        let layout = fixture.list_files_recursive();

        let second = run(&mut engine, &fixture.inbox(), mode);
        assert_eq!(second.processed, 0, "mode {} moved files twice", mode);
        assert_eq!(fixture.list_files_recursive(), layout);
    }
}

#[test]
fn test_dry_run_changes_nothing() {
    let fixture = TestFixture::new();
    fixture.create_file("report.pdf", "pdf");
    fixture.create_file("clip.mp4", "mp4");
    let before = fixture.list_files_recursive();

    let mut engine = fixture.engine();
    let options = ClassifyOptions {
        simulate: true,
        ..engine.default_options()
    };
    let report = engine
        .classify(&fixture.inbox(), OrganizeMode::Type, &options)
        .unwrap();

    assert_eq!(report.processed, 0);
    assert_eq!(report.planned.len(), 2);
    assert_eq!(fixture.list_files_recursive(), before);
    assert!(!fixture.inbox().join("Documents").exists());
    assert!(engine.batch_log().batches().unwrap().is_empty());
}

// ============================================================================
// Test Suite 2: Batch Undo and Redo
// ============================================================================

#[test]
fn test_undo_reverses_every_batch() {
    let fixture = TestFixture::new();
    let mut engine = fixture.engine();

    fixture.create_file("first.pdf", "1");
    run(&mut engine, &fixture.inbox(), OrganizeMode::Type);
    fixture.create_file("second.png", "2");
    run(&mut engine, &fixture.inbox(), OrganizeMode::Type);
    let logged = engine.batch_log().batches().unwrap();
    assert_eq!(logged.len(), 2);

    let report = engine.undo_last_batch().unwrap();

    assert_eq!(report.batches, 2);
    assert_eq!(report.restored_files, 2);
    fixture.assert_file_exists("first.pdf");
    fixture.assert_file_exists("second.png");
    assert!(engine.batch_log().batches().unwrap().is_empty());

    let undone = engine.batch_log().undone_batches().unwrap();
    assert_eq!(undone.len(), 2);
    assert_eq!(undone[0].actions, logged[0].actions);
    assert_eq!(undone[1].actions, logged[1].actions);
}

#[test]
fn test_undo_then_redo_restores_post_batch_layout() {
    let fixture = TestFixture::new();
    fixture.create_file("a.pdf", "a");
    fixture.create_file("b.gif", "b");
    fixture.create_file("c.zip", "c");

    let mut engine = fixture.engine();
    let report = run(&mut engine, &fixture.inbox(), OrganizeMode::Type);
    let after_batch = fixture.list_files_recursive();

    engine.undo_last_batch().unwrap();
    assert_ne!(fixture.list_files_recursive(), after_batch);

    let redo = engine.redo_last_undo().unwrap();
    assert_eq!(redo.replayed_files, 3);
    assert_eq!(fixture.list_files_recursive(), after_batch);

    let batches = engine.batch_log().batches().unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].actions, report.batch.actions);
    assert!(engine.batch_log().undone_batches().unwrap().is_empty());
}

#[test]
fn test_undo_reverses_newest_batch_first_and_keeps_every_file() {
    let fixture = TestFixture::new();
    let mut engine = fixture.engine();

    for content in ["v1", "v2", "v3"] {
        fixture.create_file("a.pdf", content);
        run(&mut engine, &fixture.inbox(), OrganizeMode::Type);
    }
    fixture.assert_file_exists("Documents/a_(2).pdf");

    let report = engine.undo_last_batch().unwrap();

    assert_eq!(report.restored_files, 3);
    assert_eq!(report.backups.len(), 2);
    // The oldest batch is reversed last, so its file ends on the original path
    assert_eq!(
        fs::read_to_string(fixture.inbox().join("a.pdf")).unwrap(),
        "v1"
    );
    let mut kept: Vec<String> = report
        .backups
        .iter()
        .map(|backup| fs::read_to_string(backup).unwrap())
        .collect();
    kept.sort();
    assert_eq!(kept, vec!["v2", "v3"]);
    assert!(!fixture.inbox().join("Documents").exists());
}

#[test]
fn test_undo_skips_files_moved_away_by_user() {
    let fixture = TestFixture::new();
    fixture.create_file("a.pdf", "a");
    fixture.create_file("b.pdf", "b");

    let mut engine = fixture.engine();
    run(&mut engine, &fixture.inbox(), OrganizeMode::Type);
    fs::remove_file(fixture.inbox().join("Documents/b.pdf")).unwrap();

    let report = engine.undo_last_batch().unwrap();
    assert_eq!(report.restored_files, 1);
    assert_eq!(report.skipped_files.len(), 1);
    fixture.assert_file_exists("a.pdf");
}

// ============================================================================
// Test Suite 3: Per-action Undo and Redo
// ============================================================================

#[test]
fn test_new_action_clears_redo() {
    let fixture = TestFixture::new();
    let file = fixture.create_file("a.txt", "a");
    let mut engine = fixture.engine();

    engine.rename_path(&file, "b.txt").unwrap();
    engine.undo().unwrap();
    assert!(engine.can_redo());

    engine.create_dir(&fixture.inbox().join("new_dir")).unwrap();
    assert!(!engine.can_redo());
    assert!(matches!(engine.redo(), Err(EngineError::NothingToRedo)));
}

#[test]
fn test_undo_on_empty_stack_has_no_effect() {
    let fixture = TestFixture::new();
    fixture.create_file("keep.txt", "k");
    let mut engine = fixture.engine();
    let before = fixture.list_files_recursive();

    assert!(matches!(engine.undo(), Err(EngineError::NothingToUndo)));
    assert_eq!(fixture.list_files_recursive(), before);
    assert!(!engine.can_redo());
}

#[test]
fn test_delete_is_undoable_from_trash() {
    let fixture = TestFixture::new();
    let file = fixture.create_file("letter.txt", "Dear reader");
    let mut engine = fixture.engine();

    let action = engine.delete_path(&file).unwrap();
    assert!(!file.exists());
    assert!(action.destination.starts_with(fixture.data_dir().join("trash")));

    engine.undo().unwrap();
    assert_eq!(fs::read_to_string(&file).unwrap(), "Dear reader");

    engine.redo().unwrap();
    assert!(!file.exists());
}

#[test]
fn test_copy_and_move_round_trip() {
    let fixture = TestFixture::new();
    let file = fixture.create_file("a.txt", "a");
    let archive = fixture.inbox().join("archive");
    let mut engine = fixture.engine();

    engine.create_dir(&archive).unwrap();
    let copy = engine.copy_path(&file, &archive).unwrap();
    let moved = engine.move_path(&file, &fixture.inbox().join("moved.txt")).unwrap();
    assert!(copy.destination.exists() && moved.destination.exists());

    engine.undo().unwrap();
    engine.undo().unwrap();
    engine.undo().unwrap();
    assert!(file.exists());
    assert!(!archive.exists());
    assert!(!engine.can_undo());
}

#[test]
fn test_undo_stack_survives_restart() {
    let fixture = TestFixture::new();
    let file = fixture.create_file("a.txt", "a");
    {
        let mut engine = fixture.engine();
        engine.rename_path(&file, "renamed.txt").unwrap();
    }

    let mut engine = fixture.engine();
    let undone = engine.undo().unwrap();
    assert_eq!(undone.source, file);
    fixture.assert_file_exists("a.txt");
}

// ============================================================================
// Test Suite 4: History
// ============================================================================

#[test]
fn test_history_is_bounded() {
    let fixture = TestFixture::new();
    let mut config = fixture.config();
    config.engine.history_max_entries = 4;
    config.engine.undo_capacity = 3;
    let mut engine = fixture.engine_with(config);

    for n in 0..6 {
        engine
            .create_file(&fixture.inbox().join(format!("f{}.txt", n)), b"x")
            .unwrap();
    }

    assert_eq!(engine.history().len(), 4);
    assert_eq!(engine.stack().undo_len(), 3);
    assert_eq!(
        engine.history().entries()[0].destination,
        fixture.inbox().join("f2.txt")
    );
}

#[test]
fn test_prune_and_export() {
    let fixture = TestFixture::new();
    let mut engine = fixture.engine();
    engine.create_dir(&fixture.inbox().join("one")).unwrap();
    engine.create_dir(&fixture.inbox().join("two")).unwrap();

    let csv = fixture.temp_dir.path().join("history.csv");
    engine
        .export_history(dirsort::ExportFormat::Csv, &csv)
        .unwrap();
    let content = fs::read_to_string(&csv).unwrap();
    assert!(content.starts_with("Date,Action,Source,Destination\n"));
    assert_eq!(content.lines().count(), 3);

    assert_eq!(engine.prune_history(Some(30), Local::now()).unwrap(), 0);
    let far_future = Local::now() + Duration::days(365);
    assert_eq!(engine.prune_history(Some(30), far_future).unwrap(), 2);
    assert!(engine.history().is_empty());
}

// ============================================================================
// Test Suite 5: Scheduler
// ============================================================================

fn watching(folders: Vec<(PathBuf, OrganizeMode, Frequency)>) -> Scheduler {
    let prefs = WatchPreferences {
        folders: folders
            .into_iter()
            .map(|(path, mode, frequency)| WatchedFolderConfig {
                path,
                mode,
                frequency,
            })
            .collect(),
    };
    Scheduler::new(prefs, std::time::Duration::ZERO)
}

#[test]
fn test_first_pass_runs_every_folder() {
    let fixture = TestFixture::new();
    fixture.create_file("a.pdf", "a");
    let missing = fixture.temp_dir.path().join("missing");
    let mut scheduler = watching(vec![
        (fixture.inbox(), OrganizeMode::Type, Frequency::Weekly),
        (missing.clone(), OrganizeMode::Type, Frequency::Daily),
    ]);
    let mut engine = fixture.engine();

    let outcomes = scheduler.run_pass(&mut engine, at(2024, 3, 10));

    assert_eq!(
        outcomes[0].1,
        FolderOutcome::Organized {
            processed: 1,
            failed: 0
        }
    );
    assert_eq!(outcomes[1], (missing, FolderOutcome::NotADirectory));
    fixture.assert_file_exists("Documents/a.pdf");
}

#[test]
fn test_folder_waits_for_its_interval() {
    let fixture = TestFixture::new();
    let mut scheduler = watching(vec![(fixture.inbox(), OrganizeMode::Type, Frequency::Daily)]);
    let mut engine = fixture.engine();

    scheduler.run_pass(&mut engine, at(2024, 3, 10));
    fixture.create_file("late.pdf", "late");

    let same_day = scheduler.run_pass(&mut engine, at(2024, 3, 10) + Duration::hours(3));
    assert_eq!(same_day[0].1, FolderOutcome::NotDue);
    fixture.assert_file_exists("late.pdf");

    let next_day = scheduler.run_pass(&mut engine, at(2024, 3, 11));
    assert!(matches!(next_day[0].1, FolderOutcome::Organized { processed: 1, .. }));
    fixture.assert_file_exists("Documents/late.pdf");
    assert_eq!(scheduler.last_run(&fixture.inbox()), Some(at(2024, 3, 11)));
}

#[test]
fn test_duplicate_paths_share_last_run() {
    let fixture = TestFixture::new();
    fixture.create_file("a.pdf", "a");
    let mut scheduler = watching(vec![
        (fixture.inbox(), OrganizeMode::Type, Frequency::Daily),
        (fixture.inbox(), OrganizeMode::Date, Frequency::Daily),
    ]);
    let mut engine = fixture.engine();

    let outcomes = scheduler.run_pass(&mut engine, at(2024, 3, 10));
    assert!(matches!(outcomes[0].1, FolderOutcome::Organized { .. }));
    assert_eq!(outcomes[1].1, FolderOutcome::NotDue);
}

#[test]
fn test_missing_preferences_is_fatal() {
    let fixture = TestFixture::new();
    let engine = fixture.engine();
    let result = WatchPreferences::load(&engine.config().preferences_path());
    assert!(matches!(result, Err(EngineError::ConfigMissing(_))));
}

// ============================================================================
// Test Suite 6: Configuration
// ============================================================================

#[test]
fn test_config_file_drives_categories_and_filters() {
    let fixture = TestFixture::new();
    let config_path = fixture.temp_dir.path().join("dirsort.toml");
    fs::write(
        &config_path,
        format!(
            r#"
[engine]
data_dir = "{}"
retry_delay_ms = 0

[filters.exclude]
extensions = ["part"]

[[categories]]
name = "Papers"
extensions = [".pdf"]
"#,
            fixture.data_dir().display()
        ),
    )
    .unwrap();
    fixture.create_file("thesis.pdf", "pdf");
    fixture.create_file("video.mkv.part", "partial");
    fixture.create_file("photo.jpg", "jpg");

    let config = EngineConfig::load(Some(&config_path)).unwrap();
    let mut engine = fixture.engine_with(config);
    run(&mut engine, &fixture.inbox(), OrganizeMode::Type);

    fixture.assert_file_exists("Papers/thesis.pdf");
    fixture.assert_file_exists("video.mkv.part");
    // Not in the custom table: capitalized extension
    fixture.assert_file_exists("Jpg/photo.jpg");
}

#[test]
fn test_batch_log_lives_in_data_dir() {
    let fixture = TestFixture::new();
    fixture.create_file("a.pdf", "a");
    let mut engine = fixture.engine();
    run(&mut engine, &fixture.inbox(), OrganizeMode::Type);

    let log = fs::read_to_string(fixture.data_dir().join("organisations.jsonl")).unwrap();
    assert_eq!(log.lines().count(), 1);
    let line: serde_json::Value = serde_json::from_str(log.trim()).unwrap();
    assert_eq!(line[0]["kind"]["type"], "move");
}
