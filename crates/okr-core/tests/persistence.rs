use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tempfile::tempdir;

use okr_core::export::export_document;
use okr_core::snapshot::{
    export_to_file, import_from_file, persist, DirSnapshotStore, SnapshotStore,
};
use okr_core::storage::{MonthlyUpdate, NewKeyResult, NewObjective, OkrStore, SqliteStore};
use okr_core::{OkrError, Session, TrackingWindow};

fn window() -> TrackingWindow {
    TrackingWindow::new("2025-10", "2026-03").expect("valid window")
}

fn seeded_store() -> SqliteStore {
    let store = SqliteStore::create(window()).expect("create store");
    let objective_id = store
        .create_objective(&NewObjective::new("Grow ARR", "Alex").with_description("FY26"))
        .expect("objective");
    let kr_id = store
        .create_key_result(
            &NewKeyResult::new(objective_id, "New logos", "Signed deals").with_unit("deals"),
        )
        .expect("key result");
    store
        .update_monthly_data(
            kr_id,
            "2025-11",
            &MonthlyUpdate::new().target(10.0).actual(7.0),
        )
        .expect("monthly update");
    store
        .upsert_comment(objective_id, "2025-11", "good pipeline month")
        .expect("comment");
    store
}

#[test]
fn test_snapshot_round_trip_preserves_composite_read() {
    let store = seeded_store();
    let before = store.objectives_with_details().expect("details");

    let bytes = store.to_bytes().expect("serialize");
    let (restored, migrated) = SqliteStore::from_bytes(&bytes, window()).expect("deserialize");
    assert!(!migrated);

    let after = restored.objectives_with_details().expect("details");
    assert_eq!(before, after);
}

#[test]
fn test_export_import_file_round_trip() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("backup.db");

    let store = seeded_store();
    let before = store.objectives_with_details().expect("details");
    export_to_file(&store, &path).expect("export");

    let imported = import_from_file(&path, window()).expect("import");
    let after = imported.objectives_with_details().expect("details");
    assert_eq!(before, after);
}

#[test]
fn test_import_rejects_non_database_file() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("junk.db");
    fs::write(&path, b"this is not a sqlite image at all").expect("write junk");

    let err = import_from_file(&path, window()).expect_err("junk should fail");
    assert!(matches!(err, OkrError::Validation(_)), "got {:?}", err);
}

#[test]
fn test_import_rejects_database_missing_core_tables() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("other.db");

    // A perfectly valid SQLite image, but not ours.
    let conn = rusqlite::Connection::open_in_memory().expect("open");
    conn.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT);")
        .expect("schema");
    let image = conn
        .serialize(rusqlite::DatabaseName::Main)
        .expect("serialize");
    fs::write(&path, image.as_ref()).expect("write");

    let err = import_from_file(&path, window()).expect_err("foreign db should fail");
    match err {
        OkrError::Validation(message) => {
            assert!(message.contains("missing required tables"), "{}", message)
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_failed_import_leaves_prior_snapshot_untouched() {
    let dir = tempdir().expect("tempdir");
    let snapshots = DirSnapshotStore::new(dir.path().join("data"));

    let store = seeded_store();
    persist(&store, &snapshots).expect("persist");
    let saved = snapshots.load().expect("load").expect("exists");

    let junk = dir.path().join("junk.db");
    fs::write(&junk, b"garbage").expect("write junk");
    assert!(import_from_file(&junk, window()).is_err());

    assert_eq!(
        snapshots.load().expect("load").expect("exists"),
        saved,
        "snapshot must be unchanged after a failed import"
    );
}

#[test]
fn test_session_first_run_creates_and_persists() {
    let dir = tempdir().expect("tempdir");
    let snapshots = Arc::new(DirSnapshotStore::new(dir.path().join("data")));

    assert!(snapshots.load().expect("load").is_none());
    let session = Session::initialize(snapshots.clone(), window()).expect("initialize");
    assert!(snapshots.load().expect("load").is_some());

    session
        .store()
        .create_objective(&NewObjective::new("Obj", "Alex"))
        .expect("objective");
    session.close().expect("close");

    // A second session sees the closed state.
    let session = Session::initialize(snapshots, window()).expect("re-initialize");
    assert_eq!(session.store().objectives().expect("objectives").len(), 1);
}

#[test]
fn test_session_migrates_legacy_snapshot_and_repersists() {
    let dir = tempdir().expect("tempdir");
    let snapshots = Arc::new(DirSnapshotStore::new(dir.path().join("data")));

    // Hand-build a v1-era image: baseline tables, no inverse_metric or
    // driver columns, version history stopped at 1.
    let conn = rusqlite::Connection::open_in_memory().expect("open");
    conn.execute_batch(
        r#"
        CREATE TABLE objectives (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL CHECK(length(title) <= 200),
            description TEXT,
            created_date TEXT DEFAULT CURRENT_TIMESTAMP,
            modified_date TEXT DEFAULT CURRENT_TIMESTAMP
        );
        CREATE TABLE key_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            objective_id INTEGER NOT NULL,
            title TEXT NOT NULL CHECK(length(title) <= 200),
            metric TEXT NOT NULL CHECK(length(metric) <= 100),
            unit TEXT,
            created_date TEXT DEFAULT CURRENT_TIMESTAMP,
            modified_date TEXT DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (objective_id) REFERENCES objectives(id) ON DELETE CASCADE
        );
        CREATE TABLE monthly_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            key_result_id INTEGER NOT NULL,
            month TEXT NOT NULL CHECK(length(month) = 7),
            target REAL NOT NULL DEFAULT 0 CHECK(target >= 0),
            actual REAL NOT NULL DEFAULT 0 CHECK(actual >= 0),
            last_updated TEXT DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (key_result_id) REFERENCES key_results(id) ON DELETE CASCADE,
            UNIQUE(key_result_id, month)
        );
        CREATE TABLE objective_comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            objective_id INTEGER NOT NULL,
            month TEXT NOT NULL CHECK(length(month) = 7),
            comment TEXT CHECK(length(comment) <= 2000),
            last_updated TEXT DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (objective_id) REFERENCES objectives(id) ON DELETE CASCADE,
            UNIQUE(objective_id, month)
        );
        CREATE TABLE schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT CURRENT_TIMESTAMP
        );
        INSERT INTO schema_version (version) VALUES (1);
        INSERT INTO objectives (title, description) VALUES ('Legacy objective', 'pre-driver era');
        "#,
    )
    .expect("legacy schema");
    let image = conn
        .serialize(rusqlite::DatabaseName::Main)
        .expect("serialize");
    snapshots.save(image.as_ref()).expect("seed snapshot");
    let legacy_blob = snapshots.load().expect("load").expect("exists");

    let session = Session::initialize(snapshots.clone(), window()).expect("initialize");
    let objectives = session.store().objectives().expect("objectives");
    assert_eq!(objectives.len(), 1);
    assert_eq!(objectives[0].driver, "", "driver backfills as empty string");

    // Migration re-persisted the snapshot.
    let migrated_blob = snapshots.load().expect("load").expect("exists");
    assert_ne!(legacy_blob, migrated_blob);

    // A second initialize applies nothing and leaves the blob alone.
    drop(session);
    let session = Session::initialize(snapshots.clone(), window()).expect("re-initialize");
    drop(session);
    assert_eq!(
        snapshots.load().expect("load").expect("exists"),
        migrated_blob
    );
}

#[test]
fn test_autosaver_snapshots_and_disarms_on_drop() {
    let dir = tempdir().expect("tempdir");
    let snapshots = Arc::new(DirSnapshotStore::new(dir.path().join("data")));

    let session = Session::initialize(snapshots.clone(), window()).expect("initialize");
    let initial = snapshots.load().expect("load").expect("exists");

    let saver = session.start_autosave(Duration::from_millis(25));
    session
        .store()
        .create_objective(&NewObjective::new("Background save me", "Alex"))
        .expect("objective");

    let mut saved = false;
    for _ in 0..40 {
        std::thread::sleep(Duration::from_millis(25));
        if snapshots.load().expect("load").expect("exists") != initial {
            saved = true;
            break;
        }
    }
    assert!(saved, "autosaver should have persisted the mutation");

    drop(saver);
    let after_drop = snapshots.load().expect("load").expect("exists");

    // Mutate after disarm; no further snapshot may appear.
    session
        .store()
        .create_objective(&NewObjective::new("Post-teardown", "Alex"))
        .expect("objective");
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(
        snapshots.load().expect("load").expect("exists"),
        after_drop,
        "a dropped autosaver must not keep writing"
    );
}

#[test]
fn test_export_document_shape() {
    let store = seeded_store();
    let document = export_document(&store).expect("export document");

    assert_eq!(document.version, "1.0");
    assert_eq!(document.data.objectives.len(), 1);
    assert_eq!(document.data.key_results.len(), 1);
    assert_eq!(document.data.monthly_data.len(), 6);
    assert_eq!(document.data.objective_comments.len(), 6);

    let json = serde_json::to_value(&document).expect("to json");
    assert!(json.get("exported_at").is_some());
    assert_eq!(json["data"]["objectives"][0]["title"], "Grow ARR");
    // The inverse flag serializes as a bool at this boundary.
    assert_eq!(json["data"]["key_results"][0]["inverse_metric"], false);
}
