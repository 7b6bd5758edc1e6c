//! Snapshot persistence.
//!
//! The whole database round-trips as one opaque binary blob: into a fixed
//! key in a local store for durability, and through user-initiated file
//! export/import for backup and interchange. The blob format is the raw
//! SQLite image produced by [`SqliteStore::to_bytes`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{OkrError, Result};
use crate::storage::SqliteStore;
use crate::window::TrackingWindow;

/// Fixed key the snapshot lives under inside the store directory.
pub const SNAPSHOT_KEY: &str = "okr.db";

/// Interval between opportunistic background snapshots.
pub const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Durable home for the serialized database.
///
/// `save` is an idempotent overwrite of the single snapshot slot; `load`
/// returns `None` on first run. Concurrent writers to the same slot are
/// last-write-wins (acknowledged limitation).
pub trait SnapshotStore: Send + Sync {
    /// Overwrite the snapshot slot with a new blob.
    fn save(&self, bytes: &[u8]) -> Result<()>;

    /// The last-saved blob, or `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<Vec<u8>>>;
}

/// Snapshot store backed by a single file in a local directory.
#[derive(Debug, Clone)]
pub struct DirSnapshotStore {
    dir: PathBuf,
}

impl DirSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The file the snapshot lives in (useful for out-of-band backup).
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_KEY)
    }
}

impl SnapshotStore for DirSnapshotStore {
    fn save(&self, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        write_atomic(&self.snapshot_path(), bytes)
    }

    fn load(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(self.snapshot_path()) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Serialize the store and write it to the snapshot slot.
pub fn persist(store: &SqliteStore, snapshots: &dyn SnapshotStore) -> Result<()> {
    let bytes = store.to_bytes()?;
    snapshots.save(&bytes)
}

/// Serialize the store into a standalone database file.
pub fn export_to_file(store: &SqliteStore, path: &Path) -> Result<()> {
    let bytes = store.to_bytes()?;
    write_atomic(path, &bytes)
}

/// Build a fresh store from a user-supplied database file.
///
/// The file is rejected with a `Validation` error unless it is a SQLite
/// image containing the three core tables; this guards against loading
/// an unrelated or corrupt binary. On failure nothing is persisted; prior
/// snapshot state is untouched.
pub fn import_from_file(path: &Path, window: TrackingWindow) -> Result<SqliteStore> {
    let bytes = fs::read(path)
        .map_err(|e| OkrError::Storage(format!("Failed to read {}: {}", path.display(), e)))?;

    validate_okr_image(&bytes)?;

    let (store, _) = SqliteStore::from_bytes(&bytes, window)?;
    Ok(store)
}

/// Check that a blob is a SQLite image with the core OKR tables.
fn validate_okr_image(bytes: &[u8]) -> Result<()> {
    let conn = SqliteStore::open_image(bytes)
        .map_err(|_| OkrError::Validation("Invalid database file: not a SQLite image".to_string()))?;

    let core_tables: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type = 'table'
               AND name IN ('objectives', 'key_results', 'monthly_data')",
            [],
            |row| row.get(0),
        )
        .map_err(|_| OkrError::Validation("Invalid database file: not a SQLite image".to_string()))?;

    if core_tables < 3 {
        return Err(OkrError::Validation(
            "Invalid database file: missing required tables".to_string(),
        ));
    }
    Ok(())
}

/// Background snapshot timer.
///
/// Saves the store into the snapshot slot on a fixed interval until
/// dropped. Failures are logged and the timer keeps running; dropping the
/// guard disarms the timer and joins the thread so no write dangles past
/// teardown.
pub struct Autosaver {
    stop: mpsc::Sender<()>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Autosaver {
    pub fn start(
        store: Arc<SqliteStore>,
        snapshots: Arc<dyn SnapshotStore>,
        interval: Duration,
    ) -> Self {
        let (stop, ticks) = mpsc::channel();
        let handle = thread::spawn(move || loop {
            match ticks.recv_timeout(interval) {
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    match persist(&store, snapshots.as_ref()) {
                        Ok(()) => debug!("auto-backup completed"),
                        Err(err) => warn!("auto-backup failed: {}", err),
                    }
                }
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }
}

impl Drop for Autosaver {
    fn drop(&mut self) {
        let _ = self.stop.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Write through a temp file and rename into place, so a crashed write
/// never leaves a truncated snapshot behind.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp = path.with_extension("tmp");
    fs::write(&temp, bytes)?;
    if let Err(initial_err) = fs::rename(&temp, path) {
        // Some platforms refuse to rename over an existing file.
        let _ = fs::remove_file(path);
        if let Err(retry_err) = fs::rename(&temp, path) {
            let _ = fs::remove_file(&temp);
            return Err(OkrError::Storage(format!(
                "Atomic rename failed (initial: {}, retry: {})",
                initial_err, retry_err
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_before_any_save_is_none() {
        let dir = tempdir().unwrap();
        let store = DirSnapshotStore::new(dir.path().join("data"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_overwrites_previous_snapshot() {
        let dir = tempdir().unwrap();
        let store = DirSnapshotStore::new(dir.path());

        store.save(b"first").unwrap();
        store.save(b"second").unwrap();

        assert_eq!(store.load().unwrap().as_deref(), Some(&b"second"[..]));
        // No temp file left behind.
        assert!(!dir.path().join("okr.tmp").exists());
    }

    #[test]
    fn test_validate_rejects_arbitrary_bytes() {
        let err = validate_okr_image(b"definitely not a database").unwrap_err();
        assert!(matches!(err, OkrError::Validation(_)));
    }
}
