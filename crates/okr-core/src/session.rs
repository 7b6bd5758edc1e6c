//! Explicit database lifecycle.
//!
//! A [`Session`] owns the store handle and the snapshot store together:
//! initialization loads (or creates) and migrates the database,
//! `persist` snapshots it on demand, and `close` is the explicit
//! release. There is no module-level singleton to reach for, so nothing
//! can touch the database before initialization has finished.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::error::Result;
use crate::snapshot::{persist, Autosaver, SnapshotStore};
use crate::storage::SqliteStore;
use crate::window::TrackingWindow;

/// An initialized database plus its durable home.
pub struct Session {
    store: Arc<SqliteStore>,
    snapshots: Arc<dyn SnapshotStore>,
}

impl Session {
    /// Load the persisted snapshot (or create a fresh database on first
    /// run), migrate it forward, and re-persist when a migration was
    /// applied.
    ///
    /// # Errors
    ///
    /// Migration failure is fatal here: no session is handed out over a
    /// malformed schema.
    pub fn initialize(
        snapshots: Arc<dyn SnapshotStore>,
        window: TrackingWindow,
    ) -> Result<Self> {
        let store = match snapshots.load()? {
            Some(bytes) => {
                let (store, migrated) = SqliteStore::from_bytes(&bytes, window)?;
                if migrated {
                    info!("schema migrated, re-persisting snapshot");
                    persist(&store, snapshots.as_ref())?;
                }
                store
            }
            None => {
                info!("no snapshot found, creating a fresh database");
                let store = SqliteStore::create(window)?;
                persist(&store, snapshots.as_ref())?;
                store
            }
        };

        Ok(Self {
            store: Arc::new(store),
            snapshots,
        })
    }

    /// The query-layer handle.
    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    /// A shareable handle, e.g. for the autosaver.
    pub fn shared_store(&self) -> Arc<SqliteStore> {
        Arc::clone(&self.store)
    }

    /// Snapshot the current state into the durable slot.
    pub fn persist(&self) -> Result<()> {
        persist(&self.store, self.snapshots.as_ref())
    }

    /// Swap in a different store (the import flow) and persist it.
    ///
    /// An autosaver armed before the swap keeps snapshotting the old
    /// handle; arm autosave after adopting.
    pub fn adopt(&mut self, store: SqliteStore) -> Result<()> {
        self.store = Arc::new(store);
        self.persist()
    }

    /// Arm the periodic background snapshot. The returned guard disarms
    /// it when dropped.
    pub fn start_autosave(&self, interval: Duration) -> Autosaver {
        Autosaver::start(self.shared_store(), Arc::clone(&self.snapshots), interval)
    }

    /// Tear down, persisting one last time.
    pub fn close(self) -> Result<()> {
        self.persist()
    }
}
