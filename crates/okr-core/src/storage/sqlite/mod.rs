//! SQLite-backed store.
//!
//! The database lives entirely in memory and round-trips through
//! `Connection::serialize` / `Connection::deserialize`; durability is the
//! persistence adapter's job (see [`crate::snapshot`]). Foreign-key
//! enforcement is switched on and asserted at every open, since cascade
//! delete depends on it.

pub mod migrations;
mod row;
mod validation;

use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::serialize::OwnedData;
use rusqlite::{Connection, DatabaseName, OptionalExtension};

use crate::error::{OkrError, Result};
use crate::storage::traits::OkrStore;
use crate::storage::types::{
    KeyResult, KeyResultEdit, KeyResultWithData, MonthlyData, MonthlyUpdate, NewKeyResult,
    NewObjective, Objective, ObjectiveComment, ObjectiveEdit, ObjectiveWithDetails,
};
use crate::window::TrackingWindow;

use row::{inverse_to_db, CommentRow, KeyResultRow, MonthlyDataRow, ObjectiveRow};
use validation::{
    validate_comment_text, validate_key_result_fields, validate_monthly_update,
    validate_objective_fields,
};

/// Embedded SQLite implementation of the query layer.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    window: TrackingWindow,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Create a fresh database at the latest schema, with a full version
    /// history.
    pub fn create(window: TrackingWindow) -> Result<Self> {
        let conn = Self::new_connection()?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            window,
        })
    }

    /// Reconstruct a store from a serialized database image, migrating it
    /// forward if needed.
    ///
    /// The second element reports whether any migration was applied; the
    /// caller should re-persist the blob when it is `true`.
    pub fn from_bytes(bytes: &[u8], window: TrackingWindow) -> Result<(Self, bool)> {
        let conn = Self::open_image(bytes)?;
        let migrated = migrations::run(&conn)?;
        Ok((
            Self {
                conn: Mutex::new(conn),
                window,
            },
            migrated,
        ))
    }

    /// Open a connection over a raw database image without migrating it.
    /// The import path uses this to inspect a candidate file before
    /// accepting it.
    pub(crate) fn open_image(bytes: &[u8]) -> Result<Connection> {
        let mut conn = Self::new_connection()?;
        let owned = Self::owned_data_from_bytes(bytes)?;
        conn.deserialize(DatabaseName::Main, owned, false)?;
        Self::assert_foreign_keys(&conn)?;
        Ok(conn)
    }

    /// Serialize the full database to its binary image.
    ///
    /// Safe to call repeatedly; the snapshot and file-export paths both
    /// go through here.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let conn = self.lock_conn()?;
        let data = conn.serialize(DatabaseName::Main)?;
        Ok(data.as_ref().to_vec())
    }

    /// The tracking window monthly rows are provisioned for.
    pub fn window(&self) -> &TrackingWindow {
        &self.window
    }

    /// Verify referential integrity and basic shape invariants.
    pub fn check_integrity(&self) -> Result<()> {
        let conn = self.lock_conn()?;

        for table in [
            "objectives",
            "key_results",
            "monthly_data",
            "objective_comments",
            "schema_version",
        ] {
            if !migrations::table_exists(&conn, table)? {
                return Err(OkrError::Storage(format!("Missing table: {}", table)));
            }
        }

        let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
        let mut rows = stmt.query([])?;
        if rows.next()?.is_some() {
            return Err(OkrError::Storage(
                "Foreign key integrity check failed".to_string(),
            ));
        }

        let malformed: i64 = conn.query_row(
            "SELECT (SELECT COUNT(*) FROM monthly_data WHERE length(month) != 7)
                  + (SELECT COUNT(*) FROM objective_comments WHERE length(month) != 7)",
            [],
            |row| row.get(0),
        )?;
        if malformed > 0 {
            return Err(OkrError::Storage(format!(
                "{} rows have malformed month values",
                malformed
            )));
        }

        let versions: i64 =
            conn.query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))?;
        if versions == 0 {
            return Err(OkrError::Storage(
                "Version history is empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Key results whose monthly coverage is narrower than the configured
    /// window (for example after the window was extended; rows are only
    /// provisioned at creation time).
    pub fn underprovisioned_key_results(&self) -> Result<Vec<i64>> {
        let expected = self.window.months().len() as i64;
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT kr.id
             FROM key_results kr
             LEFT JOIN monthly_data md ON md.key_result_id = kr.id
             GROUP BY kr.id
             HAVING COUNT(md.id) < ?
             ORDER BY kr.id",
        )?;
        let ids = stmt
            .query_map([expected], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    /// Lock the database connection, returning an error if the mutex is
    /// poisoned.
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| OkrError::Storage("SQLite connection poisoned".to_string()))
    }

    fn new_connection() -> Result<Connection> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::assert_foreign_keys(&conn)?;
        Ok(conn)
    }

    /// Cascade delete only works while the pragma is active, so its state
    /// is asserted rather than assumed.
    fn assert_foreign_keys(conn: &Connection) -> Result<()> {
        let enabled: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
        if enabled != 1 {
            return Err(OkrError::Storage(
                "Foreign key enforcement is not active".to_string(),
            ));
        }
        Ok(())
    }

    fn owned_data_from_bytes(bytes: &[u8]) -> Result<OwnedData> {
        if bytes.is_empty() {
            return Err(OkrError::Storage("SQLite payload is empty".to_string()));
        }

        let size: i32 = bytes
            .len()
            .try_into()
            .map_err(|_| OkrError::Storage("SQLite payload too large".to_string()))?;
        let raw = unsafe { rusqlite::ffi::sqlite3_malloc(size) as *mut u8 };
        if raw.is_null() {
            return Err(OkrError::Storage("SQLite allocation failed".to_string()));
        }

        // Allocate with sqlite3_malloc so SQLite can own the buffer on
        // deserialize.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), raw, bytes.len());
            let ptr = NonNull::new(raw)
                .ok_or_else(|| OkrError::Storage("SQLite allocation returned null".to_string()))?;
            Ok(OwnedData::from_raw_nonnull(ptr, bytes.len()))
        }
    }

    fn objective_exists(conn: &Connection, id: i64) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row("SELECT id FROM objectives WHERE id = ?", [id], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(found.is_some())
    }
}

impl OkrStore for SqliteStore {
    fn create_objective(&self, objective: &NewObjective) -> Result<i64> {
        validate_objective_fields(&objective.title, &objective.driver)?;

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "INSERT INTO objectives (title, description, driver, created_date, modified_date)
             VALUES (?, ?, ?, ?, ?)",
            (
                &objective.title,
                objective.description.as_deref().unwrap_or(""),
                &objective.driver,
                &now,
                &now,
            ),
        )?;
        let id = tx.last_insert_rowid();

        // Provision an empty comment slot per month in the window.
        {
            let mut stmt = tx.prepare(
                "INSERT INTO objective_comments (objective_id, month, comment, last_updated)
                 VALUES (?, ?, '', ?)",
            )?;
            for month in self.window.months() {
                stmt.execute((id, &month, &now))?;
            }
        }

        tx.commit()?;
        Ok(id)
    }

    fn update_objective(&self, id: i64, edit: &ObjectiveEdit) -> Result<()> {
        validate_objective_fields(&edit.title, &edit.driver)?;

        let conn = self.lock_conn()?;
        let affected = conn.execute(
            "UPDATE objectives SET title = ?, description = ?, driver = ?, modified_date = ?
             WHERE id = ?",
            (
                &edit.title,
                edit.description.as_deref().unwrap_or(""),
                &edit.driver,
                Utc::now().to_rfc3339(),
                id,
            ),
        )?;
        if affected == 0 {
            return Err(OkrError::NotFound(format!("Objective {}", id)));
        }
        Ok(())
    }

    fn delete_objective(&self, id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        let affected = conn.execute("DELETE FROM objectives WHERE id = ?", [id])?;
        if affected == 0 {
            return Err(OkrError::NotFound(format!("Objective {}", id)));
        }
        Ok(())
    }

    fn objective(&self, id: i64) -> Result<Option<Objective>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                "SELECT id, title, description, driver, created_date, modified_date
                 FROM objectives WHERE id = ?",
                [id],
                |row| {
                    Ok(ObjectiveRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        description: row.get(2)?,
                        driver: row.get(3)?,
                        created_date: row.get(4)?,
                        modified_date: row.get(5)?,
                    })
                },
            )
            .optional()?;
        row.map(Objective::try_from).transpose()
    }

    fn objectives(&self) -> Result<Vec<Objective>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, description, driver, created_date, modified_date
             FROM objectives ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ObjectiveRow {
                id: row.get(0)?,
                title: row.get(1)?,
                description: row.get(2)?,
                driver: row.get(3)?,
                created_date: row.get(4)?,
                modified_date: row.get(5)?,
            })
        })?;

        let mut objectives = Vec::new();
        for row in rows {
            objectives.push(Objective::try_from(row?)?);
        }
        Ok(objectives)
    }

    fn create_key_result(&self, key_result: &NewKeyResult) -> Result<i64> {
        validate_key_result_fields(&key_result.title, &key_result.metric)?;

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        if !Self::objective_exists(&tx, key_result.objective_id)? {
            return Err(OkrError::NotFound(format!(
                "Objective {}",
                key_result.objective_id
            )));
        }

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO key_results
                 (objective_id, title, metric, unit, inverse_metric, created_date, modified_date)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            (
                key_result.objective_id,
                &key_result.title,
                &key_result.metric,
                key_result.unit.as_deref().unwrap_or(""),
                inverse_to_db(key_result.inverse_metric),
                &now,
                &now,
            ),
        )?;
        let id = tx.last_insert_rowid();

        // Provision a zeroed row per month in the window.
        {
            let mut stmt = tx.prepare(
                "INSERT INTO monthly_data (key_result_id, month, target, actual, last_updated)
                 VALUES (?, ?, 0, 0, ?)",
            )?;
            for month in self.window.months() {
                stmt.execute((id, &month, &now))?;
            }
        }

        tx.commit()?;
        Ok(id)
    }

    fn update_key_result(&self, id: i64, edit: &KeyResultEdit) -> Result<()> {
        validate_key_result_fields(&edit.title, &edit.metric)?;

        let conn = self.lock_conn()?;
        let affected = conn.execute(
            "UPDATE key_results
             SET title = ?, metric = ?, unit = ?, inverse_metric = ?, modified_date = ?
             WHERE id = ?",
            (
                &edit.title,
                &edit.metric,
                edit.unit.as_deref().unwrap_or(""),
                inverse_to_db(edit.inverse_metric),
                Utc::now().to_rfc3339(),
                id,
            ),
        )?;
        if affected == 0 {
            return Err(OkrError::NotFound(format!("Key result {}", id)));
        }
        Ok(())
    }

    fn delete_key_result(&self, id: i64) -> Result<()> {
        let conn = self.lock_conn()?;
        let affected = conn.execute("DELETE FROM key_results WHERE id = ?", [id])?;
        if affected == 0 {
            return Err(OkrError::NotFound(format!("Key result {}", id)));
        }
        Ok(())
    }

    fn key_results_for(&self, objective_id: i64) -> Result<Vec<KeyResult>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, objective_id, title, metric, unit, inverse_metric,
                    created_date, modified_date
             FROM key_results WHERE objective_id = ? ORDER BY id",
        )?;
        let rows = stmt.query_map([objective_id], key_result_row)?;

        let mut key_results = Vec::new();
        for row in rows {
            key_results.push(KeyResult::try_from(row?)?);
        }
        Ok(key_results)
    }

    fn all_key_results(&self) -> Result<Vec<KeyResult>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, objective_id, title, metric, unit, inverse_metric,
                    created_date, modified_date
             FROM key_results ORDER BY objective_id, id",
        )?;
        let rows = stmt.query_map([], key_result_row)?;

        let mut key_results = Vec::new();
        for row in rows {
            key_results.push(KeyResult::try_from(row?)?);
        }
        Ok(key_results)
    }

    fn monthly_data_for(&self, key_result_id: i64) -> Result<Vec<MonthlyData>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, key_result_id, month, target, actual, last_updated
             FROM monthly_data WHERE key_result_id = ? ORDER BY month",
        )?;
        let rows = stmt.query_map([key_result_id], monthly_data_row)?;

        let mut monthly = Vec::new();
        for row in rows {
            monthly.push(MonthlyData::try_from(row?)?);
        }
        Ok(monthly)
    }

    fn monthly_data_for_month(&self, month: &str) -> Result<Vec<MonthlyData>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, key_result_id, month, target, actual, last_updated
             FROM monthly_data WHERE month = ? ORDER BY key_result_id",
        )?;
        let rows = stmt.query_map([month], monthly_data_row)?;

        let mut monthly = Vec::new();
        for row in rows {
            monthly.push(MonthlyData::try_from(row?)?);
        }
        Ok(monthly)
    }

    fn update_monthly_data(
        &self,
        key_result_id: i64,
        month: &str,
        update: &MonthlyUpdate,
    ) -> Result<usize> {
        if update.is_empty() {
            return Ok(0);
        }
        validate_monthly_update(month, update)?;

        let mut sets: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(target) = update.target {
            sets.push("target = ?");
            params.push(Box::new(target));
        }
        if let Some(actual) = update.actual {
            sets.push("actual = ?");
            params.push(Box::new(actual));
        }
        sets.push("last_updated = ?");
        params.push(Box::new(Utc::now().to_rfc3339()));
        params.push(Box::new(key_result_id));
        params.push(Box::new(month.to_string()));

        let sql = format!(
            "UPDATE monthly_data SET {} WHERE key_result_id = ? AND month = ?",
            sets.join(", ")
        );

        let conn = self.lock_conn()?;
        let affected = conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?;
        Ok(affected)
    }

    fn comments_for(&self, objective_id: i64) -> Result<Vec<ObjectiveComment>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, objective_id, month, comment, last_updated
             FROM objective_comments WHERE objective_id = ? ORDER BY month",
        )?;
        let rows = stmt.query_map([objective_id], comment_row)?;

        let mut comments = Vec::new();
        for row in rows {
            comments.push(ObjectiveComment::try_from(row?)?);
        }
        Ok(comments)
    }

    fn comment_for_month(
        &self,
        objective_id: i64,
        month: &str,
    ) -> Result<Option<ObjectiveComment>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                "SELECT id, objective_id, month, comment, last_updated
                 FROM objective_comments WHERE objective_id = ? AND month = ?",
                (objective_id, month),
                comment_row,
            )
            .optional()?;
        row.map(ObjectiveComment::try_from).transpose()
    }

    fn upsert_comment(&self, objective_id: i64, month: &str, comment: &str) -> Result<()> {
        crate::window::ensure_month(month)?;
        validate_comment_text(comment)?;

        let conn = self.lock_conn()?;
        if !Self::objective_exists(&conn, objective_id)? {
            return Err(OkrError::NotFound(format!("Objective {}", objective_id)));
        }

        conn.execute(
            "INSERT INTO objective_comments (objective_id, month, comment, last_updated)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(objective_id, month) DO UPDATE SET
                 comment = excluded.comment,
                 last_updated = excluded.last_updated",
            (objective_id, month, comment, Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    fn objective_with_details(&self, id: i64) -> Result<Option<ObjectiveWithDetails>> {
        let objective = match self.objective(id)? {
            Some(objective) => objective,
            None => return Ok(None),
        };

        let mut key_results = Vec::new();
        for key_result in self.key_results_for(id)? {
            let monthly_data = self.monthly_data_for(key_result.id)?;
            key_results.push(KeyResultWithData {
                key_result,
                monthly_data,
            });
        }
        let comments = self.comments_for(id)?;

        Ok(Some(ObjectiveWithDetails {
            objective,
            key_results,
            comments,
        }))
    }

    fn objectives_with_details(&self) -> Result<Vec<ObjectiveWithDetails>> {
        let mut details = Vec::new();
        for objective in self.objectives()? {
            let id = objective.id;
            let mut key_results = Vec::new();
            for key_result in self.key_results_for(id)? {
                let monthly_data = self.monthly_data_for(key_result.id)?;
                key_results.push(KeyResultWithData {
                    key_result,
                    monthly_data,
                });
            }
            let comments = self.comments_for(id)?;
            details.push(ObjectiveWithDetails {
                objective,
                key_results,
                comments,
            });
        }
        Ok(details)
    }
}

fn key_result_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<KeyResultRow> {
    Ok(KeyResultRow {
        id: row.get(0)?,
        objective_id: row.get(1)?,
        title: row.get(2)?,
        metric: row.get(3)?,
        unit: row.get(4)?,
        inverse_metric: row.get(5)?,
        created_date: row.get(6)?,
        modified_date: row.get(7)?,
    })
}

fn monthly_data_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MonthlyDataRow> {
    Ok(MonthlyDataRow {
        id: row.get(0)?,
        key_result_id: row.get(1)?,
        month: row.get(2)?,
        target: row.get(3)?,
        actual: row.get(4)?,
        last_updated: row.get(5)?,
    })
}

fn comment_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        objective_id: row.get(1)?,
        month: row.get(2)?,
        comment: row.get(3)?,
        last_updated: row.get(4)?,
    })
}
