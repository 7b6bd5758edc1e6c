//! Schema versioning and migrations.
//!
//! The schema evolves through an ordered list of versioned steps run by a
//! generic runner. Each step guards itself with a table/column existence
//! check, so replaying the sequence against an already-migrated database
//! is a no-op. Steps are forward-only; there is no downgrade path.
//!
//! History: v1 is the four-table baseline, v2 adds the inverse-metric
//! flag to key results, v3 adds the driver field to objectives.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::{OkrError, Result};

/// Latest schema version this build understands.
pub const CURRENT_VERSION: i64 = 3;

/// One forward migration step.
struct Migration {
    version: i64,
    description: &'static str,
    apply: fn(&Connection) -> rusqlite::Result<()>,
}

static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "baseline tables",
        apply: apply_baseline,
    },
    Migration {
        version: 2,
        description: "key_results.inverse_metric",
        apply: apply_inverse_metric,
    },
    Migration {
        version: 3,
        description: "objectives.driver",
        apply: apply_driver,
    },
];

/// Bring the database to [`CURRENT_VERSION`], appending one history row
/// per applied step.
///
/// Returns whether any step was applied, so the caller knows to
/// re-persist the blob. A database stamped newer than this build is
/// rejected rather than partially understood.
///
/// # Errors
///
/// Any engine failure inside a step surfaces as `OkrError::Migration`;
/// initialization must treat that as fatal.
pub fn run(conn: &Connection) -> Result<bool> {
    ensure_version_table(conn).map_err(|e| migration_error("schema_version table", e))?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .map_err(|e| migration_error("read schema version", e))?;

    if current > CURRENT_VERSION {
        return Err(OkrError::Migration(format!(
            "Database is at schema version {}, newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    let mut applied = false;
    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        (migration.apply)(conn)
            .map_err(|e| migration_error(migration.description, e))?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?, ?)",
            (migration.version, Utc::now().to_rfc3339()),
        )
        .map_err(|e| migration_error(migration.description, e))?;
        info!(version = migration.version, "applied migration: {}", migration.description);
        applied = true;
    }

    Ok(applied)
}

fn migration_error(context: &str, err: rusqlite::Error) -> OkrError {
    OkrError::Migration(format!("{}: {}", context, err))
}

fn ensure_version_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )
}

fn apply_baseline(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS objectives (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL CHECK(length(title) <= 200),
            description TEXT,
            created_date TEXT DEFAULT CURRENT_TIMESTAMP,
            modified_date TEXT DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS key_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            objective_id INTEGER NOT NULL,
            title TEXT NOT NULL CHECK(length(title) <= 200),
            metric TEXT NOT NULL CHECK(length(metric) <= 100),
            unit TEXT,
            created_date TEXT DEFAULT CURRENT_TIMESTAMP,
            modified_date TEXT DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (objective_id) REFERENCES objectives(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS monthly_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            key_result_id INTEGER NOT NULL,
            month TEXT NOT NULL CHECK(length(month) = 7),
            target REAL NOT NULL DEFAULT 0 CHECK(target >= 0),
            actual REAL NOT NULL DEFAULT 0 CHECK(actual >= 0),
            last_updated TEXT DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (key_result_id) REFERENCES key_results(id) ON DELETE CASCADE,
            UNIQUE(key_result_id, month)
        );

        CREATE TABLE IF NOT EXISTS objective_comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            objective_id INTEGER NOT NULL,
            month TEXT NOT NULL CHECK(length(month) = 7),
            comment TEXT CHECK(length(comment) <= 2000),
            last_updated TEXT DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (objective_id) REFERENCES objectives(id) ON DELETE CASCADE,
            UNIQUE(objective_id, month)
        );
        "#,
    )
}

fn apply_inverse_metric(conn: &Connection) -> rusqlite::Result<()> {
    if column_exists(conn, "key_results", "inverse_metric")? {
        return Ok(());
    }
    conn.execute_batch(
        "ALTER TABLE key_results \
         ADD COLUMN inverse_metric INTEGER DEFAULT 0 CHECK(inverse_metric IN (0, 1))",
    )
}

fn apply_driver(conn: &Connection) -> rusqlite::Result<()> {
    if column_exists(conn, "objectives", "driver")? {
        return Ok(());
    }
    conn.execute_batch("ALTER TABLE objectives ADD COLUMN driver TEXT NOT NULL DEFAULT ''")
}

/// Whether a table exists in the main schema.
pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> rusqlite::Result<bool> {
    // PRAGMA arguments cannot be bound; table names here come from the
    // static migration list.
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        conn.execute_batch("PRAGMA foreign_keys = ON;").expect("pragma");
        conn
    }

    fn history(conn: &Connection) -> Vec<i64> {
        let mut stmt = conn
            .prepare("SELECT version FROM schema_version ORDER BY version")
            .expect("prepare");
        stmt.query_map([], |row| row.get(0))
            .expect("query")
            .collect::<rusqlite::Result<Vec<i64>>>()
            .expect("collect")
    }

    #[test]
    fn test_fresh_database_reaches_current_version() {
        let conn = fresh_conn();
        let applied = run(&conn).expect("migrations should run");
        assert!(applied);
        assert_eq!(history(&conn), vec![1, 2, 3]);
        assert!(table_exists(&conn, "objectives").unwrap());
        assert!(table_exists(&conn, "monthly_data").unwrap());
        assert!(column_exists(&conn, "key_results", "inverse_metric").unwrap());
        assert!(column_exists(&conn, "objectives", "driver").unwrap());
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let conn = fresh_conn();
        assert!(run(&conn).expect("first run"));
        assert!(!run(&conn).expect("second run"));
        assert_eq!(history(&conn), vec![1, 2, 3]);
    }

    #[test]
    fn test_v1_database_gains_columns_exactly_once() {
        let conn = fresh_conn();
        apply_baseline(&conn).expect("baseline");
        ensure_version_table(&conn).expect("version table");
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])
            .expect("stamp v1");

        assert!(!column_exists(&conn, "objectives", "driver").unwrap());
        assert!(run(&conn).expect("upgrade"));
        assert!(column_exists(&conn, "key_results", "inverse_metric").unwrap());
        assert!(column_exists(&conn, "objectives", "driver").unwrap());
        assert_eq!(history(&conn), vec![1, 2, 3]);

        // Replaying the sequence changes nothing.
        assert!(!run(&conn).expect("replay"));
        assert_eq!(history(&conn), vec![1, 2, 3]);
    }

    #[test]
    fn test_partially_migrated_database_with_existing_column() {
        // A database that already has the v2 column but no v2 history row
        // (e.g. interrupted after ALTER, before the stamp). The guard makes
        // the replay a no-op rather than an error.
        let conn = fresh_conn();
        apply_baseline(&conn).expect("baseline");
        apply_inverse_metric(&conn).expect("add column");
        ensure_version_table(&conn).expect("version table");
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])
            .expect("stamp v1");

        assert!(run(&conn).expect("upgrade"));
        assert_eq!(history(&conn), vec![1, 2, 3]);
    }

    #[test]
    fn test_newer_database_is_rejected() {
        let conn = fresh_conn();
        run(&conn).expect("migrate");
        conn.execute("INSERT INTO schema_version (version) VALUES (99)", [])
            .expect("stamp future version");

        let err = run(&conn).expect_err("future version should fail");
        assert!(matches!(err, OkrError::Migration(_)));
    }
}
