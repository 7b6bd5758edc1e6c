//! Raw row types for database queries.
//!
//! Each persisted table gets a raw row struct plus a `TryFrom` into the
//! domain type. Timestamp parsing and the 0/1 <-> bool conversion of the
//! inverse flag live here and nowhere else.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{OkrError, Result};
use crate::storage::types::{KeyResult, MonthlyData, Objective, ObjectiveComment};

/// Parse a stored timestamp.
///
/// Rows written by this crate carry RFC 3339; imported databases written
/// by other SQLite tooling may carry the engine's `CURRENT_TIMESTAMP`
/// form, so both are accepted.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Ok(naive.and_utc());
    }
    Err(OkrError::Storage(format!("Invalid timestamp: {:?}", value)))
}

/// The one place the inverse flag crosses the storage boundary.
pub fn inverse_from_db(value: i64) -> bool {
    value != 0
}

/// See [`inverse_from_db`].
pub fn inverse_to_db(flag: bool) -> i64 {
    i64::from(flag)
}

/// Raw row from the objectives table.
#[derive(Debug)]
pub struct ObjectiveRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub driver: String,
    pub created_date: String,
    pub modified_date: String,
}

impl TryFrom<ObjectiveRow> for Objective {
    type Error = OkrError;

    fn try_from(row: ObjectiveRow) -> Result<Self> {
        Ok(Objective {
            id: row.id,
            title: row.title,
            description: row.description.unwrap_or_default(),
            driver: row.driver,
            created_date: parse_timestamp(&row.created_date)?,
            modified_date: parse_timestamp(&row.modified_date)?,
        })
    }
}

/// Raw row from the key_results table.
#[derive(Debug)]
pub struct KeyResultRow {
    pub id: i64,
    pub objective_id: i64,
    pub title: String,
    pub metric: String,
    pub unit: Option<String>,
    pub inverse_metric: i64,
    pub created_date: String,
    pub modified_date: String,
}

impl TryFrom<KeyResultRow> for KeyResult {
    type Error = OkrError;

    fn try_from(row: KeyResultRow) -> Result<Self> {
        Ok(KeyResult {
            id: row.id,
            objective_id: row.objective_id,
            title: row.title,
            metric: row.metric,
            unit: row.unit.unwrap_or_default(),
            inverse_metric: inverse_from_db(row.inverse_metric),
            created_date: parse_timestamp(&row.created_date)?,
            modified_date: parse_timestamp(&row.modified_date)?,
        })
    }
}

/// Raw row from the monthly_data table.
#[derive(Debug)]
pub struct MonthlyDataRow {
    pub id: i64,
    pub key_result_id: i64,
    pub month: String,
    pub target: f64,
    pub actual: f64,
    pub last_updated: String,
}

impl TryFrom<MonthlyDataRow> for MonthlyData {
    type Error = OkrError;

    fn try_from(row: MonthlyDataRow) -> Result<Self> {
        Ok(MonthlyData {
            id: row.id,
            key_result_id: row.key_result_id,
            month: row.month,
            target: row.target,
            actual: row.actual,
            last_updated: parse_timestamp(&row.last_updated)?,
        })
    }
}

/// Raw row from the objective_comments table.
#[derive(Debug)]
pub struct CommentRow {
    pub id: i64,
    pub objective_id: i64,
    pub month: String,
    pub comment: Option<String>,
    pub last_updated: String,
}

impl TryFrom<CommentRow> for ObjectiveComment {
    type Error = OkrError;

    fn try_from(row: CommentRow) -> Result<Self> {
        Ok(ObjectiveComment {
            id: row.id,
            objective_id: row.objective_id,
            month: row.month,
            comment: row.comment.unwrap_or_default(),
            last_updated: parse_timestamp(&row.last_updated)?,
        })
    }
}
