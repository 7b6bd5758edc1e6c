//! Core data types for the storage layer.
//!
//! Row types mirror the persisted schema; the `New*`/`*Edit` types are the
//! write-side inputs the query layer validates before touching the engine.
//! The `inverse_metric` flag is a `bool` everywhere in the domain; the
//! 0/1 integer it becomes on disk exists only inside the row mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An objective, owning key results and monthly comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub id: i64,

    /// Required, at most 200 characters
    pub title: String,

    pub description: String,

    /// Accountable owner; required at the application layer
    pub driver: String,

    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
}

/// A key result, owned by exactly one objective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyResult {
    pub id: i64,
    pub objective_id: i64,

    /// Required, at most 200 characters
    pub title: String,

    /// What is measured; required, at most 100 characters
    pub metric: String,

    pub unit: String,

    /// `true` when lower is better (tickets, incidents, downtime)
    pub inverse_metric: bool,

    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
}

/// One month of target/actual values for a key result.
///
/// Unique per `(key_result_id, month)`; provisioned with zeros for every
/// month of the tracking window when the key result is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyData {
    pub id: i64,
    pub key_result_id: i64,

    /// Fixed-width `YYYY-MM`
    pub month: String,

    pub target: f64,
    pub actual: f64,
    pub last_updated: DateTime<Utc>,
}

/// A monthly free-text comment on an objective.
///
/// Unique per `(objective_id, month)`; provisioned empty when the
/// objective is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveComment {
    pub id: i64,
    pub objective_id: i64,

    /// Fixed-width `YYYY-MM`
    pub month: String,

    /// At most 2000 characters
    pub comment: String,

    pub last_updated: DateTime<Utc>,
}

/// Input for creating an objective.
#[derive(Debug, Clone)]
pub struct NewObjective {
    pub title: String,
    pub description: Option<String>,
    pub driver: String,
}

impl NewObjective {
    pub fn new(title: impl Into<String>, driver: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            driver: driver.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Replacement fields for an objective edit form.
#[derive(Debug, Clone)]
pub struct ObjectiveEdit {
    pub title: String,
    pub description: Option<String>,
    pub driver: String,
}

/// Input for creating a key result.
#[derive(Debug, Clone)]
pub struct NewKeyResult {
    pub objective_id: i64,
    pub title: String,
    pub metric: String,
    pub unit: Option<String>,
    pub inverse_metric: bool,
}

impl NewKeyResult {
    pub fn new(
        objective_id: i64,
        title: impl Into<String>,
        metric: impl Into<String>,
    ) -> Self {
        Self {
            objective_id,
            title: title.into(),
            metric: metric.into(),
            unit: None,
            inverse_metric: false,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn inverse(mut self) -> Self {
        self.inverse_metric = true;
        self
    }
}

/// Replacement fields for a key result edit form.
#[derive(Debug, Clone)]
pub struct KeyResultEdit {
    pub title: String,
    pub metric: String,
    pub unit: Option<String>,
    pub inverse_metric: bool,
}

/// Partial update of one month's values.
///
/// Target and actual are set independently; an update with neither present
/// is a no-op at the query layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonthlyUpdate {
    pub target: Option<f64>,
    pub actual: Option<f64>,
}

impl MonthlyUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target(mut self, value: f64) -> Self {
        self.target = Some(value);
        self
    }

    pub fn actual(mut self, value: f64) -> Self {
        self.actual = Some(value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_none() && self.actual.is_none()
    }
}

/// A key result with its full monthly series, months ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyResultWithData {
    #[serde(flatten)]
    pub key_result: KeyResult,
    pub monthly_data: Vec<MonthlyData>,
}

/// An objective with all its key results (each carrying monthly data)
/// and all its comments, as assembled by the composite reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveWithDetails {
    #[serde(flatten)]
    pub objective: Objective,
    pub key_results: Vec<KeyResultWithData>,
    pub comments: Vec<ObjectiveComment>,
}

/// Outcome of a bulk copy across months.
///
/// Partial failure is normal: per-key-result problems are collected as
/// strings and the batch keeps going.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCopyOutcome {
    pub updated: usize,
    pub errors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_key_result_builder() {
        let kr = NewKeyResult::new(7, "Reduce open tickets", "Open P2 tickets")
            .with_unit("tickets")
            .inverse();

        assert_eq!(kr.objective_id, 7);
        assert_eq!(kr.unit.as_deref(), Some("tickets"));
        assert!(kr.inverse_metric);
    }

    #[test]
    fn test_monthly_update_builder() {
        assert!(MonthlyUpdate::new().is_empty());

        let update = MonthlyUpdate::new().target(50.0);
        assert_eq!(update.target, Some(50.0));
        assert_eq!(update.actual, None);
        assert!(!update.is_empty());
    }
}
