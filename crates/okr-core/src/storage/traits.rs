//! Query-layer trait definition.
//!
//! The `OkrStore` trait is the contract the rest of the crate (and the
//! CLI) depends on: CRUD over the four entities, cascade-on-delete, month
//! provisioning, and the composite reads. Any embeddable relational
//! engine that can satisfy it (parameterized statements, auto-increment
//! keys, cascading foreign keys) is substitutable for the bundled
//! SQLite implementation.

use super::types::{
    KeyResult, KeyResultEdit, MonthlyData, MonthlyUpdate, NewKeyResult, NewObjective, Objective,
    ObjectiveComment, ObjectiveEdit, ObjectiveWithDetails,
};
use crate::error::Result;

/// Query layer over the OKR data model.
///
/// Implementations must enforce:
/// - referential integrity with cascade delete (objective -> key results
///   -> monthly data, objective -> comments)
/// - field validation before any write reaches the engine
/// - month provisioning at creation time for the configured window
pub trait OkrStore: Send + Sync {
    // --- Objectives ---

    /// Insert an objective and provision an empty comment row for every
    /// month of the tracking window, in one transaction.
    ///
    /// Returns the new objective's id.
    ///
    /// # Errors
    ///
    /// Returns `OkrError::Validation` if the title is empty or over 200
    /// characters, or the driver is empty.
    fn create_objective(&self, objective: &NewObjective) -> Result<i64>;

    /// Replace title/description/driver and bump `modified_date`.
    fn update_objective(&self, id: i64, edit: &ObjectiveEdit) -> Result<()>;

    /// Delete an objective. Key results, their monthly data, and the
    /// objective's comments go with it via cascade.
    fn delete_objective(&self, id: i64) -> Result<()>;

    /// Get an objective by id, or `None` if it does not exist.
    fn objective(&self, id: i64) -> Result<Option<Objective>>;

    /// All objectives, ordered by id.
    fn objectives(&self) -> Result<Vec<Objective>>;

    // --- Key results ---

    /// Insert a key result and provision a zeroed monthly row for every
    /// month of the tracking window, in one transaction.
    ///
    /// Returns the new key result's id.
    fn create_key_result(&self, key_result: &NewKeyResult) -> Result<i64>;

    /// Replace title/metric/unit/inverse flag and bump `modified_date`.
    fn update_key_result(&self, id: i64, edit: &KeyResultEdit) -> Result<()>;

    /// Delete a key result; its monthly data cascades away.
    fn delete_key_result(&self, id: i64) -> Result<()>;

    /// Key results belonging to one objective, ordered by id.
    fn key_results_for(&self, objective_id: i64) -> Result<Vec<KeyResult>>;

    /// Every key result, ordered by objective then id.
    fn all_key_results(&self) -> Result<Vec<KeyResult>>;

    // --- Monthly data ---

    /// Monthly series for one key result, months ascending.
    fn monthly_data_for(&self, key_result_id: i64) -> Result<Vec<MonthlyData>>;

    /// All key results' rows for one month.
    fn monthly_data_for_month(&self, month: &str) -> Result<Vec<MonthlyData>>;

    /// Partially update one month's target and/or actual, bumping
    /// `last_updated`.
    ///
    /// An empty update is a no-op. Returns the number of rows affected;
    /// zero means no row exists for that (key result, month) pair.
    fn update_monthly_data(
        &self,
        key_result_id: i64,
        month: &str,
        update: &MonthlyUpdate,
    ) -> Result<usize>;

    // --- Comments ---

    /// Comments for one objective, months ascending.
    fn comments_for(&self, objective_id: i64) -> Result<Vec<ObjectiveComment>>;

    /// The comment for one (objective, month), or `None`.
    fn comment_for_month(&self, objective_id: i64, month: &str) -> Result<Option<ObjectiveComment>>;

    /// Upsert the comment for (objective, month): insert if absent,
    /// otherwise overwrite the text and bump `last_updated`.
    fn upsert_comment(&self, objective_id: i64, month: &str, comment: &str) -> Result<()>;

    // --- Composite reads ---

    /// One objective with all its key results (each carrying the full
    /// monthly series) and all its comments.
    fn objective_with_details(&self, id: i64) -> Result<Option<ObjectiveWithDetails>>;

    /// Every objective with details: objectives by id, key results by id,
    /// monthly data by month ascending.
    fn objectives_with_details(&self) -> Result<Vec<ObjectiveWithDetails>>;
}
