//! Storage layer: query contract, domain types, and the SQLite engine.

pub mod sqlite;
pub mod traits;
pub mod types;

pub use sqlite::SqliteStore;
pub use traits::OkrStore;
pub use types::{
    BulkCopyOutcome, KeyResult, KeyResultEdit, KeyResultWithData, MonthlyData, MonthlyUpdate,
    NewKeyResult, NewObjective, Objective, ObjectiveComment, ObjectiveEdit, ObjectiveWithDetails,
};
