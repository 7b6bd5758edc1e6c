//! Versioned textual export schema.
//!
//! The binary snapshot is the canonical backup format; this JSON document
//! exists for interchange, with every table dumped as a flat array.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::types::{KeyResult, MonthlyData, Objective, ObjectiveComment};
use crate::storage::OkrStore;

/// Format tag carried in every export document.
pub const EXPORT_VERSION: &str = "1.0";

/// Top-level export document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportDocument {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub data: ExportData,
}

/// Flat per-table dumps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportData {
    pub objectives: Vec<Objective>,
    pub key_results: Vec<KeyResult>,
    pub monthly_data: Vec<MonthlyData>,
    pub objective_comments: Vec<ObjectiveComment>,
}

/// Assemble the export document from the current database state.
pub fn export_document(store: &dyn OkrStore) -> Result<ExportDocument> {
    let objectives = store.objectives()?;

    let mut monthly_data = Vec::new();
    let mut objective_comments = Vec::new();
    let key_results = store.all_key_results()?;
    for key_result in &key_results {
        monthly_data.extend(store.monthly_data_for(key_result.id)?);
    }
    for objective in &objectives {
        objective_comments.extend(store.comments_for(objective.id)?);
    }

    Ok(ExportDocument {
        version: EXPORT_VERSION.to_string(),
        exported_at: Utc::now(),
        data: ExportData {
            objectives,
            key_results,
            monthly_data,
            objective_comments,
        },
    })
}
