//! Write-time field validation.
//!
//! Length caps are counted in characters to match the schema's `length()`
//! CHECK constraints. Everything here runs before a statement is
//! prepared, so validation failures never touch the engine.

use crate::error::{OkrError, Result};
use crate::storage::types::MonthlyUpdate;
use crate::window::ensure_month;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_METRIC_CHARS: usize = 100;
pub const MAX_COMMENT_CHARS: usize = 2000;

pub fn validate_objective_fields(title: &str, driver: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(OkrError::Validation("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(OkrError::Validation(format!(
            "Title must be {} characters or less",
            MAX_TITLE_CHARS
        )));
    }
    if driver.trim().is_empty() {
        return Err(OkrError::Validation("Driver is required".to_string()));
    }
    Ok(())
}

pub fn validate_key_result_fields(title: &str, metric: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(OkrError::Validation("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(OkrError::Validation(format!(
            "Title must be {} characters or less",
            MAX_TITLE_CHARS
        )));
    }
    if metric.trim().is_empty() {
        return Err(OkrError::Validation("Metric is required".to_string()));
    }
    if metric.chars().count() > MAX_METRIC_CHARS {
        return Err(OkrError::Validation(format!(
            "Metric must be {} characters or less",
            MAX_METRIC_CHARS
        )));
    }
    Ok(())
}

pub fn validate_comment_text(comment: &str) -> Result<()> {
    if comment.chars().count() > MAX_COMMENT_CHARS {
        return Err(OkrError::Validation(format!(
            "Comment must be {} characters or less",
            MAX_COMMENT_CHARS
        )));
    }
    Ok(())
}

pub fn validate_monthly_update(month: &str, update: &MonthlyUpdate) -> Result<()> {
    ensure_month(month)?;
    if let Some(target) = update.target {
        validate_value("Target", target)?;
    }
    if let Some(actual) = update.actual {
        validate_value("Actual", actual)?;
    }
    Ok(())
}

fn validate_value(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(OkrError::Validation(format!(
            "{} must be a finite number",
            field
        )));
    }
    if value < 0.0 {
        return Err(OkrError::Validation(format!(
            "{} must be 0 or greater",
            field
        )));
    }
    Ok(())
}
