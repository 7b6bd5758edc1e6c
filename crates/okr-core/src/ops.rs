//! Cross-cutting batch mutations built on the query layer.

use crate::error::Result;
use crate::storage::types::{BulkCopyOutcome, MonthlyUpdate};
use crate::storage::OkrStore;
use crate::window::ensure_month;

/// Copy each key result's target for `source_month` into every month of
/// `target_months`.
///
/// A key result with no row for the source month contributes an error
/// string and the batch continues; `updated` counts rows actually
/// written. Partial failure is the normal outcome, not an exception.
///
/// # Errors
///
/// Only malformed month arguments fail the call as a whole; per-item
/// problems are collected in the outcome.
pub fn copy_targets_to_months(
    store: &dyn OkrStore,
    source_month: &str,
    target_months: &[String],
) -> Result<BulkCopyOutcome> {
    ensure_month(source_month)?;
    for month in target_months {
        ensure_month(month)?;
    }

    let mut outcome = BulkCopyOutcome::default();

    for key_result in store.all_key_results()? {
        let monthly = store.monthly_data_for(key_result.id)?;
        let source = match monthly.iter().find(|data| data.month == source_month) {
            Some(data) => data,
            None => {
                outcome.errors.push(format!(
                    "No data found for KR {} ({}) in month {}",
                    key_result.id, key_result.title, source_month
                ));
                continue;
            }
        };

        let update = MonthlyUpdate::new().target(source.target);
        for month in target_months {
            match store.update_monthly_data(key_result.id, month, &update) {
                Ok(affected) => outcome.updated += affected,
                Err(err) => outcome.errors.push(format!(
                    "Error copying target for KR {} ({}): {}",
                    key_result.id, key_result.title, err
                )),
            }
        }
    }

    Ok(outcome)
}
