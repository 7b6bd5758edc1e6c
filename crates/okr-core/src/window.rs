//! Tracking window configuration and month arithmetic.
//!
//! Months are fixed-width `YYYY-MM` strings throughout the crate. The
//! zero-padded form makes lexicographic comparison equivalent to
//! chronological comparison, which `is_ended` relies on.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{OkrError, Result};

/// Inclusive month range that monthly rows are provisioned for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingWindow {
    pub start: String,
    pub end: String,
}

impl TrackingWindow {
    /// Build a window from two `YYYY-MM` strings.
    ///
    /// # Errors
    ///
    /// Returns `OkrError::Validation` if either bound is not a valid
    /// `YYYY-MM` month or the start is after the end.
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Result<Self> {
        let start = start.into();
        let end = end.into();
        ensure_month(&start)?;
        ensure_month(&end)?;
        if start > end {
            return Err(OkrError::Validation(format!(
                "Tracking window start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Every month in the window, start through end inclusive, ascending.
    pub fn months(&self) -> Vec<String> {
        let mut months = Vec::new();
        let mut current = self.start.clone();
        loop {
            months.push(current.clone());
            if current == self.end {
                break;
            }
            match next_month(&current) {
                Some(next) => current = next,
                None => break,
            }
        }
        months
    }

    /// Whether a month falls inside the window.
    pub fn contains(&self, month: &str) -> bool {
        is_month(month) && self.start.as_str() <= month && month <= self.end.as_str()
    }

    /// Whether the tracking period is over as of the given month.
    pub fn is_ended(&self, current: &str) -> bool {
        current > self.end.as_str()
    }
}

impl Default for TrackingWindow {
    fn default() -> Self {
        Self {
            start: "2025-10".to_string(),
            end: "2026-12".to_string(),
        }
    }
}

/// Check that a string is a zero-padded `YYYY-MM` month.
pub fn is_month(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return false;
    }
    if !bytes[..4].iter().all(u8::is_ascii_digit)
        || !bytes[5..].iter().all(u8::is_ascii_digit)
    {
        return false;
    }
    let month = &value[5..];
    ("01"..="12").contains(&month)
}

/// Validate a month string, returning a descriptive error on failure.
pub fn ensure_month(value: &str) -> Result<()> {
    if is_month(value) {
        Ok(())
    } else {
        Err(OkrError::Validation(format!(
            "Invalid month {:?} (expected YYYY-MM)",
            value
        )))
    }
}

/// The current month in `YYYY-MM` form (UTC).
pub fn current_month() -> String {
    Utc::now().format("%Y-%m").to_string()
}

/// The month before the given one, or `None` if the input is malformed.
pub fn previous_month(month: &str) -> Option<String> {
    let (year, mon) = split_month(month)?;
    if mon == 1 {
        Some(format!("{:04}-12", year.checked_sub(1)?))
    } else {
        Some(format!("{:04}-{:02}", year, mon - 1))
    }
}

/// The month after the given one, or `None` if the input is malformed.
pub fn next_month(month: &str) -> Option<String> {
    let (year, mon) = split_month(month)?;
    if mon == 12 {
        Some(format!("{:04}-01", year.checked_add(1)?))
    } else {
        Some(format!("{:04}-{:02}", year, mon + 1))
    }
}

/// Display form of a month, e.g. "March 2026". Falls back to the raw
/// string for malformed input.
pub fn format_month(month: &str) -> String {
    match split_month(month) {
        Some((year, mon)) => format!("{} {}", month_name(mon), year),
        None => month.to_string(),
    }
}

fn split_month(month: &str) -> Option<(u32, u32)> {
    if !is_month(month) {
        return None;
    }
    let year = month[..4].parse().ok()?;
    let mon = month[5..].parse().ok()?;
    Some((year, mon))
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        _ => "December",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_format_validation() {
        assert!(is_month("2025-01"));
        assert!(is_month("2025-12"));
        assert!(!is_month("2025-13"));
        assert!(!is_month("2025-00"));
        assert!(!is_month("2025-1"));
        assert!(!is_month("25-01"));
        assert!(!is_month("2025/01"));
        assert!(!is_month(""));
    }

    #[test]
    fn test_window_rejects_reversed_bounds() {
        assert!(TrackingWindow::new("2026-01", "2025-01").is_err());
        assert!(TrackingWindow::new("2025-1", "2025-12").is_err());
    }

    #[test]
    fn test_months_span_year_boundary() {
        let window = TrackingWindow::new("2025-11", "2026-02").unwrap();
        assert_eq!(
            window.months(),
            vec!["2025-11", "2025-12", "2026-01", "2026-02"]
        );
    }

    #[test]
    fn test_single_month_window() {
        let window = TrackingWindow::new("2025-06", "2025-06").unwrap();
        assert_eq!(window.months(), vec!["2025-06"]);
    }

    #[test]
    fn test_contains() {
        let window = TrackingWindow::new("2025-10", "2026-12").unwrap();
        assert!(window.contains("2025-10"));
        assert!(window.contains("2026-12"));
        assert!(!window.contains("2025-09"));
        assert!(!window.contains("2027-01"));
        assert!(!window.contains("garbage"));
    }

    #[test]
    fn test_is_ended_is_lexicographic() {
        let window = TrackingWindow::new("2025-10", "2026-12").unwrap();
        assert!(!window.is_ended("2026-12"));
        assert!(window.is_ended("2027-01"));
    }

    #[test]
    fn test_previous_month_at_january() {
        assert_eq!(previous_month("2026-01").as_deref(), Some("2025-12"));
        assert_eq!(previous_month("2026-07").as_deref(), Some("2026-06"));
        assert_eq!(previous_month("bad"), None);
    }

    #[test]
    fn test_format_month() {
        assert_eq!(format_month("2026-03"), "March 2026");
        assert_eq!(format_month("oops"), "oops");
    }
}
