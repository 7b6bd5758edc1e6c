//! Status and trend derivation.
//!
//! Pure functions turning raw monthly values into a status classification
//! and a month-over-month trend. Nothing here touches storage; callers feed
//! in `(actual, target, previous-actual, inverse)` and render the result.
//!
//! Thresholds: a normal (higher-is-better) metric is green at >= 75% of
//! target and orange at >= 50%. An inverse (lower-is-better) metric is
//! green at or under its target; over target, the overage percentage
//! decides between orange (<= 50% over) and red.

use serde::{Deserialize, Serialize};

/// Completion cap for inverse metrics as the actual approaches zero.
///
/// The good branch of an inverse metric divides `target / actual`, which is
/// unbounded as the actual falls. Clamping keeps the percentage finite and
/// monotone: an actual of zero reports exactly the cap.
pub const INVERSE_COMPLETION_CAP: f64 = 1000.0;

/// Status classification for one key result in one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Green,
    Orange,
    Red,
    NotSet,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Orange => "orange",
            Self::Red => "red",
            Self::NotSet => "not-set",
        }
    }

    /// Human label for badges and reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Green => "On Track",
            Self::Orange => "Under-Watch",
            Self::Red => "Off Track",
            Self::NotSet => "Not Set",
        }
    }
}

/// Semantic color for status badges and trend indicators.
///
/// Renderers map these to whatever their medium supports (ANSI colors,
/// CSS classes, PDF fills). Keeping the mapping here means the
/// inverse-metric color flip is applied once, not per view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorColor {
    Green,
    Orange,
    Red,
    Neutral,
}

/// Result of [`calculate_status`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusInfo {
    pub status: Status,
    pub completion_percentage: f64,
}

/// Month-over-month movement of an actual value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Unchanged,
}

/// Result of [`calculate_trend`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendInfo {
    pub direction: TrendDirection,
    pub percentage: f64,
    pub display: String,
}

/// Classify an (actual, target) pair.
///
/// A target of zero (or less) means the key result is not scored at all:
/// the status is `NotSet` with 0% completion, regardless of the actual or
/// the inverse flag.
pub fn calculate_status(actual: f64, target: f64, inverse: bool) -> StatusInfo {
    if target <= 0.0 {
        return StatusInfo {
            status: Status::NotSet,
            completion_percentage: 0.0,
        };
    }

    if inverse {
        if actual <= target {
            // At or under the cap. Completion grows as the actual falls;
            // clamped so a zero actual stays finite.
            let completion = if actual > 0.0 {
                (target / actual * 100.0).min(INVERSE_COMPLETION_CAP)
            } else {
                INVERSE_COMPLETION_CAP
            };
            StatusInfo {
                status: Status::Green,
                completion_percentage: completion,
            }
        } else {
            let overage = (actual - target) / target * 100.0;
            let status = if overage <= 50.0 {
                Status::Orange
            } else {
                Status::Red
            };
            StatusInfo {
                status,
                completion_percentage: overage,
            }
        }
    } else {
        let completion = actual / target * 100.0;
        let status = if completion >= 75.0 {
            Status::Green
        } else if completion >= 50.0 {
            Status::Orange
        } else {
            Status::Red
        };
        StatusInfo {
            status,
            completion_percentage: completion,
        }
    }
}

/// Derive the month-over-month trend of an actual value.
///
/// A missing or zero previous actual is never scored as trending: the
/// result is `Unchanged` / 0% / `"N/A"`. This guards the division and also
/// means a zero-baseline transition does not show as an infinite jump.
pub fn calculate_trend(current_actual: f64, previous_actual: Option<f64>) -> TrendInfo {
    let previous = match previous_actual {
        Some(value) if value != 0.0 => value,
        _ => {
            return TrendInfo {
                direction: TrendDirection::Unchanged,
                percentage: 0.0,
                display: "N/A".to_string(),
            }
        }
    };

    let percentage = (current_actual - previous) / previous * 100.0;
    let direction = if percentage > 0.0 {
        TrendDirection::Up
    } else if percentage < 0.0 {
        TrendDirection::Down
    } else {
        TrendDirection::Unchanged
    };

    let arrow = match direction {
        TrendDirection::Up => "\u{2191}",
        TrendDirection::Down => "\u{2193}",
        TrendDirection::Unchanged => "\u{2192}",
    };
    let display = format!("{} {:.1}%", arrow, percentage.abs());

    TrendInfo {
        direction,
        percentage,
        display,
    }
}

/// Badge color for a status.
pub fn status_color(status: Status) -> IndicatorColor {
    match status {
        Status::Green => IndicatorColor::Green,
        Status::Orange => IndicatorColor::Orange,
        Status::Red => IndicatorColor::Red,
        Status::NotSet => IndicatorColor::Neutral,
    }
}

/// Indicator color for a trend direction.
///
/// For inverse metrics the up/down pair flips: a falling actual is
/// favorable, a rising one is not. Every renderer goes through this
/// function so the flip is uniform across dashboard and report output.
pub fn trend_color(direction: TrendDirection, inverse: bool) -> IndicatorColor {
    match (direction, inverse) {
        (TrendDirection::Unchanged, _) => IndicatorColor::Neutral,
        (TrendDirection::Up, false) | (TrendDirection::Down, true) => IndicatorColor::Green,
        (TrendDirection::Up, true) | (TrendDirection::Down, false) => IndicatorColor::Red,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(left: f64, right: f64) {
        assert!(
            (left - right).abs() < 1e-9,
            "expected {} to equal {}",
            left,
            right
        );
    }

    #[test]
    fn test_zero_target_is_never_scored() {
        for actual in [0.0, 1.0, 500.0] {
            for inverse in [false, true] {
                let info = calculate_status(actual, 0.0, inverse);
                assert_eq!(info.status, Status::NotSet);
                assert_close(info.completion_percentage, 0.0);
            }
        }
        let info = calculate_status(10.0, -5.0, false);
        assert_eq!(info.status, Status::NotSet);
    }

    #[test]
    fn test_normal_metric_thresholds() {
        let green = calculate_status(75.0, 100.0, false);
        assert_eq!(green.status, Status::Green);
        assert_close(green.completion_percentage, 75.0);

        let orange = calculate_status(74.9, 100.0, false);
        assert_eq!(orange.status, Status::Orange);

        let boundary = calculate_status(50.0, 100.0, false);
        assert_eq!(boundary.status, Status::Orange);

        let red = calculate_status(49.0, 100.0, false);
        assert_eq!(red.status, Status::Red);
        assert_close(red.completion_percentage, 49.0);
    }

    #[test]
    fn test_inverse_under_target_is_green() {
        let info = calculate_status(80.0, 100.0, true);
        assert_eq!(info.status, Status::Green);
        assert_close(info.completion_percentage, 125.0);
    }

    #[test]
    fn test_inverse_overage_thresholds() {
        let orange = calculate_status(130.0, 100.0, true);
        assert_eq!(orange.status, Status::Orange);
        assert_close(orange.completion_percentage, 30.0);

        let boundary = calculate_status(150.0, 100.0, true);
        assert_eq!(boundary.status, Status::Orange);
        assert_close(boundary.completion_percentage, 50.0);

        let red = calculate_status(200.0, 100.0, true);
        assert_eq!(red.status, Status::Red);
        assert_close(red.completion_percentage, 100.0);
    }

    #[test]
    fn test_inverse_zero_actual_clamps_to_cap() {
        let info = calculate_status(0.0, 100.0, true);
        assert_eq!(info.status, Status::Green);
        assert_close(info.completion_percentage, INVERSE_COMPLETION_CAP);

        // Monotone near zero: a tiny actual hits the same cap, a larger
        // one reports less.
        let tiny = calculate_status(1.0, 100_000.0, true);
        assert_close(tiny.completion_percentage, INVERSE_COMPLETION_CAP);
        let moderate = calculate_status(50.0, 100.0, true);
        assert_close(moderate.completion_percentage, 200.0);
    }

    #[test]
    fn test_trend_up() {
        let trend = calculate_trend(110.0, Some(100.0));
        assert_eq!(trend.direction, TrendDirection::Up);
        assert_close(trend.percentage, 10.0);
        assert_eq!(trend.display, "\u{2191} 10.0%");
    }

    #[test]
    fn test_trend_down() {
        let trend = calculate_trend(90.0, Some(100.0));
        assert_eq!(trend.direction, TrendDirection::Down);
        assert_close(trend.percentage, -10.0);
        assert_eq!(trend.display, "\u{2193} 10.0%");
    }

    #[test]
    fn test_trend_flat() {
        let trend = calculate_trend(100.0, Some(100.0));
        assert_eq!(trend.direction, TrendDirection::Unchanged);
        assert_eq!(trend.display, "\u{2192} 0.0%");
    }

    #[test]
    fn test_trend_missing_or_zero_baseline() {
        for current in [0.0, 42.0, -1.0] {
            for previous in [None, Some(0.0)] {
                let trend = calculate_trend(current, previous);
                assert_eq!(trend.direction, TrendDirection::Unchanged);
                assert_close(trend.percentage, 0.0);
                assert_eq!(trend.display, "N/A");
            }
        }
    }

    #[test]
    fn test_trend_color_flips_for_inverse() {
        assert_eq!(trend_color(TrendDirection::Up, false), IndicatorColor::Green);
        assert_eq!(trend_color(TrendDirection::Up, true), IndicatorColor::Red);
        assert_eq!(trend_color(TrendDirection::Down, false), IndicatorColor::Red);
        assert_eq!(trend_color(TrendDirection::Down, true), IndicatorColor::Green);
        assert_eq!(
            trend_color(TrendDirection::Unchanged, true),
            IndicatorColor::Neutral
        );
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(Status::Green.label(), "On Track");
        assert_eq!(Status::NotSet.as_str(), "not-set");
    }
}
