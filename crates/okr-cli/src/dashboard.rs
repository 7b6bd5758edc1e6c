//! Dashboard table rendering.

use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};

use okr_core::scoring::{
    calculate_status, calculate_trend, status_color, trend_color, IndicatorColor, Status,
};
use okr_core::storage::ObjectiveWithDetails;
use okr_core::window::previous_month;

/// Render the per-month dashboard: one row per key result, with status
/// and month-over-month trend.
pub fn render(details: &[ObjectiveWithDetails], month: &str) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec![
            "Objective", "Key result", "Metric", "Target", "Actual", "Status", "%", "Trend",
        ]);

    let prior = previous_month(month);
    for objective in details {
        for kr in &objective.key_results {
            let current = kr.monthly_data.iter().find(|m| m.month == month);
            let (target, actual) = current.map_or((0.0, 0.0), |m| (m.target, m.actual));
            let previous_actual = prior.as_deref().and_then(|prev| {
                kr.monthly_data
                    .iter()
                    .find(|m| m.month == prev)
                    .map(|m| m.actual)
            });

            let inverse = kr.key_result.inverse_metric;
            let status = calculate_status(actual, target, inverse);
            let trend = calculate_trend(actual, previous_actual);

            let metric = if kr.key_result.unit.is_empty() {
                kr.key_result.metric.clone()
            } else {
                format!("{} ({})", kr.key_result.metric, kr.key_result.unit)
            };
            let completion = match status.status {
                Status::NotSet => "-".to_string(),
                _ => format!("{:.0}%", status.completion_percentage),
            };

            table.add_row(vec![
                Cell::new(&objective.objective.title),
                Cell::new(&kr.key_result.title),
                Cell::new(metric),
                Cell::new(format_value(target)),
                Cell::new(format_value(actual)),
                Cell::new(status.status.label()).fg(cell_color(status_color(status.status))),
                Cell::new(completion),
                Cell::new(&trend.display).fg(cell_color(trend_color(trend.direction, inverse))),
            ]);
        }
    }

    table
}

/// One-line status distribution, e.g. "2 on track, 1 under-watch, ...".
pub fn summary(details: &[ObjectiveWithDetails], month: &str) -> String {
    let mut green = 0usize;
    let mut orange = 0usize;
    let mut red = 0usize;
    let mut not_set = 0usize;

    for objective in details {
        for kr in &objective.key_results {
            let (target, actual) = kr
                .monthly_data
                .iter()
                .find(|m| m.month == month)
                .map_or((0.0, 0.0), |m| (m.target, m.actual));
            match calculate_status(actual, target, kr.key_result.inverse_metric).status {
                Status::Green => green += 1,
                Status::Orange => orange += 1,
                Status::Red => red += 1,
                Status::NotSet => not_set += 1,
            }
        }
    }

    format!(
        "{} on track, {} under-watch, {} off track, {} not set",
        green, orange, red, not_set
    )
}

fn cell_color(color: IndicatorColor) -> Color {
    match color {
        IndicatorColor::Green => Color::Green,
        IndicatorColor::Orange => Color::Yellow,
        IndicatorColor::Red => Color::Red,
        IndicatorColor::Neutral => Color::Grey,
    }
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.1}", value)
    }
}
