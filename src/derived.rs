//! Derived analysis variables.
//!
//! All four transforms are guard-then-compute: a zero, negative, or null
//! input yields a null output, never an error, infinity, or NaN.

use tracing::info;

use crate::panel::{Metric, Panel};

/// `numerator / denominator` when the denominator is non-null and positive.
pub fn guarded_div(numerator: f64, denominator: Option<f64>) -> Option<f64> {
    match denominator {
        Some(d) if d > 0.0 => Some(numerator / d),
        _ => None,
    }
}

/// Natural log of a value when it is non-null and positive.
pub fn guarded_ln(value: Option<f64>) -> Option<f64> {
    match value {
        Some(v) if v > 0.0 => Some(v.ln()),
        _ => None,
    }
}

/// Adds the four derived columns to the panel, in dependency order:
/// `airbnb_density` first, since `log_airbnb_density` reads it rather than
/// the raw inputs.
pub fn compute(mut panel: Panel) -> Panel {
    let total = panel.len();

    for row in panel.rows_mut() {
        row.airbnb_density = guarded_div(row.airbnb_count as f64, row.housing_units);
        row.log_rent = guarded_ln(row.median_rent);
        row.log_income = guarded_ln(row.median_household_income);
        row.log_airbnb_density = guarded_ln(row.airbnb_density);
    }

    for metric in [
        Metric::AirbnbDensity,
        Metric::LogRent,
        Metric::LogIncome,
        Metric::LogAirbnbDensity,
    ] {
        panel.mark_present(metric);
        info!(
            variable = metric.name(),
            valid = panel.non_null_count(metric),
            total,
            "Derived variable computed"
        );
    }

    panel
}
