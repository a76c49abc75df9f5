//! Post-merge data-quality summary.
//!
//! Built after derivation over the final column selection and emitted
//! through structured logging plus a pretty JSON debug dump. Nothing here is
//! written to a file; the output contract stays exactly two exports.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::export::{Column, select_columns};
use crate::panel::Panel;

/// Missing-value count for one output column.
#[derive(Debug, Serialize)]
pub struct ColumnMissing {
    pub column: &'static str,
    pub missing: usize,
}

/// Per-city totals: neighborhoods observed and how many are complete.
#[derive(Debug, Serialize)]
pub struct CityCoverage {
    pub neighborhoods: usize,
    pub complete: usize,
}

#[derive(Debug, Serialize)]
pub struct QualityReport {
    pub generated_at: DateTime<Utc>,
    pub neighborhoods: usize,
    pub variables: usize,
    /// Rows with non-null median_rent, housing_units, and
    /// median_household_income.
    pub complete_neighborhoods: usize,
    pub by_city: BTreeMap<String, CityCoverage>,
    pub missing: Vec<ColumnMissing>,
}

fn is_complete(row: &crate::panel::PanelRow) -> bool {
    row.median_rent.is_some()
        && row.housing_units.is_some()
        && row.median_household_income.is_some()
}

/// Summarizes the finished panel over its final column selection.
pub fn build(panel: &Panel) -> QualityReport {
    let columns = select_columns(panel);
    let total = panel.len();

    let mut by_city: BTreeMap<String, CityCoverage> = BTreeMap::new();
    for row in panel.rows() {
        let entry = by_city.entry(row.city.clone()).or_insert(CityCoverage {
            neighborhoods: 0,
            complete: 0,
        });
        entry.neighborhoods += 1;
        if is_complete(row) {
            entry.complete += 1;
        }
    }

    let missing = columns
        .iter()
        .map(|&column| {
            let missing = match column {
                // Structural columns are always populated
                Column::City | Column::Neighborhood | Column::AirbnbCount => 0,
                Column::Metric(m) => total - panel.non_null_count(m),
            };
            ColumnMissing {
                column: column.name(),
                missing,
            }
        })
        .collect();

    QualityReport {
        generated_at: Utc::now(),
        neighborhoods: total,
        variables: columns.len(),
        complete_neighborhoods: panel.rows().iter().filter(|r| is_complete(r)).count(),
        by_city,
        missing,
    }
}

/// Logs the report's headline figures and dumps the full report as pretty
/// JSON at debug level.
pub fn log(report: &QualityReport) {
    info!(
        neighborhoods = report.neighborhoods,
        variables = report.variables,
        complete = report.complete_neighborhoods,
        cities = report.by_city.len(),
        "Data quality report"
    );
    for entry in &report.missing {
        if entry.missing > 0 {
            info!(
                column = entry.column,
                missing = entry.missing,
                total = report.neighborhoods,
                "Column has missing values"
            );
        }
    }
    if let Ok(json) = serde_json::to_string_pretty(report) {
        debug!("{json}");
    }
}
