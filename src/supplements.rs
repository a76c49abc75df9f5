//! Supplementary reference tables: demographics, rent, housing, tourism.
//!
//! All four sources share one loader, parameterized by a [`SupplementSpec`]
//! naming the source's metric columns. Loading reads the full CSV, normalizes
//! the (city, neighborhood) keys, projects down to the required columns, and
//! collapses duplicate keys to per-field medians.

use std::collections::BTreeMap;
use std::fs::File;

use tracing::{debug, info, warn};

use crate::error::{PanelError, Result};
use crate::key::{JoinKey, normalize};
use crate::panel::Metric;

/// Describes one supplementary source: its metric columns in file order and
/// the column whose non-null count serves as the merge match count.
#[derive(Debug)]
pub struct SupplementSpec {
    pub name: &'static str,
    pub fields: &'static [Metric],
    pub key_metric: Metric,
}

pub static DEMOGRAPHICS: SupplementSpec = SupplementSpec {
    name: "demographics",
    fields: &[
        Metric::MedianHouseholdIncome,
        Metric::PopulationDensity,
        Metric::PctCollege,
        Metric::HousingUnits,
    ],
    key_metric: Metric::MedianHouseholdIncome,
};

pub static RENT: SupplementSpec = SupplementSpec {
    name: "rent",
    fields: &[Metric::MedianRent],
    key_metric: Metric::MedianRent,
};

pub static HOUSING: SupplementSpec = SupplementSpec {
    name: "housing",
    fields: &[Metric::HousingUnits],
    key_metric: Metric::HousingUnits,
};

pub static TOURISM: SupplementSpec = SupplementSpec {
    name: "tourism",
    fields: &[Metric::TouristArea],
    key_metric: Metric::TouristArea,
};

/// One loaded supplementary source, at most one row per key. Each row's
/// values align with `spec.fields`.
#[derive(Debug)]
pub struct SupplementTable {
    pub spec: &'static SupplementSpec,
    pub rows: BTreeMap<JoinKey, Vec<Option<f64>>>,
}

/// Median of the non-null values in a slice. `None` when every value is null.
/// Even-length inputs take the mean of the two middle values.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(|a, b| a.total_cmp(b));

    let mid = present.len() / 2;
    if present.len() % 2 == 1 {
        Some(present[mid])
    } else {
        Some((present[mid - 1] + present[mid]) / 2.0)
    }
}

/// Collapses rows sharing a join key into one row of per-field medians.
///
/// Single-row groups pass through unchanged. Duplicate keys are a
/// data-quality anomaly, logged as a warning, never an error.
pub fn collapse_duplicates(
    name: &str,
    rows: Vec<(JoinKey, Vec<Option<f64>>)>,
) -> BTreeMap<JoinKey, Vec<Option<f64>>> {
    let mut groups: BTreeMap<JoinKey, Vec<Vec<Option<f64>>>> = BTreeMap::new();
    for (key, values) in rows {
        groups.entry(key).or_default().push(values);
    }

    let mut collapsed = BTreeMap::new();
    let mut duplicate_keys = 0usize;

    for (key, mut group) in groups {
        if group.len() == 1 {
            collapsed.insert(key, group.pop().unwrap_or_default());
            continue;
        }

        duplicate_keys += 1;
        let field_count = group.iter().map(Vec::len).max().unwrap_or(0);
        let row = (0..field_count)
            .map(|i| {
                let column: Vec<Option<f64>> =
                    group.iter().map(|r| r.get(i).copied().flatten()).collect();
                median(&column)
            })
            .collect();
        collapsed.insert(key, row);
    }

    if duplicate_keys > 0 {
        warn!(
            source = name,
            duplicate_keys, "Duplicate join keys collapsed to per-field medians"
        );
    }

    collapsed
}

/// Loads one supplementary CSV per `spec`.
///
/// Requires `city`, `neighborhood`, and every spec field in the header;
/// anything missing is a [`PanelError::Schema`]. Metric values parse as
/// nullable doubles (empty or unparseable tokens become null). Rows whose
/// normalized city or neighborhood is missing are skipped at load, since
/// they can never match a base row.
pub fn load_supplement(spec: &'static SupplementSpec, path: &str) -> Result<SupplementTable> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| PanelError::Csv {
            path: path.to_string(),
            source: e,
        })?
        .clone();

    let position = |column: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| PanelError::Schema {
                path: path.to_string(),
                message: format!("required column '{column}' is missing"),
            })
    };

    let city_index = position("city")?;
    let neighborhood_index = position("neighborhood")?;
    let field_indices: Vec<usize> = spec
        .fields
        .iter()
        .map(|m| position(m.name()))
        .collect::<Result<_>>()?;

    let mut rows = Vec::new();
    let mut skipped_keys = 0usize;

    for record in reader.records() {
        let record = record.map_err(|e| PanelError::Csv {
            path: path.to_string(),
            source: e,
        })?;

        let field = |i: usize| record.get(i).filter(|v| !v.is_empty());
        let city = normalize(field(city_index));
        let neighborhood = normalize(field(neighborhood_index));
        let (Some(city), Some(neighborhood)) = (city, neighborhood) else {
            skipped_keys += 1;
            continue;
        };

        let values = field_indices
            .iter()
            .zip(spec.fields.iter())
            .map(|(&i, metric)| parse_metric(spec.name, metric.name(), field(i)))
            .collect();

        rows.push((JoinKey::new(city, neighborhood), values));
    }

    if skipped_keys > 0 {
        debug!(
            source = spec.name,
            skipped_keys, "Skipped rows with missing city or neighborhood"
        );
    }

    let loaded = rows.len();
    let table = SupplementTable {
        spec,
        rows: collapse_duplicates(spec.name, rows),
    };

    info!(
        source = spec.name,
        path,
        records = loaded,
        unique_neighborhoods = table.rows.len(),
        "Supplement loaded"
    );

    Ok(table)
}

/// Parses one metric token as a nullable double. Unparseable tokens become
/// null rather than failing the run.
fn parse_metric(source: &str, column: &str, raw: Option<&str>) -> Option<f64> {
    let raw = raw?;
    match raw.trim().parse::<f64>() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!(source, column, value = raw, "Unparseable numeric token treated as null");
            None
        }
    }
}
