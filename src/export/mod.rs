//! Final dataset selection and export.
//!
//! The finalizer selects a fixed, ordered column list from the panel —
//! columns the run never populated are omitted, not an error — and writes
//! the same rows and columns to two files: `{base}.dta` (Stata) and
//! `{base}.csv`.

pub mod stata;

use std::path::{Path, PathBuf};

use chrono::Utc;
use csv::WriterBuilder;
use tracing::{debug, info};

use crate::error::Result;
use crate::panel::{Metric, Panel};

/// One output column slot: structural fields first, then any metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    City,
    Neighborhood,
    AirbnbCount,
    Metric(Metric),
}

impl Column {
    pub fn name(self) -> &'static str {
        match self {
            Column::City => "city",
            Column::Neighborhood => "neighborhood",
            Column::AirbnbCount => "airbnb_count",
            Column::Metric(m) => m.name(),
        }
    }
}

/// The full output column order. Selection keeps this relative order and
/// drops what the panel never populated.
const FINAL_ORDER: [Column; 13] = [
    Column::City,
    Column::Neighborhood,
    Column::Metric(Metric::MedianRent),
    Column::AirbnbCount,
    Column::Metric(Metric::HousingUnits),
    Column::Metric(Metric::AirbnbDensity),
    Column::Metric(Metric::MedianHouseholdIncome),
    Column::Metric(Metric::PopulationDensity),
    Column::Metric(Metric::PctCollege),
    Column::Metric(Metric::TouristArea),
    Column::Metric(Metric::LogRent),
    Column::Metric(Metric::LogIncome),
    Column::Metric(Metric::LogAirbnbDensity),
];

/// Selects the output columns that exist in this panel, in final order.
pub fn select_columns(panel: &Panel) -> Vec<Column> {
    FINAL_ORDER
        .iter()
        .copied()
        .filter(|column| match column {
            Column::Metric(m) => panel.has_column(*m),
            _ => true,
        })
        .collect()
}

/// A materialized output column: either text or nullable doubles, one value
/// per panel row.
#[derive(Debug)]
pub enum ColumnValues {
    Str(Vec<String>),
    Num(Vec<Option<f64>>),
}

#[derive(Debug)]
pub struct OutputColumn {
    pub name: &'static str,
    pub values: ColumnValues,
}

/// Extracts the selected columns' values from the panel, column-major.
pub fn materialize(panel: &Panel, columns: &[Column]) -> Vec<OutputColumn> {
    columns
        .iter()
        .map(|&column| {
            let values = match column {
                Column::City => {
                    ColumnValues::Str(panel.rows().iter().map(|r| r.city.clone()).collect())
                }
                Column::Neighborhood => ColumnValues::Str(
                    panel.rows().iter().map(|r| r.neighborhood.clone()).collect(),
                ),
                Column::AirbnbCount => ColumnValues::Num(
                    panel
                        .rows()
                        .iter()
                        .map(|r| Some(r.airbnb_count as f64))
                        .collect(),
                ),
                Column::Metric(m) => {
                    ColumnValues::Num(panel.rows().iter().map(|r| r.get(m)).collect())
                }
            };
            OutputColumn {
                name: column.name(),
                values,
            }
        })
        .collect()
}

/// Writes the materialized columns as a headed CSV. Null values render as
/// empty fields.
pub fn write_csv(columns: &[OutputColumn], path: &Path) -> Result<()> {
    let row_count = columns
        .first()
        .map(|c| match &c.values {
            ColumnValues::Str(v) => v.len(),
            ColumnValues::Num(v) => v.len(),
        })
        .unwrap_or(0);
    debug!(path = %path.display(), rows = row_count, "Writing CSV output");

    let file = std::fs::File::create(path)?;
    let mut writer = WriterBuilder::new().from_writer(file);

    writer
        .write_record(columns.iter().map(|c| c.name))
        .map_err(|e| csv_error(path, e))?;

    for row in 0..row_count {
        let record: Vec<String> = columns
            .iter()
            .map(|c| match &c.values {
                ColumnValues::Str(v) => v[row].clone(),
                ColumnValues::Num(v) => v[row].map(format_number).unwrap_or_default(),
            })
            .collect();
        writer.write_record(&record).map_err(|e| csv_error(path, e))?;
    }

    writer.flush()?;
    Ok(())
}

fn csv_error(path: &Path, source: csv::Error) -> crate::error::PanelError {
    crate::error::PanelError::Csv {
        path: path.display().to_string(),
        source,
    }
}

/// Renders a double for delimited text. Integral values drop the fraction.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Writes the final dataset to `{base}.dta` and `{base}.csv` and logs both
/// paths with their sizes. Returns the two written paths.
pub fn export(panel: &Panel, base: &str) -> Result<(PathBuf, PathBuf)> {
    let columns = select_columns(panel);
    let materialized = materialize(panel, &columns);

    let dta_path = PathBuf::from(format!("{base}.dta"));
    let csv_path = PathBuf::from(format!("{base}.csv"));

    stata::write_dta(&materialized, panel.len(), &dta_path, Utc::now())?;
    write_csv(&materialized, &csv_path)?;

    let dta_kb = std::fs::metadata(&dta_path)?.len() as f64 / 1024.0;
    let csv_kb = std::fs::metadata(&csv_path)?.len() as f64 / 1024.0;
    info!(
        dta = %dta_path.display(),
        dta_kb = format!("{dta_kb:.1}"),
        csv = %csv_path.display(),
        csv_kb = format!("{csv_kb:.1}"),
        rows = panel.len(),
        variables = columns.len(),
        "Dataset exported"
    );

    Ok((dta_path, csv_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listings::ListingCount;

    fn panel_with_rent() -> Panel {
        let mut panel = Panel::from_counts(vec![ListingCount {
            city: "austin".to_string(),
            neighborhood: "downtown".to_string(),
            airbnb_count: 2,
        }]);
        panel.rows_mut()[0].median_rent = Some(1500.5);
        panel.mark_present(Metric::MedianRent);
        panel
    }

    #[test]
    fn test_select_columns_keeps_final_relative_order() {
        let mut panel = panel_with_rent();
        panel.mark_present(Metric::LogRent);

        let columns = select_columns(&panel);
        let names: Vec<&str> = columns.iter().map(|c| c.name()).collect();
        assert_eq!(
            names,
            vec!["city", "neighborhood", "median_rent", "airbnb_count", "log_rent"]
        );
    }

    #[test]
    fn test_select_columns_omits_absent_metrics() {
        let panel = Panel::from_counts(vec![]);
        let columns = select_columns(&panel);
        let names: Vec<&str> = columns.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["city", "neighborhood", "airbnb_count"]);
    }

    #[test]
    fn test_write_csv_renders_nulls_empty() {
        let mut panel = Panel::from_counts(vec![
            ListingCount {
                city: "austin".to_string(),
                neighborhood: "downtown".to_string(),
                airbnb_count: 2,
            },
            ListingCount {
                city: "austin".to_string(),
                neighborhood: "midtown".to_string(),
                airbnb_count: 1,
            },
        ]);
        panel.rows_mut()[0].median_rent = Some(1500.5);
        panel.mark_present(Metric::MedianRent);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panel.csv");
        let columns = select_columns(&panel);
        write_csv(&materialize(&panel, &columns), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "city,neighborhood,median_rent,airbnb_count");
        assert_eq!(lines[1], "austin,downtown,1500.5,2");
        assert_eq!(lines[2], "austin,midtown,,1");
    }

    #[test]
    fn test_export_writes_both_files() {
        let panel = panel_with_rent();
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("out").display().to_string();

        let (dta, csv) = export(&panel, &base).unwrap();
        assert!(dta.exists());
        assert!(csv.exists());
        assert_eq!(dta.extension().unwrap(), "dta");
        assert_eq!(csv.extension().unwrap(), "csv");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(2.0), "2");
        assert_eq!(format_number(1500.5), "1500.5");
        assert_eq!(format_number(-3.0), "-3");
    }
}
