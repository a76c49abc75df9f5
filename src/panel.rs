//! The panel table and its coalescing left join.
//!
//! The panel is the one mutable artifact threaded through the pipeline: it
//! starts as the aggregated listing counts, each supplement merge consumes
//! it by value and returns a new one, and the derived-variable pass does the
//! same. Nothing downstream mutates a panel it does not own.

use std::collections::HashMap;

use tracing::debug;

use crate::key::JoinKey;
use crate::listings::ListingCount;
use crate::supplements::SupplementTable;

/// Every nullable metric column the panel can carry, merged or derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    MedianRent,
    HousingUnits,
    MedianHouseholdIncome,
    PopulationDensity,
    PctCollege,
    TouristArea,
    AirbnbDensity,
    LogRent,
    LogIncome,
    LogAirbnbDensity,
}

impl Metric {
    /// Column name as it appears in input headers and output files.
    pub fn name(self) -> &'static str {
        match self {
            Metric::MedianRent => "median_rent",
            Metric::HousingUnits => "housing_units",
            Metric::MedianHouseholdIncome => "median_household_income",
            Metric::PopulationDensity => "population_density",
            Metric::PctCollege => "pct_college",
            Metric::TouristArea => "tourist_area",
            Metric::AirbnbDensity => "airbnb_density",
            Metric::LogRent => "log_rent",
            Metric::LogIncome => "log_income",
            Metric::LogAirbnbDensity => "log_airbnb_density",
        }
    }
}

/// One neighborhood's row: structural fields plus every metric slot.
///
/// Slots for columns that were never merged or computed stay `None`; whether
/// such a column appears in output at all is tracked by [`Panel::present`],
/// not by the row.
#[derive(Debug, Default, Clone)]
pub struct PanelRow {
    pub city: String,
    pub neighborhood: String,
    pub airbnb_count: u64,
    pub median_rent: Option<f64>,
    pub housing_units: Option<f64>,
    pub median_household_income: Option<f64>,
    pub population_density: Option<f64>,
    pub pct_college: Option<f64>,
    pub tourist_area: Option<f64>,
    pub airbnb_density: Option<f64>,
    pub log_rent: Option<f64>,
    pub log_income: Option<f64>,
    pub log_airbnb_density: Option<f64>,
}

impl PanelRow {
    pub fn key(&self) -> JoinKey {
        JoinKey::new(self.city.clone(), self.neighborhood.clone())
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        *self.slot(metric)
    }

    fn slot(&self, metric: Metric) -> &Option<f64> {
        match metric {
            Metric::MedianRent => &self.median_rent,
            Metric::HousingUnits => &self.housing_units,
            Metric::MedianHouseholdIncome => &self.median_household_income,
            Metric::PopulationDensity => &self.population_density,
            Metric::PctCollege => &self.pct_college,
            Metric::TouristArea => &self.tourist_area,
            Metric::AirbnbDensity => &self.airbnb_density,
            Metric::LogRent => &self.log_rent,
            Metric::LogIncome => &self.log_income,
            Metric::LogAirbnbDensity => &self.log_airbnb_density,
        }
    }

    pub(crate) fn slot_mut(&mut self, metric: Metric) -> &mut Option<f64> {
        match metric {
            Metric::MedianRent => &mut self.median_rent,
            Metric::HousingUnits => &mut self.housing_units,
            Metric::MedianHouseholdIncome => &mut self.median_household_income,
            Metric::PopulationDensity => &mut self.population_density,
            Metric::PctCollege => &mut self.pct_college,
            Metric::TouristArea => &mut self.tourist_area,
            Metric::AirbnbDensity => &mut self.airbnb_density,
            Metric::LogRent => &mut self.log_rent,
            Metric::LogIncome => &mut self.log_income,
            Metric::LogAirbnbDensity => &mut self.log_airbnb_density,
        }
    }
}

/// Fills `dest` from `src` only when `dest` is null. An existing non-null
/// value always wins over a later source.
pub fn coalesce(dest: &mut Option<f64>, src: Option<f64>) {
    if dest.is_none() {
        *dest = src;
    }
}

/// The neighborhood panel: one row per neighborhood observed in listing
/// data, plus the set of metric columns populated so far.
#[derive(Debug, Default, Clone)]
pub struct Panel {
    rows: Vec<PanelRow>,
    present: Vec<Metric>,
}

impl Panel {
    /// Builds the base panel from aggregated listing counts. No metric
    /// columns are present yet.
    pub fn from_counts(counts: Vec<ListingCount>) -> Self {
        let rows = counts
            .into_iter()
            .map(|c| PanelRow {
                city: c.city,
                neighborhood: c.neighborhood,
                airbnb_count: c.airbnb_count,
                ..PanelRow::default()
            })
            .collect();

        Panel {
            rows,
            present: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Metric columns populated so far, in merge/compute order.
    pub fn present(&self) -> &[Metric] {
        &self.present
    }

    pub fn has_column(&self, metric: Metric) -> bool {
        self.present.contains(&metric)
    }

    /// Left-joins one supplement into the panel on the (city, neighborhood)
    /// key. Every base row survives exactly once; unmatched rows keep nulls.
    /// Where a column already exists from an earlier merge, the supplement
    /// fills only null positions (coalesce-on-null), so an earlier source's
    /// non-null value is never overwritten.
    pub fn merge(mut self, supplement: &SupplementTable) -> Panel {
        let lookup: HashMap<&JoinKey, &Vec<Option<f64>>> = supplement.rows.iter().collect();

        let mut matched_rows = 0usize;
        for row in &mut self.rows {
            let key = row.key();
            if let Some(values) = lookup.get(&key) {
                matched_rows += 1;
                for (metric, value) in supplement.spec.fields.iter().zip(values.iter()) {
                    coalesce(row.slot_mut(*metric), *value);
                }
            }
        }
        debug!(
            source = supplement.spec.name,
            matched_rows,
            total = self.rows.len(),
            "Supplement joined"
        );

        for metric in supplement.spec.fields {
            if !self.present.contains(metric) {
                self.present.push(*metric);
            }
        }

        self
    }

    /// Records a derived column as present after its values are computed.
    pub(crate) fn mark_present(&mut self, metric: Metric) {
        if !self.present.contains(&metric) {
            self.present.push(metric);
        }
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [PanelRow] {
        &mut self.rows
    }

    /// Number of rows holding a non-null value for `metric`. Recomputable by
    /// scanning the table; used as the per-merge match count.
    pub fn non_null_count(&self, metric: Metric) -> usize {
        self.rows.iter().filter(|r| r.get(metric).is_some()).count()
    }
}
