//! Listing file loading and per-neighborhood aggregation.
//!
//! Listing CSVs arrive one per city; the city name itself comes from the run
//! manifest, not from the file. Each file only needs a neighborhood column,
//! under one of two known header names.

use std::collections::BTreeMap;
use std::fs::File;

use tracing::{debug, info};

use crate::error::{PanelError, Result};
use crate::key::normalize;

/// Accepted neighborhood header names, checked in priority order. The
/// "cleansed" variant wins when both are present.
const NEIGHBORHOOD_ALIASES: [&str; 2] = ["neighbourhood_cleansed", "neighbourhood"];

/// One aggregated base-table row: a neighborhood observed in listing data
/// and how many listings it held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCount {
    pub city: String,
    pub neighborhood: String,
    pub airbnb_count: u64,
}

/// Reads one city's listing file and returns its normalized neighborhood
/// values, one entry per raw listing row, rows with a missing neighborhood
/// dropped.
///
/// Fails with [`PanelError::Schema`] if neither neighborhood header alias is
/// present.
pub fn load_listing_neighborhoods(path: &str) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);

    let headers = reader.headers().map_err(|e| PanelError::Csv {
        path: path.to_string(),
        source: e,
    })?;

    let (alias, column_index) = NEIGHBORHOOD_ALIASES
        .iter()
        .find_map(|alias| {
            headers
                .iter()
                .position(|h| h == *alias)
                .map(|index| (*alias, index))
        })
        .ok_or_else(|| PanelError::Schema {
            path: path.to_string(),
            message: format!(
                "no neighborhood column found (expected one of: {})",
                NEIGHBORHOOD_ALIASES.join(", ")
            ),
        })?;
    debug!(path, column = alias, "Neighborhood column detected");

    let mut neighborhoods = Vec::new();
    let mut dropped = 0usize;

    for record in reader.records() {
        let record = record.map_err(|e| PanelError::Csv {
            path: path.to_string(),
            source: e,
        })?;

        // An empty CSV field reads as missing
        let raw = record.get(column_index).filter(|v| !v.is_empty());
        match normalize(raw) {
            Some(value) => neighborhoods.push(value),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(path, dropped, "Dropped rows with missing neighborhood");
    }

    Ok(neighborhoods)
}

/// Groups one city's raw neighborhood values and counts listings per
/// neighborhood. The city value is attached, already normalized, to every
/// resulting row. Neighborhoods come out in sorted order.
pub fn count_by_neighborhood(city: &str, neighborhoods: &[String]) -> Vec<ListingCount> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for neighborhood in neighborhoods {
        *counts.entry(neighborhood.as_str()).or_default() += 1;
    }

    counts
        .into_iter()
        .map(|(neighborhood, airbnb_count)| ListingCount {
            city: city.to_string(),
            neighborhood: neighborhood.to_string(),
            airbnb_count,
        })
        .collect()
}

/// Loads every city's listing file from the manifest map and concatenates
/// the per-city aggregates, city-major.
pub fn load_all_listings(files: &BTreeMap<String, String>) -> Result<Vec<ListingCount>> {
    let mut all_counts = Vec::new();

    for (city_name, path) in files {
        let city = normalize(Some(city_name)).unwrap_or_default();
        let neighborhoods = load_listing_neighborhoods(path)?;
        let raw_rows = neighborhoods.len();

        let counts = count_by_neighborhood(&city, &neighborhoods);
        info!(
            city = %city,
            path,
            listings = raw_rows,
            neighborhoods = counts.len(),
            "Listings loaded"
        );

        all_counts.extend(counts);
    }

    Ok(all_counts)
}
