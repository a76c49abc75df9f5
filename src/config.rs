//! Run manifest: which input files make up one panel build.
//!
//! Stored as a plain JSON object on disk:
//! ```json
//! {
//!   "listings": {
//!     "Austin": "data/austin_listings.csv",
//!     "New York City": "data/new-york-city_listings.csv"
//!   },
//!   "demographics": "data/neighborhood_demographics_acs_2023.csv",
//!   "rent": "data/neighborhood_median_rent_2024.csv",
//!   "housing": "data/neighborhood_housing_units.csv",
//!   "tourism": "data/neighborhood_tourist_classification.csv"
//! }
//! ```
//! Every supplement entry is optional; a missing entry skips that merge.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::{PanelError, Result};

/// Input file layout for one batch run.
///
/// The listings map keys are human-readable city names; they are normalized
/// at load time, not here. `BTreeMap` keeps city iteration order stable.
#[derive(Debug, Deserialize)]
pub struct RunManifest {
    pub listings: BTreeMap<String, String>,
    #[serde(default)]
    pub demographics: Option<String>,
    #[serde(default)]
    pub rent: Option<String>,
    #[serde(default)]
    pub housing: Option<String>,
    #[serde(default)]
    pub tourism: Option<String>,
}

impl RunManifest {
    /// Loads and validates the manifest from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let manifest: RunManifest =
            serde_json::from_str(&content).map_err(|e| PanelError::Manifest {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        if manifest.listings.is_empty() {
            return Err(PanelError::Manifest {
                path: path.to_string(),
                message: "listings map is empty; at least one city is required".to_string(),
            });
        }

        Ok(manifest)
    }
}
