pub mod config;
pub mod derived;
pub mod error;
pub mod export;
pub mod key;
pub mod listings;
pub mod panel;
pub mod report;
pub mod supplements;

use tracing::info;

use crate::config::RunManifest;
use crate::error::Result;
use crate::panel::Panel;
use crate::supplements::{DEMOGRAPHICS, HOUSING, RENT, TOURISM, load_supplement};

/// Runs the full pipeline up to the finished panel: load listings, aggregate,
/// fold in each configured supplement (demographics, rent, housing, tourism,
/// in that order), then compute derived variables.
pub fn build_panel(manifest: &RunManifest) -> Result<Panel> {
    let counts = listings::load_all_listings(&manifest.listings)?;
    let total_listings: u64 = counts.iter().map(|c| c.airbnb_count).sum();
    info!(
        neighborhoods = counts.len(),
        total_listings, "Listings aggregated"
    );

    let mut panel = Panel::from_counts(counts);

    let sources = [
        (&DEMOGRAPHICS, &manifest.demographics),
        (&RENT, &manifest.rent),
        (&HOUSING, &manifest.housing),
        (&TOURISM, &manifest.tourism),
    ];
    for (spec, path) in sources {
        let Some(path) = path else {
            info!(source = spec.name, "Supplement not configured, skipping");
            continue;
        };
        let table = load_supplement(spec, path)?;
        panel = panel.merge(&table);
        info!(
            source = spec.name,
            matched = panel.non_null_count(spec.key_metric),
            total = panel.len(),
            "Supplement merged"
        );
    }

    Ok(derived::compute(panel))
}
