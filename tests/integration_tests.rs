use std::io::Write;
use std::path::Path;

use neighborhood_panel::build_panel;
use neighborhood_panel::config::RunManifest;
use neighborhood_panel::error::PanelError;
use neighborhood_panel::export;
use neighborhood_panel::panel::Metric;

fn fixture(name: &str) -> String {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
        .display()
        .to_string()
}

fn write_manifest(dir: &Path, content: &str) -> String {
    let path = dir.join("manifest.json");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path.display().to_string()
}

#[test]
fn test_full_pipeline_with_supplements() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = write_manifest(
        dir.path(),
        &format!(
            r#"{{
                "listings": {{"Austin": "{listings}"}},
                "demographics": "{demographics}",
                "rent": "{rent}"
            }}"#,
            listings = fixture("austin_listings.csv"),
            demographics = fixture("demographics.csv"),
            rent = fixture("rent.csv"),
        ),
    );

    let manifest = RunManifest::load(&manifest_path).unwrap();
    let panel = build_panel(&manifest).unwrap();

    // "Downtown" and "downtown  " collapse onto one key
    assert_eq!(panel.len(), 2);
    let total: u64 = panel.rows().iter().map(|r| r.airbnb_count).sum();
    assert_eq!(total, 3);

    let downtown = panel
        .rows()
        .iter()
        .find(|r| r.neighborhood == "downtown")
        .unwrap();
    let midtown = panel
        .rows()
        .iter()
        .find(|r| r.neighborhood == "midtown")
        .unwrap();

    assert_eq!(downtown.city, "austin");
    assert_eq!(downtown.airbnb_count, 2);
    assert_eq!(midtown.airbnb_count, 1);

    // Demographics matched downtown only; rent matched both
    assert_eq!(downtown.median_household_income, Some(50000.0));
    assert_eq!(midtown.median_household_income, None);
    assert_eq!(downtown.median_rent, Some(1500.0));
    assert_eq!(midtown.median_rent, Some(1200.0));
    assert_eq!(panel.non_null_count(Metric::MedianHouseholdIncome), 1);

    // Derived variables: guarded where inputs exist, null elsewhere
    assert_eq!(downtown.airbnb_density, Some(2.0 / 12000.0));
    assert_eq!(downtown.log_rent, Some(1500.0_f64.ln()));
    assert_eq!(downtown.log_income, Some(50000.0_f64.ln()));
    assert_eq!(midtown.airbnb_density, None);
    assert_eq!(midtown.log_airbnb_density, None);
    assert_eq!(midtown.log_rent, Some(1200.0_f64.ln()));
}

#[test]
fn test_pipeline_exports_both_formats() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = write_manifest(
        dir.path(),
        &format!(
            r#"{{
                "listings": {{"Austin": "{listings}"}},
                "rent": "{rent}"
            }}"#,
            listings = fixture("austin_listings.csv"),
            rent = fixture("rent.csv"),
        ),
    );

    let manifest = RunManifest::load(&manifest_path).unwrap();
    let panel = build_panel(&manifest).unwrap();

    let base = dir.path().join("panel").display().to_string();
    let (dta_path, csv_path) = export::export(&panel, &base).unwrap();

    let csv_content = std::fs::read_to_string(&csv_path).unwrap();
    let header = csv_content.lines().next().unwrap();
    // Demographics and housing were skipped, so their columns are omitted;
    // the remaining columns keep the final relative order
    assert_eq!(
        header,
        "city,neighborhood,median_rent,airbnb_count,airbnb_density,log_rent,log_income,log_airbnb_density"
    );
    assert_eq!(csv_content.lines().count(), 3);

    let dta = std::fs::read(&dta_path).unwrap();
    assert!(dta.starts_with(b"<stata_dta><header><release>118</release>"));
    assert!(dta.ends_with(b"</stata_dta>"));
}

#[test]
fn test_missing_neighborhood_column_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let manifest_path = write_manifest(
        dir.path(),
        &format!(
            r#"{{"listings": {{"Austin": "{listings}"}}}}"#,
            listings = fixture("bad_listings.csv"),
        ),
    );

    let manifest = RunManifest::load(&manifest_path).unwrap();
    let err = build_panel(&manifest).unwrap_err();
    assert!(matches!(err, PanelError::Schema { .. }));
}
