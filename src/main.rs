//! CLI entry point for the neighborhood panel builder.
//!
//! One batch run: read the manifest, build the panel, log a data-quality
//! report, and export the final dataset as Stata and CSV.

use anyhow::Result;
use clap::Parser;
use neighborhood_panel::{build_panel, config::RunManifest, export, report};
use std::ffi::OsStr;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "neighborhood_panel")]
#[command(about = "Builds a neighborhood-level Airbnb panel from listing and reference CSVs", long_about = None)]
struct Cli {
    /// JSON run manifest mapping city names to listing files, plus optional
    /// demographics/rent/housing/tourism paths
    #[arg(short, long)]
    manifest: String,

    /// Base path for the two output files ({base}.dta and {base}.csv)
    #[arg(short, long, default_value = "airbnb_neighborhood_panel")]
    output: String,
}

fn main() -> Result<()> {
    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/neighborhood_panel.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("neighborhood_panel.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let manifest = RunManifest::load(&cli.manifest)?;
    info!(
        manifest = %cli.manifest,
        cities = manifest.listings.len(),
        "Run manifest loaded"
    );

    let panel = build_panel(&manifest)?;

    report::log(&report::build(&panel));

    let (dta_path, csv_path) = export::export(&panel, &cli.output)?;
    info!(
        dta = %dta_path.display(),
        csv = %csv_path.display(),
        "Panel build complete"
    );

    Ok(())
}
