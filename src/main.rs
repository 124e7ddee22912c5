// Entry point.
//
// Runs every stage of the monthly-trend pipeline once with the default
// configuration:
// - load the daily case dataset and coerce its dates,
// - aggregate per country and month, export the sorted dataset,
// - sample countries around the anchor and compute moving averages,
// - write seasonal totals, peak, country-year slice and comparisons,
//   each with an interactive chart where one applies.
mod charts;
mod config;
mod error;
mod loader;
mod output;
mod pipeline;
mod reports;
mod types;
mod util;

use config::PipelineConfig;
use pipeline::Pipeline;
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global `tracing` subscriber; an unparsable level falls back
/// to `info`.
fn setup_logging(log_level: &str) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = fmt::layer().with_target(false).with_thread_ids(false);
    tracing_subscriber::registry().with(filter).with(layer).init();
}

fn main() -> ExitCode {
    let config = PipelineConfig::default();
    setup_logging(&config.log_level);
    tracing::info!("covid_trends v{} starting", env!("CARGO_PKG_VERSION"));

    let mut pipeline = Pipeline::new(config);
    match pipeline.run_all() {
        Ok(()) => {
            tracing::info!("All steps completed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(input = %pipeline.config().input_csv.display(), "{}", e);
            ExitCode::FAILURE
        }
    }
}
