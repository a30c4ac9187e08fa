//! # Iris News
//!
//! Collects news-article metadata (title, URL, publication instant, source)
//! from websites and from the GDELT DOC API, normalizes every record to one
//! shape, removes duplicates and keeps what falls inside an inclusive
//! calendar-day window in a reference timezone.
//!
//! ## Sources
//!
//! - **Sites**: RSS/Atom feed discovery, falling back to front-page anchors
//!   with per-article date lookups
//! - **Trained sources**: replay of a CSS rule set learned from sample values,
//!   optionally across paginated listings with a date cutoff
//! - **GDELT**: rolling `ArtList` queries per country past the per-call cap
//!
//! ## Usage
//!
//! ```sh
//! iris_news run -c configs/sources.yaml -o ./data
//! iris_news train --url https://daily.example.com/latest -s "A headline" -o rules.json
//! ```
//!
//! ## Architecture
//!
//! 1. **Collect**: each configured source produces raw records
//! 2. **Merge**: records are concatenated in configuration order
//! 3. **Normalize**: de-duplicate by title and canonical URL, then cap to the day window
//! 4. **Output**: records, per-source reports and any GDELT timelines are written as JSON

use clap::Parser;
use itertools::Itertools;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod extraction;
mod http;
mod models;
mod normalize;
mod outputs;
mod pipeline;
mod progress;
mod scrapers;
mod utils;

use cli::{Cli, Command, RunArgs, TrainArgs};
use config::{Config, HttpSettings};
use extraction::mapping::infer_mapping;
use extraction::selector::{SelectorEngine, save_rules};
use extraction::ExtractionEngine;
use http::HttpClient;
use models::SourceDiagnostic;
use outputs::json;
use pipeline::Pipeline;
use scrapers::gdelt::GdeltClient;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("iris_news starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let result = match args.command {
        Command::Run(run) => run_command(run).await,
        Command::Train(train) => train_command(train).await,
    };

    match &result {
        Ok(()) => info!(elapsed_ms = start_time.elapsed().as_millis() as u64, "Done"),
        Err(e) => error!(error = %e, "Failed"),
    }
    result
}

#[instrument(level = "info", skip_all, fields(config = %args.config))]
async fn run_command(args: RunArgs) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load(&args.config).await?;
    if args.keep_dateless {
        config.keep_dateless = true;
    }
    let window = args.window(config.reference_tz()?)?;
    info!(start = %window.start, end = %window.end, timezone = %window.tz, "Day window");

    // Early check: fail before any network work if the output is unusable
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let http = HttpClient::new(&config.http)?;
    let engine = SelectorEngine::new(&http);
    let gdelt = GdeltClient::new(&http, &config.gdelt.endpoint);
    let report = Pipeline::new(&config, &http, &engine, &gdelt, window).run().await;

    for source in &report.sources {
        match &source.diagnostic {
            None => info!(source = %source.name, kind = ?source.kind, contributed = source.contributed, "Source ok"),
            Some(SourceDiagnostic::NoResults) => warn!(source = %source.name, "Source produced no records"),
            Some(SourceDiagnostic::LimitReached(reason)) => {
                warn!(source = %source.name, contributed = source.contributed, %reason, "Source stopped at a limit")
            }
            Some(SourceDiagnostic::Failed(reason)) => {
                error!(source = %source.name, contributed = source.contributed, %reason, "Source failed upstream")
            }
            Some(SourceDiagnostic::Skipped(reason)) => warn!(source = %source.name, %reason, "Source skipped"),
        }
    }

    let path = json::write_run(&report, &args.output_dir, &args.label, &window).await?;
    info!(path = %path.display(), records = report.records.len(), "Run written");
    Ok(())
}

#[instrument(level = "info", skip_all, fields(url = %args.url))]
async fn train_command(args: TrainArgs) -> Result<(), Box<dyn Error>> {
    let (settings, thresholds) = match &args.config {
        Some(path) => {
            let config = Config::load(path).await?;
            (config.http, config.inference)
        }
        None => (HttpSettings::default(), Default::default()),
    };
    let http = HttpClient::new(&settings)?;
    let engine = SelectorEngine::new(&http);

    let rule_set = engine.train(&args.url, &args.samples).await?;
    for rule in &rule_set.rules {
        info!(id = %rule.id, selector = %rule.selector, attribute = ?rule.attribute, "Rule");
    }
    save_rules(&args.out, &rule_set).await?;

    // Preview what a replay of the saved rules extracts and how it would map
    let grouped = engine.replay(&args.out, &args.url).await?;
    info!(
        groups = grouped.len(),
        values = grouped.flatten_unique().len(),
        rules = %grouped.rule_ids().join(", "),
        "Replay preview"
    );
    for (rule_id, field) in infer_mapping(&grouped, &thresholds).iter() {
        info!(rule = %rule_id, ?field, "Suggested mapping");
    }
    Ok(())
}
