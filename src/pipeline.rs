//! Run orchestration.
//!
//! Sources run one after another in configuration order. Each yields raw
//! records plus a [`SourceReport`]; the merged records are de-duplicated and
//! then capped to the day window. A source that cannot run is reported and
//! skipped, and a source whose upstream fails is reported as failed with
//! whatever it gathered before the failure. Neither is fatal.

use crate::config::{Config, SourceConfig, TrainedSource};
use crate::extraction::ExtractionEngine;
use crate::http::HttpClient;
use crate::models::{ArticleRecord, RunReport, SourceDiagnostic, SourceKind, SourceReport, TimelineSeries};
use crate::normalize::dedup::dedup;
use crate::normalize::window::{DatelessPolicy, DayWindow, cap};
use crate::progress::TracingObserver;
use crate::scrapers::gdelt::{ArticleSearchApi, fetch_timelines, gdelt_query, rolling_collect};
use crate::scrapers::site::scrape_site;
use crate::scrapers::trained::scrape_trained;
use tracing::{info, instrument, warn};

/// Dedup then day-cap, the final step over the merged record set.
pub fn finalize(records: Vec<ArticleRecord>, window: &DayWindow, policy: DatelessPolicy) -> Vec<ArticleRecord> {
    cap(dedup(records), window, policy)
}

/// What one source produced before its report is built.
#[derive(Debug, Default)]
struct SourceRun {
    records: Vec<ArticleRecord>,
    /// Limit or failure note; `NoResults` is derived from `records`.
    diagnostic: Option<SourceDiagnostic>,
    timelines: Vec<TimelineSeries>,
}

pub struct Pipeline<'a, E, A> {
    config: &'a Config,
    http: &'a HttpClient,
    engine: &'a E,
    gdelt: &'a A,
    window: DayWindow,
    policy: DatelessPolicy,
}

impl<'a, E, A> Pipeline<'a, E, A>
where
    E: ExtractionEngine,
    A: ArticleSearchApi,
{
    /// The dateless policy is taken from `config.keep_dateless`.
    pub fn new(config: &'a Config, http: &'a HttpClient, engine: &'a E, gdelt: &'a A, window: DayWindow) -> Self {
        Self {
            config,
            http,
            engine,
            gdelt,
            window,
            policy: DatelessPolicy::from_keep_flag(config.keep_dateless),
        }
    }

    #[instrument(level = "info", skip_all, fields(start = %self.window.start, end = %self.window.end, sources = self.config.sources.len()))]
    pub async fn run(&self) -> RunReport {
        let mut merged = Vec::new();
        let mut sources = Vec::with_capacity(self.config.sources.len());
        let mut timelines = Vec::new();
        for source in &self.config.sources {
            let (run, report) = self.run_source(source).await;
            merged.extend(run.records);
            timelines.extend(run.timelines);
            sources.push(report);
        }
        let raw = merged.len();
        let records = finalize(merged, &self.window, self.policy);
        info!(raw, kept = records.len(), timelines = timelines.len(), "Run complete");
        RunReport {
            records,
            sources,
            timelines,
        }
    }

    async fn run_source(&self, source: &SourceConfig) -> (SourceRun, SourceReport) {
        let name = source.name();
        let (kind, outcome) = match source {
            SourceConfig::Site { site, max_links } => {
                let records = scrape_site(self.http, site, *max_links).await;
                (
                    SourceKind::Site,
                    Ok(SourceRun {
                        records,
                        ..SourceRun::default()
                    }),
                )
            }
            SourceConfig::Trained(trained) => (SourceKind::Trained, self.run_trained(trained).await),
            SourceConfig::Gdelt { country } => (SourceKind::Gdelt, self.run_gdelt(&name, country).await),
        };

        let mut run = match outcome {
            Ok(run) => run,
            Err(reason) => {
                warn!(source = %name, %reason, "Source skipped");
                SourceRun {
                    diagnostic: Some(SourceDiagnostic::Skipped(reason)),
                    ..SourceRun::default()
                }
            }
        };
        if run.diagnostic.is_none() && run.records.is_empty() {
            run.diagnostic = Some(SourceDiagnostic::NoResults);
        }
        info!(source = %name, count = run.records.len(), diagnostic = ?run.diagnostic, "Source finished");
        let report = SourceReport {
            name,
            kind,
            contributed: run.records.len(),
            diagnostic: run.diagnostic.clone(),
        };
        (run, report)
    }

    /// `Err` carries a skip reason.
    async fn run_trained(&self, trained: &TrainedSource) -> Result<SourceRun, String> {
        if trained.rules.trim().is_empty() {
            return Err("no trained rule set configured".to_string());
        }
        if !self.engine.rules_available(&trained.rules) {
            return Err(format!("rule set {} is not available", trained.rules));
        }
        if trained.pagination.is_none() && trained.url.trim().is_empty() {
            return Err("neither a page url nor pagination is configured".to_string());
        }
        let scrape = scrape_trained(self.engine, self.http, trained, &self.config.inference, self.window.tz).await;
        let diagnostic = match (scrape.hit_page_cap, scrape.pages_scraped) {
            (true, Some(pages)) => Some(SourceDiagnostic::LimitReached(format!(
                "page cap reached after {pages} pages"
            ))),
            _ => None,
        };
        Ok(SourceRun {
            records: scrape.records,
            diagnostic,
            timelines: Vec::new(),
        })
    }

    async fn run_gdelt(&self, name: &str, country: &str) -> Result<SourceRun, String> {
        let settings = &self.config.gdelt;
        let Some(fips) = settings.fips.get(country) else {
            return Err(format!("no FIPS code mapped for {country}"));
        };
        let query = gdelt_query(fips, &settings.themes);
        let observer = TracingObserver::new(name);
        let outcome = rolling_collect(self.gdelt, &query, &self.window, settings, self.policy, &observer).await;

        let diagnostic = match outcome.failure {
            Some(reason) => Some(SourceDiagnostic::Failed(reason)),
            None if outcome.ceiling_hit => Some(SourceDiagnostic::LimitReached(format!(
                "result ceiling of {} exceeded",
                settings.ceiling
            ))),
            None => None,
        };
        let timelines = if settings.timelines {
            fetch_timelines(self.gdelt, name, &query, &self.window, settings.timeline_smooth).await
        } else {
            Vec::new()
        };
        Ok(SourceRun {
            records: outcome.records,
            diagnostic,
            timelines,
        })
    }
}
