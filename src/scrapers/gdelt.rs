//! GDELT DOC 2.0 `ArtList` client and the rolling-window collector.
//!
//! One `ArtList` call returns at most `maxrecords` articles, newest first.
//! To cover a whole day window, [`rolling_collect`] repeatedly moves the
//! query's end cursor to one second before the oldest article of the last
//! full batch until the window start is reached, an upstream call fails, a
//! batch comes back short, or the safety ceiling is exceeded.
//!
//! [`fetch_timelines`] asks the same query for its `TimelineVol` and
//! `TimelineTone` CSV series over the window.

use crate::config::GdeltSettings;
use crate::error::{FetchError, FetchOutcome};
use crate::http::HttpClient;
use crate::models::{ArticleRecord, TimelineMode, TimelinePoint, TimelineSeries, Via};
use crate::normalize::canonical::canonicalize;
use crate::normalize::dates::parse_any;
use crate::normalize::dedup::dedup;
use crate::normalize::window::{DatelessPolicy, DayWindow, cap};
use crate::progress::{BatchProgress, ProgressObserver};
use crate::utils::truncate_for_log;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

/// One article as returned by `ArtList` (`format=json`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GdeltArticle {
    pub title: Option<String>,
    pub url: Option<String>,
    /// `YYYYMMDDTHHMMSSZ`, when GDELT first saw the article.
    pub seendate: Option<String>,
    pub published: Option<String>,
    pub pubdate: Option<String>,
    pub domain: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ArtListResponse {
    #[serde(default)]
    articles: Vec<GdeltArticle>,
}

/// A single bounded `ArtList` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtListRequest {
    pub query: String,
    pub max_records: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// `YYYYMMDDHHMMSS` in UTC, the format GDELT expects for window bounds.
pub fn gdelt_timestamp(instant: &DateTime<Utc>) -> String {
    instant.format("%Y%m%d%H%M%S").to_string()
}

impl ArtListRequest {
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("query", self.query.clone()),
            ("mode", "ArtList".to_string()),
            ("format", "json".to_string()),
            ("maxrecords", self.max_records.to_string()),
            ("sort", "DateDesc".to_string()),
            ("startdatetime", gdelt_timestamp(&self.start)),
            ("enddatetime", gdelt_timestamp(&self.end)),
        ]
    }
}

/// A timeline request over one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineRequest {
    pub query: String,
    pub mode: TimelineMode,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Moving-average width in steps, `timelinesmooth`.
    pub smooth: u32,
}

impl TimelineRequest {
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("query", self.query.clone()),
            ("mode", self.mode.api_mode().to_string()),
            ("format", "csv".to_string()),
            ("timelinesmooth", self.smooth.to_string()),
            ("timezoom", "yes".to_string()),
            ("startdatetime", gdelt_timestamp(&self.start)),
            ("enddatetime", gdelt_timestamp(&self.end)),
        ]
    }
}

/// `sourcecountry:XX (theme:A OR theme:B ...)`.
pub fn gdelt_query(fips: &str, themes: &[String]) -> String {
    let themes = themes
        .iter()
        .map(|t| format!("theme:{t}"))
        .collect::<Vec<_>>()
        .join(" OR ");
    if themes.is_empty() {
        format!("sourcecountry:{fips}")
    } else {
        format!("sourcecountry:{fips} ({themes})")
    }
}

/// Article search capability; the live client and test fakes implement it.
pub trait ArticleSearchApi {
    async fn search(&self, request: &ArtListRequest) -> FetchOutcome<Vec<GdeltArticle>>;

    /// Timeline series for a query. Backends without timelines yield nothing.
    async fn timeline(&self, _request: &TimelineRequest) -> FetchOutcome<Vec<TimelinePoint>> {
        FetchOutcome::Empty
    }
}

/// Live GDELT client over the shared HTTP client.
pub struct GdeltClient<'a> {
    http: &'a HttpClient,
    endpoint: String,
}

impl<'a> GdeltClient<'a> {
    pub fn new(http: &'a HttpClient, endpoint: &str) -> Self {
        Self {
            http,
            endpoint: endpoint.to_string(),
        }
    }
}

/// Parse an `ArtList` JSON body. GDELT answers bad queries with plain text.
pub fn parse_artlist(body: &str) -> Result<Vec<GdeltArticle>, FetchError> {
    serde_json::from_str::<ArtListResponse>(body)
        .map(|r| r.articles)
        .map_err(|e| FetchError::Malformed(format!("{e}: {}", truncate_for_log(body.trim(), 200))))
}

/// Parse a timeline CSV body into points.
///
/// The first line is a header. Each row starts with a timestamp and ends
/// with the value; rows that do not parse are skipped.
pub fn parse_timeline_csv(body: &str) -> Vec<TimelinePoint> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .skip(1)
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            if parts.len() < 2 {
                return None;
            }
            let at = parse_any(Some(parts[0]))?;
            let value = parts.last()?.parse::<f64>().ok()?;
            Some(TimelinePoint { at, value })
        })
        .collect()
}

impl ArticleSearchApi for GdeltClient<'_> {
    async fn search(&self, request: &ArtListRequest) -> FetchOutcome<Vec<GdeltArticle>> {
        match self
            .http
            .get_text_with_query(&self.endpoint, &request.query_params())
            .await
        {
            FetchOutcome::Success(body) => match parse_artlist(&body) {
                Ok(articles) if articles.is_empty() => FetchOutcome::Empty,
                Ok(articles) => FetchOutcome::Success(articles),
                Err(e) => FetchOutcome::Failed(e),
            },
            FetchOutcome::Empty => FetchOutcome::Empty,
            FetchOutcome::Failed(e) => FetchOutcome::Failed(e),
        }
    }

    async fn timeline(&self, request: &TimelineRequest) -> FetchOutcome<Vec<TimelinePoint>> {
        let outcome = self
            .http
            .get_text_with_query(&self.endpoint, &request.query_params())
            .await
            .map(|body| parse_timeline_csv(&body));
        match outcome {
            FetchOutcome::Success(points) if points.is_empty() => FetchOutcome::Empty,
            other => other,
        }
    }
}

/// Map one GDELT article to a record. Articles without a URL are dropped.
///
/// The timestamp is taken from `seendate`, then `published`, then `pubdate`.
pub fn article_to_record(article: &GdeltArticle) -> Option<ArticleRecord> {
    let url = article.url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
    let published_at = parse_any(article.seendate.as_deref())
        .or_else(|| parse_any(article.published.as_deref()))
        .or_else(|| parse_any(article.pubdate.as_deref()));
    Some(ArticleRecord {
        title: article.title.as_deref().unwrap_or("").trim().to_string(),
        url: canonicalize(url),
        published_at,
        source: article.domain.clone().unwrap_or_default(),
        via: Via::Gdelt,
    })
}

/// Result of a rolling collection.
#[derive(Debug, Default)]
pub struct RollingOutcome {
    /// Day-capped, deduplicated records.
    pub records: Vec<ArticleRecord>,
    /// API calls made.
    pub batches: usize,
    pub ceiling_hit: bool,
    /// Message of the failure that stopped paging, if any.
    pub failure: Option<String>,
}

/// Collect every article in `window` matching `query`, past the per-call cap.
///
/// # Arguments
///
/// * `api` - Article search capability
/// * `query` - Query expression, see [`gdelt_query`]
/// * `window` - Inclusive day window in the reference timezone
/// * `settings` - Per-call cap and safety ceiling
/// * `policy` - Dateless handling for the final day cap
/// * `observer` - Receives batch, warning, error and completion events
#[instrument(level = "info", skip_all, fields(%query))]
pub async fn rolling_collect<A, O>(
    api: &A,
    query: &str,
    window: &DayWindow,
    settings: &GdeltSettings,
    policy: DatelessPolicy,
    observer: &O,
) -> RollingOutcome
where
    A: ArticleSearchApi,
    O: ProgressObserver,
{
    let start = window.start_instant();
    let mut cursor = window.end_instant();
    let mut collected: Vec<ArticleRecord> = Vec::new();
    let mut outcome = RollingOutcome::default();

    loop {
        outcome.batches += 1;
        let request = ArtListRequest {
            query: query.to_string(),
            max_records: settings.max_per_call,
            start,
            end: cursor,
        };
        let articles = match api.search(&request).await {
            FetchOutcome::Success(articles) => articles,
            FetchOutcome::Empty => Vec::new(),
            FetchOutcome::Failed(e) => {
                let message = e.to_string();
                observer.on_error(&message);
                outcome.failure = Some(message);
                break;
            }
        };
        observer.on_batch(BatchProgress {
            batch: outcome.batches,
            fetched: articles.len(),
            total: collected.len(),
        });
        if articles.is_empty() {
            break;
        }

        collected.extend(articles.iter().filter_map(article_to_record));
        if articles.len() < settings.max_per_call {
            break;
        }

        let oldest = articles
            .iter()
            .filter_map(|a| parse_any(a.seendate.as_deref()))
            .min();
        let Some(oldest) = oldest else {
            observer.on_warning("Full batch without a parseable seendate; stopping");
            break;
        };
        if oldest <= start {
            break;
        }
        cursor = oldest - Duration::seconds(1);
        debug!(%cursor, "Moved window cursor");

        if collected.len() > settings.ceiling {
            outcome.ceiling_hit = true;
            observer.on_warning(&format!(
                "Stopping after {} articles (ceiling {})",
                collected.len(),
                settings.ceiling
            ));
            break;
        }
    }

    outcome.records = dedup(cap(collected, window, policy));
    observer.on_done(outcome.records.len());
    outcome
}

/// Fetch the volume and tone timelines of `query` over `window`.
///
/// A mode that fails or comes back empty is left out.
#[instrument(level = "info", skip_all, fields(%source, %query))]
pub async fn fetch_timelines<A: ArticleSearchApi>(
    api: &A,
    source: &str,
    query: &str,
    window: &DayWindow,
    smooth: u32,
) -> Vec<TimelineSeries> {
    let mut series = Vec::new();
    for mode in TimelineMode::ALL {
        let request = TimelineRequest {
            query: query.to_string(),
            mode,
            start: window.start_instant(),
            end: window.end_instant(),
            smooth,
        };
        match api.timeline(&request).await {
            FetchOutcome::Success(points) => {
                info!(?mode, points = points.len(), "Fetched timeline");
                series.push(TimelineSeries {
                    source: source.to_string(),
                    mode,
                    points,
                });
            }
            FetchOutcome::Empty => debug!(?mode, "No timeline data"),
            FetchOutcome::Failed(e) => warn!(?mode, error = %e, "Timeline fetch failed"),
        }
    }
    series
}
