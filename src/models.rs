//! Data models shared by every producer and by the output writers.
//!
//! - [`ArticleRecord`]: the normalized unit of output
//! - [`Via`]: provenance tag of a record
//! - [`ExtractedItem`]: one positional item assembled from a trained extractor
//! - [`SourceReport`] / [`SourceDiagnostic`]: what each configured source did
//! - [`TimelineSeries`]: GDELT coverage volume or tone over the day window
//!
//! Timestamps are stored as `DateTime<Utc>`, so anything that reaches a
//! record has already been anchored to UTC and serializes as an RFC 3339
//! UTC string.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Which producer created a record. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Via {
    Rss,
    Html,
    Gdelt,
    TrainedExtractor,
}

/// A single news article as emitted by the pipeline.
///
/// # Fields
///
/// * `title` - Headline, empty when it could not be recovered
/// * `url` - Canonical URL (see [`crate::normalize::canonical`])
/// * `published_at` - Publication instant in UTC, if one was found
/// * `source` - Origin host or configured site name
/// * `via` - Producer that created the record
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ArticleRecord {
    pub title: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
    pub via: Via,
}

/// A `{title, url, date}` triple assembled from grouped extraction output.
///
/// Any slot may be missing; the date has already been reduced to a calendar
/// day by the strict date parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractedItem {
    pub title: Option<String>,
    pub url: Option<String>,
    pub date: Option<NaiveDate>,
}

/// The kind of a configured source, as reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Site,
    Trained,
    Gdelt,
}

/// Non-fatal problem attached to one source's run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "reason", rename_all = "snake_case")]
pub enum SourceDiagnostic {
    /// The source was not run because its configuration is incomplete.
    Skipped(String),
    /// A safety limit (result ceiling, page cap) stopped collection early.
    LimitReached(String),
    /// An upstream call failed; records gathered before it are kept.
    Failed(String),
    /// The source ran but every stage came back empty.
    NoResults,
}

/// Per-source summary surfaced alongside the final record set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub kind: SourceKind,
    /// Records this source produced before the merged dedup and day cap.
    pub contributed: usize,
    pub diagnostic: Option<SourceDiagnostic>,
}

/// Which GDELT timeline a series holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineMode {
    /// Share of monitored coverage matching the query (`TimelineVol`).
    Volume,
    /// Average tone of matching coverage (`TimelineTone`).
    Tone,
}

impl TimelineMode {
    pub const ALL: [TimelineMode; 2] = [TimelineMode::Volume, TimelineMode::Tone];

    /// Value of the DOC API `mode` parameter.
    pub fn api_mode(self) -> &'static str {
        match self {
            TimelineMode::Volume => "TimelineVol",
            TimelineMode::Tone => "TimelineTone",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub at: DateTime<Utc>,
    pub value: f64,
}

/// One timeline fetched for a GDELT source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineSeries {
    pub source: String,
    pub mode: TimelineMode,
    pub points: Vec<TimelinePoint>,
}

/// Output of one orchestrated run.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub records: Vec<ArticleRecord>,
    pub sources: Vec<SourceReport>,
    /// Empty unless `gdelt.timelines` is enabled.
    pub timelines: Vec<TimelineSeries>,
}
