//! Run configuration.
//!
//! A single YAML document describes the reference timezone, HTTP settings,
//! inference thresholds, GDELT parameters and the list of sources to run.
//! It is read once per run and passed down by reference.
//!
//! ```yaml
//! timezone: Europe/London
//! keep_dateless: false
//! sources:
//!   - kind: site
//!     site: example.com
//!   - kind: trained
//!     name: Example Daily
//!     url: https://daily.example.com/latest
//!     rules: configs/example_daily.rules.json
//!     mapping: { rule_1a2b3c4d: url, rule_99aa00bb: auto }
//!     pagination:
//!       page_url_template: https://daily.example.com/latest?page={page}
//!       max_pages: 5
//!       cutoff_date: 2024-03-01
//!   - kind: gdelt
//!     country: Serbia
//! ```

use crate::error::ConfigError;
use crate::extraction::mapping::{FieldChoice, InferenceThresholds};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, instrument};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0 Safari/537.36";

pub const GDELT_DOC_ENDPOINT: &str = "https://api.gdeltproject.org/api/v2/doc/doc";

/// Top-level run configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IANA name of the reference timezone used for calendar days.
    pub timezone: String,
    /// Keep records without a timestamp when applying the day window.
    pub keep_dateless: bool,
    pub http: HttpSettings,
    pub inference: InferenceThresholds,
    pub gdelt: GdeltSettings,
    pub sources: Vec<SourceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: "Europe/London".to_string(),
            keep_dateless: false,
            http: HttpSettings::default(),
            inference: InferenceThresholds::default(),
            gdelt: GdeltSettings::default(),
            sources: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// Worker pool size for per-article metadata fetches.
    pub concurrency: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            concurrency: 8,
        }
    }
}

impl HttpSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GdeltSettings {
    pub endpoint: String,
    pub max_per_call: usize,
    /// Stop paging once more than this many articles were accumulated.
    pub ceiling: usize,
    pub themes: Vec<String>,
    /// Logical source identifier (country name) to FIPS country code.
    pub fips: BTreeMap<String, String>,
    /// Also fetch the volume and tone timelines of each GDELT source.
    pub timelines: bool,
    pub timeline_smooth: u32,
}

impl Default for GdeltSettings {
    fn default() -> Self {
        let fips = [
            ("Serbia", "RI"),
            ("Kazakhstan", "KZ"),
            ("Uzbekistan", "UZ"),
            ("Armenia", "AM"),
            ("Azerbaijan", "AJ"),
            ("Romania", "RO"),
            ("Poland", "PL"),
            ("Czech", "EZ"),
            ("Hungary", "HU"),
            ("Ukraine", "UP"),
            ("Albania", "AL"),
            ("Montenegro", "MJ"),
            ("Macedonia", "MK"),
            ("Georgia", "GG"),
            ("Russia", "RS"),
        ]
        .into_iter()
        .map(|(country, code)| (country.to_string(), code.to_string()))
        .collect();

        Self {
            endpoint: GDELT_DOC_ENDPOINT.to_string(),
            max_per_call: 250,
            ceiling: 10_000,
            themes: ["EPU_ECONOMY", "POLITICAL_TURMOIL", "USPEC_POLITICS_GENERAL1", "EPU_POLICY"]
                .into_iter()
                .map(String::from)
                .collect(),
            fips,
            timelines: false,
            timeline_smooth: 7,
        }
    }
}

/// One configured source, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Feed discovery with HTML-listing fallback.
    Site {
        site: String,
        #[serde(default = "default_max_links")]
        max_links: usize,
    },
    /// Replay of a persisted trained rule set.
    Trained(TrainedSource),
    /// GDELT rolling query for a logical identifier.
    Gdelt { country: String },
}

impl SourceConfig {
    /// Human-readable name used in reports and logs.
    pub fn name(&self) -> String {
        match self {
            SourceConfig::Site { site, .. } => site.clone(),
            SourceConfig::Trained(trained) => trained.display_name(),
            SourceConfig::Gdelt { country } => format!("GDELT {country}"),
        }
    }
}

fn default_max_links() -> usize {
    60
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrainedSource {
    pub name: Option<String>,
    /// Page the rule set was trained on; replayed when no pagination is set.
    pub url: String,
    /// Reference to the persisted rule set (a JSON file path).
    pub rules: String,
    /// Only these rule ids are used when assembling items (all when empty).
    pub selected_rules: Vec<String>,
    /// Per-rule field overrides; `auto` defers to inference.
    pub mapping: BTreeMap<String, FieldChoice>,
    pub pagination: Option<PaginationSpec>,
    /// Fetch article pages to recover missing dates.
    pub hydrate_dates: bool,
}

impl TrainedSource {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| url::Url::parse(&self.url).ok().and_then(|u| u.host_str().map(String::from)))
            .unwrap_or_else(|| self.url.clone())
    }
}

/// How to walk a paginated listing.
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationSpec {
    /// URL with a `{page}` placeholder.
    pub page_url_template: String,
    #[serde(default = "default_start_page")]
    pub start_page: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Stop once a page's oldest date is earlier than this day.
    #[serde(default)]
    pub cutoff_date: Option<NaiveDate>,
}

fn default_start_page() -> u32 {
    1
}

fn default_max_pages() -> u32 {
    10
}

impl Config {
    /// Read and parse a YAML configuration file.
    #[instrument(level = "info", skip_all, fields(%path))]
    pub async fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_string(),
                source,
            })?;
        let config = Self::from_yaml(&raw)?;
        info!(sources = config.sources.len(), timezone = %config.timezone, "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(raw)?;
        config.reference_tz()?;
        Ok(config)
    }

    /// The parsed reference timezone.
    pub fn reference_tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::Timezone(format!("{}: {e}", self.timezone)))
    }
}
