//! Command-line interface definitions.
//!
//! Two subcommands: `run` executes the configured sources over a day window
//! and writes the results, `train` learns an extraction rule set from a
//! listing page and sample values copied from it. Paths can also come from
//! environment variables.

use crate::error::ConfigError;
use crate::normalize::window::DayWindow;
use chrono::{Days, NaiveDate, Utc};
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};

/// News metadata ingestion.
///
/// # Examples
///
/// ```sh
/// # Yesterday and today in the configured timezone
/// iris_news run -c configs/sources.yaml
///
/// # An explicit window, keeping undated records
/// iris_news run -c configs/sources.yaml --start 2024-03-01 --end 2024-03-02 --keep-dateless
///
/// # Learn rules from a listing page
/// iris_news train --url https://daily.example.com/latest \
///     -s "Parliament passes budget" -s https://daily.example.com/news/budget \
///     -o configs/daily.rules.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Collect, normalize, de-duplicate and day-cap articles from all sources
    Run(RunArgs),
    /// Learn an extraction rule set from a page and sample values
    Train(TrainArgs),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the YAML run configuration
    #[arg(short, long, env = "IRIS_CONFIG")]
    pub config: String,

    /// First day of the window (YYYY-MM-DD), default yesterday
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day of the window (YYYY-MM-DD), default today
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Output directory for the JSON files
    #[arg(short, long, env = "IRIS_OUTPUT_DIR", default_value = "data")]
    pub output_dir: String,

    /// File name prefix of the outputs
    #[arg(short, long, default_value = "news")]
    pub label: String,

    /// Keep records without a publication date
    #[arg(long)]
    pub keep_dateless: bool,
}

impl RunArgs {
    /// Resolve the day window, defaulting to yesterday..today in `tz`.
    pub fn window(&self, tz: Tz) -> Result<DayWindow, ConfigError> {
        let today = Utc::now().with_timezone(&tz).date_naive();
        let end = self.end.unwrap_or(today);
        let start = match self.start {
            Some(start) => start,
            None => today
                .checked_sub_days(Days::new(1))
                .ok_or_else(|| ConfigError::Date(today.to_string()))?,
        };
        if start > end {
            return Err(ConfigError::Window(format!("{start} is after {end}")));
        }
        Ok(DayWindow::new(start, end, tz))
    }
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Page to learn from
    #[arg(short, long)]
    pub url: String,

    /// Value copied from the page (headline, link or date); repeatable
    #[arg(short, long = "sample", required = true)]
    pub samples: Vec<String>,

    /// Where to write the rule set JSON
    #[arg(short, long)]
    pub out: String,

    /// Optional YAML run configuration for HTTP settings
    #[arg(short, long, env = "IRIS_CONFIG")]
    pub config: Option<String>,
}
