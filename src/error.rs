//! Typed failure kinds for fetching and configuration.
//!
//! Nothing in the ingestion core treats these as fatal. A [`FetchError`]
//! downgrades one feed, page or article to "contributes nothing"; a
//! [`ConfigError`] only stops the binary before a run starts.

use reqwest::StatusCode;
use thiserror::Error;

/// Why a single network fetch or extraction replay produced nothing.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP status {0}")]
    Status(StatusCode),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("extraction rule set error: {0}")]
    RuleSet(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read configuration {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unknown timezone {0}")]
    Timezone(String),

    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    Date(String),

    #[error("invalid day window: {0}")]
    Window(String),
}

/// Result of one fetch or parse step.
///
/// Producers match on this and decide locally what an `Empty` or `Failed`
/// step contributes, which is always nothing.
#[derive(Debug)]
pub enum FetchOutcome<T> {
    Success(T),
    Empty,
    Failed(FetchError),
}

impl<T> FetchOutcome<T> {
    /// Collapse to an `Option`, discarding the failure reason.
    pub fn ok(self) -> Option<T> {
        match self {
            FetchOutcome::Success(value) => Some(value),
            FetchOutcome::Empty | FetchOutcome::Failed(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchOutcome<U> {
        match self {
            FetchOutcome::Success(value) => FetchOutcome::Success(f(value)),
            FetchOutcome::Empty => FetchOutcome::Empty,
            FetchOutcome::Failed(e) => FetchOutcome::Failed(e),
        }
    }
}
