//! Progress observation for long-running producers.
//!
//! The rolling GDELT aggregator reports each batch, any warning or error, and
//! its final total through a [`ProgressObserver`]. Observers only watch: they
//! return nothing and cannot influence paging or results, so callers that do
//! not care pass [`NoopObserver`].
//!
//! | Event | Method | When |
//! |-------|--------|------|
//! | batch | [`ProgressObserver::on_batch`] | After every API call that returned |
//! | warning | [`ProgressObserver::on_warning`] | A safety limit stopped collection |
//! | error | [`ProgressObserver::on_error`] | A call failed and paging stopped |
//! | done | [`ProgressObserver::on_done`] | After day-capping and de-duplication |

use tracing::{error, info, warn};

/// Snapshot emitted after each batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// 1-based index of the call.
    pub batch: usize,
    /// Articles returned by this call.
    pub fetched: usize,
    /// Articles accumulated before this call.
    pub total: usize,
}

pub trait ProgressObserver {
    fn on_batch(&self, _progress: BatchProgress) {}
    fn on_warning(&self, _message: &str) {}
    fn on_error(&self, _message: &str) {}
    fn on_done(&self, _total: usize) {}
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Forwards events to `tracing`, tagged with the source being collected.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    source: String,
}

impl TracingObserver {
    pub fn new(source: impl Into<String>) -> Self {
        Self { source: source.into() }
    }
}

impl ProgressObserver for TracingObserver {
    fn on_batch(&self, progress: BatchProgress) {
        info!(
            source = %self.source,
            batch = progress.batch,
            fetched = progress.fetched,
            cumulative = progress.total + progress.fetched,
            "Batch fetched"
        );
    }

    fn on_warning(&self, message: &str) {
        warn!(source = %self.source, %message, "Collection warning");
    }

    fn on_error(&self, message: &str) {
        error!(source = %self.source, %message, "Collection error");
    }

    fn on_done(&self, total: usize) {
        info!(source = %self.source, total, "Collection complete after capping and dedup");
    }
}
