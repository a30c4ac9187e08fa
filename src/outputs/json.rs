//! JSON output of a run.
//!
//! ```text
//! output_dir/
//! ├── serbia_2024-03-01_2024-03-02.json            # records
//! ├── serbia_2024-03-01_2024-03-02.report.json     # per-source reports
//! └── serbia_2024-03-01_2024-03-02.timelines.json  # GDELT timelines, when fetched
//! ```
//!
//! Timestamps serialize as RFC 3339 UTC strings.

use crate::models::RunReport;
use crate::normalize::window::DayWindow;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// `<dir>/<label>_<start>_<end><suffix>`.
fn output_path(output_dir: &str, label: &str, window: &DayWindow, suffix: &str) -> PathBuf {
    PathBuf::from(output_dir).join(format!("{label}_{}_{}{suffix}", window.start, window.end))
}

/// Write the records and the source reports of a run.
///
/// # Arguments
///
/// * `report` - Final records and per-source reports
/// * `output_dir` - Existing, writable directory
/// * `label` - File name prefix
/// * `window` - Day window the run covered
///
/// # Returns
///
/// The path of the records file.
#[instrument(level = "info", skip_all, fields(%output_dir, %label))]
pub async fn write_run(
    report: &RunReport,
    output_dir: &str,
    label: &str,
    window: &DayWindow,
) -> Result<PathBuf, Box<dyn Error>> {
    let records_path = output_path(output_dir, label, window, ".json");
    let report_path = output_path(output_dir, label, window, ".report.json");

    let records_json = serde_json::to_string_pretty(&report.records)?;
    if let Err(e) = fs::write(&records_path, records_json).await {
        error!(path = %records_path.display(), error = %e, "Failed writing records");
        return Err(e.into());
    }
    info!(path = %records_path.display(), count = report.records.len(), "Wrote records");

    fs::write(&report_path, serde_json::to_string_pretty(&report.sources)?).await?;
    info!(path = %report_path.display(), sources = report.sources.len(), "Wrote source report");

    if !report.timelines.is_empty() {
        let timelines_path = output_path(output_dir, label, window, ".timelines.json");
        fs::write(&timelines_path, serde_json::to_string_pretty(&report.timelines)?).await?;
        info!(path = %timelines_path.display(), series = report.timelines.len(), "Wrote timelines");
    }

    Ok(records_path)
}
