//! Per-site strategy: feeds first, HTML listing when feeds give nothing.

use crate::http::HttpClient;
use crate::models::ArticleRecord;
use crate::scrapers::{feeds, html};
use tracing::{info, instrument};

/// Only the first few discovered feeds are read.
pub const MAX_FEEDS: usize = 6;

/// Collect raw records for one site.
///
/// The stage that produced them shows in each record's `via`.
///
/// # Arguments
///
/// * `http` - Shared client
/// * `site` - Bare host or root URL
/// * `max_links` - Cap on HTML-listing candidates
#[instrument(level = "info", skip(http))]
pub async fn scrape_site(http: &HttpClient, site: &str, max_links: usize) -> Vec<ArticleRecord> {
    let candidates = feeds::discover_feeds(http, site).await;
    let mut records = Vec::new();
    for feed_url in candidates.iter().take(MAX_FEEDS) {
        records.extend(feeds::fetch_feed(http, feed_url).await);
    }
    if !records.is_empty() {
        info!(count = records.len(), "Collected from feeds");
        return records;
    }

    let records = html::fetch_html_listing(http, site, max_links).await;
    info!(count = records.len(), "Collected from HTML listing");
    records
}
