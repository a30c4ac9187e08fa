//! RSS / Atom feed discovery and parsing.
//!
//! Discovery guesses conventional feed paths on every root form of a site
//! and adds any `<link rel="alternate">` feed advertised in the root HTML.
//! Parsing goes through `feed-rs`, which handles RSS 0.9x/1.0/2.0, Atom and
//! JSON Feed alike.

use crate::error::{FetchError, FetchOutcome};
use crate::http::HttpClient;
use crate::models::{ArticleRecord, Via};
use crate::normalize::canonical::canonicalize;
use crate::utils::{collapse_whitespace, source_host};
use feed_rs::model::Entry;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Conventional feed locations, tried in this order.
pub const FEED_PATHS: [&str; 7] = ["/rss", "/feed", "/rss.xml", "/feed.xml", "/index.xml", "/atom.xml", "/feeds"];

static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("link[rel][href]").expect("static selector"));

/// Root URLs to probe for a site, preferred form first.
///
/// A bare host yields `https://host` then `http://host`; an explicit scheme
/// is kept first and the other scheme follows.
pub fn site_roots(site: &str) -> Vec<String> {
    let site = site.trim().trim_end_matches('/');
    let (first, second, rest) = if let Some(rest) = site.strip_prefix("https://") {
        ("https", "http", rest)
    } else if let Some(rest) = site.strip_prefix("http://") {
        ("http", "https", rest)
    } else {
        ("https", "http", site)
    };
    vec![format!("{first}://{rest}"), format!("{second}://{rest}")]
}

/// Resolve an href found on `root`: protocol-relative hrefs get `https:`.
pub(crate) fn resolve_href(root: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("//") {
        return Some(format!("https:{href}"));
    }
    Url::parse(root)
        .ok()
        .and_then(|base| base.join(href).ok())
        .map(|u| u.to_string())
}

/// Feed URLs advertised by `<link rel="alternate" type="...rss|atom|xml...">`.
pub fn alternate_feed_links(html: &str, root: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&LINK_SELECTOR)
        .filter(|link| {
            let rel = link.value().attr("rel").unwrap_or("");
            rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("alternate"))
        })
        .filter(|link| {
            let kind = link.value().attr("type").unwrap_or("").to_lowercase();
            kind.contains("rss") || kind.contains("atom") || kind.contains("xml")
        })
        .filter_map(|link| link.value().attr("href"))
        .filter_map(|href| resolve_href(root, href))
        .collect()
}

/// Ordered, duplicate-free candidate feed URLs for a site.
///
/// Network failures while reading a root page only drop that root's
/// advertised links; the guessed paths are always returned.
#[instrument(level = "info", skip(http))]
pub async fn discover_feeds(http: &HttpClient, site: &str) -> Vec<String> {
    let mut candidates = Vec::new();
    for root in site_roots(site) {
        candidates.extend(FEED_PATHS.iter().map(|path| format!("{root}{path}")));
        match http.get_text(&root).await {
            FetchOutcome::Success(html) => candidates.extend(alternate_feed_links(&html, &root)),
            FetchOutcome::Empty => debug!(%root, "Empty root page"),
            FetchOutcome::Failed(e) => debug!(%root, error = %e, "Root page unavailable"),
        }
    }
    let feeds: Vec<String> = candidates.into_iter().unique().collect();
    info!(candidates = feeds.len(), "Discovered feed candidates");
    feeds
}

fn entry_link(entry: &Entry) -> Option<String> {
    let usable = |href: &str| !href.trim().is_empty();
    entry
        .links
        .iter()
        .find(|l| usable(&l.href) && l.rel.as_deref().is_none_or(|rel| rel.eq_ignore_ascii_case("alternate")))
        .or_else(|| entry.links.iter().find(|l| usable(&l.href)))
        .map(|l| l.href.trim().to_string())
}

/// Map parsed feed bytes to records. Entries without a link or title are skipped.
pub fn parse_feed(bytes: &[u8], feed_url: &str) -> Result<Vec<ArticleRecord>, FetchError> {
    let feed = feed_rs::parser::parse(bytes).map_err(|e| FetchError::Malformed(e.to_string()))?;
    let source = source_host(feed_url);
    let records = feed
        .entries
        .iter()
        .filter_map(|entry| {
            let link = entry_link(entry)?;
            let title = entry
                .title
                .as_ref()
                .map(|t| collapse_whitespace(&t.content))
                .filter(|t| !t.is_empty())?;
            Some(ArticleRecord {
                title,
                url: canonicalize(&link),
                published_at: entry.published.or(entry.updated),
                source: source.clone(),
                via: Via::Rss,
            })
        })
        .collect();
    Ok(records)
}

/// Fetch and parse one feed. Any failure yields no records.
#[instrument(level = "info", skip(http))]
pub async fn fetch_feed(http: &HttpClient, feed_url: &str) -> Vec<ArticleRecord> {
    let bytes = match http.get_bytes(feed_url).await {
        FetchOutcome::Success(bytes) => bytes,
        FetchOutcome::Empty => return Vec::new(),
        FetchOutcome::Failed(e) => {
            debug!(error = %e, "Feed unavailable");
            return Vec::new();
        }
    };
    match parse_feed(&bytes, feed_url) {
        Ok(records) => {
            info!(count = records.len(), "Parsed feed");
            records
        }
        Err(e) => {
            warn!(error = %e, "Feed did not parse");
            Vec::new()
        }
    }
}
