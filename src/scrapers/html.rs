//! HTML-listing fallback and article date extraction.
//!
//! When a site exposes no usable feed, its front page is read as a listing:
//! same-domain anchors that look like article links become candidates, and
//! each candidate page is fetched (bounded concurrency) to recover a
//! publication date from its metadata.

use crate::http::HttpClient;
use crate::models::{ArticleRecord, Via};
use crate::normalize::canonical::canonicalize;
use crate::normalize::dates::parse_any;
use crate::scrapers::feeds::{resolve_href, site_roots};
use crate::utils::{collapse_whitespace, source_host};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

/// Path fragments that mark an anchor as a probable article link.
pub const ARTICLE_HINTS: [&str; 6] = ["/news", "/article", "/polit", "/biz", "/202", "/20"];

const MIN_ANCHOR_TEXT: usize = 4;

/// Date metadata locations, highest priority first.
static DATE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        r#"meta[property="article:published_time"]"#,
        r#"meta[name="pubdate"]"#,
        r#"meta[itemprop="datePublished"]"#,
        r#"meta[name="date"]"#,
        r#"time[itemprop="datePublished"]"#,
        "time[datetime]",
        r#"meta[property="og:updated_time"]"#,
        r#"meta[property="og:published_time"]"#,
    ]
    .iter()
    .map(|s| Selector::parse(s).expect("static selector"))
    .collect()
});

static ANCHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector"));

fn date_value(element: &ElementRef) -> String {
    let attr = |name: &str| element.value().attr(name).filter(|v| !v.trim().is_empty());
    attr("content")
        .or_else(|| attr("datetime"))
        .map(String::from)
        .unwrap_or_else(|| element.text().collect())
}

/// Publication instant from an article page's metadata.
///
/// Only the first element of each location is consulted; the first value
/// that parses wins.
pub fn extract_article_date(html: &str) -> Option<DateTime<Utc>> {
    let document = Html::parse_document(html);
    DATE_SELECTORS.iter().find_map(|selector| {
        let element = document.select(selector).next()?;
        parse_any(Some(date_value(&element).as_str()))
    })
}

/// A listing anchor: its text, the URL to fetch and the canonical URL to emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCandidate {
    pub title: String,
    pub fetch_url: String,
    pub url: String,
}

/// The root host (minus `www.`) itself or one of its subdomains.
///
/// Sibling subdomains are not matched: a `news.example.com` root rejects
/// `www.example.com` links.
fn same_domain(host: &str, root_host: &str) -> bool {
    let domain = root_host.strip_prefix("www.").unwrap_or(root_host);
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Article-like, same-domain anchors from a listing page.
///
/// Deduplicated by canonical URL (first title wins) and capped to `max_links`.
pub fn listing_candidates(html: &str, root: &str, max_links: usize) -> Vec<ListingCandidate> {
    let Some(root_host) = Url::parse(root).ok().and_then(|u| u.host_str().map(String::from)) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|anchor| {
            let title = collapse_whitespace(&anchor.text().collect::<String>());
            if title.chars().count() < MIN_ANCHOR_TEXT {
                return None;
            }
            let resolved = resolve_href(root, anchor.value().attr("href")?)?;
            let host = Url::parse(&resolved).ok()?.host_str()?.to_string();
            let lowered = resolved.to_lowercase();
            if !same_domain(&host, &root_host) || !ARTICLE_HINTS.iter().any(|hint| lowered.contains(hint)) {
                return None;
            }
            Some(ListingCandidate {
                title,
                url: canonicalize(&resolved),
                fetch_url: resolved,
            })
        })
        .unique_by(|c| c.url.clone())
        .take(max_links)
        .collect()
}

/// Fetch each page and extract its date, keeping input order.
///
/// At most `http.concurrency()` requests are in flight. A failed page
/// yields `None` in its slot.
#[instrument(level = "info", skip_all, fields(pages = urls.len()))]
pub async fn fetch_article_dates(http: &HttpClient, urls: &[String]) -> Vec<Option<DateTime<Utc>>> {
    let dates: Vec<Option<DateTime<Utc>>> = stream::iter(urls.iter())
        .map(|url| async move {
            let date = http
                .get_text(url)
                .await
                .ok()
                .and_then(|html| extract_article_date(&html));
            debug!(%url, found = date.is_some(), "Article date lookup");
            date
        })
        .buffered(http.concurrency())
        .collect()
        .await;
    info!(dated = dates.iter().flatten().count(), "Article dates fetched");
    dates
}

/// Scrape a site's front page as an article listing.
///
/// An unreachable front page yields no records.
#[instrument(level = "info", skip(http))]
pub async fn fetch_html_listing(http: &HttpClient, site: &str, max_links: usize) -> Vec<ArticleRecord> {
    let roots = site_roots(site);
    let root = &roots[0];
    let Some(html) = http.get_text(root).await.ok() else {
        debug!(%root, "Listing page unavailable");
        return Vec::new();
    };
    let candidates = listing_candidates(&html, root, max_links);
    info!(candidates = candidates.len(), "Listing candidates");

    let fetch_urls: Vec<String> = candidates.iter().map(|c| c.fetch_url.clone()).collect();
    let dates = fetch_article_dates(http, &fetch_urls).await;
    let source = source_host(root);

    candidates
        .into_iter()
        .zip(dates)
        .map(|(candidate, published_at)| ArticleRecord {
            title: candidate.title,
            url: candidate.url,
            published_at,
            source: source.clone(),
            via: Via::Html,
        })
        .collect()
}
