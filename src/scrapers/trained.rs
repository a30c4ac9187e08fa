//! Trained-source collection: single-page replay or paginated walk.
//!
//! Each page is replayed through an [`ExtractionEngine`], optionally
//! narrowed to selected rules, mapped to fields (overrides over inference)
//! and assembled into items. Items become records dated at local midnight of
//! their calendar day; with hydration on, undated items get the publication
//! instant from their article page instead.

use crate::config::{PaginationSpec, TrainedSource};
use crate::extraction::ExtractionEngine;
use crate::extraction::mapping::{FieldChoice, InferenceThresholds, assemble, resolve_mapping};
use crate::http::HttpClient;
use crate::models::{ArticleRecord, ExtractedItem, Via};
use crate::normalize::canonical::canonicalize;
use crate::normalize::window::local_midnight;
use crate::scrapers::html::fetch_article_dates;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument, warn};

/// Items gathered across pages.
#[derive(Debug, Default)]
pub struct PageCollection {
    pub items: Vec<ExtractedItem>,
    pub pages_scraped: u32,
    /// Every page up to `max_pages` was scraped without an early stop.
    pub hit_page_cap: bool,
}

/// How the active field mapping is chosen for each replayed page.
#[derive(Debug, Clone, Copy)]
pub struct MappingContext<'a> {
    pub selected: &'a [String],
    pub overrides: &'a BTreeMap<String, FieldChoice>,
    pub thresholds: &'a InferenceThresholds,
}

fn page_url(template: &str, page: u32) -> String {
    template.replace("{page}", &page.to_string())
}

async fn replay_items<E: ExtractionEngine>(
    engine: &E,
    rules: &str,
    url: &str,
    ctx: MappingContext<'_>,
) -> Result<Vec<ExtractedItem>, crate::error::FetchError> {
    let mut grouped = engine.replay(rules, url).await?;
    grouped.retain_rules(ctx.selected);
    let mapping = resolve_mapping(&grouped, ctx.overrides, ctx.thresholds);
    Ok(assemble(&grouped, &mapping))
}

/// Walk a paginated listing.
///
/// A page counts as scraped once it was replayed, even when all its items
/// were duplicates. The walk stops after a failed replay, after a page that
/// assembled no items, or once a page's oldest date falls before the cutoff.
/// Pages without any date never trigger the cutoff.
#[instrument(level = "info", skip_all, fields(template = %pagination.page_url_template))]
pub async fn collect_pages<E: ExtractionEngine>(
    engine: &E,
    rules: &str,
    pagination: &PaginationSpec,
    ctx: MappingContext<'_>,
) -> PageCollection {
    let mut collection = PageCollection::default();
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut stopped_early = false;

    for offset in 0..pagination.max_pages {
        let page = pagination.start_page.saturating_add(offset);
        let url = page_url(&pagination.page_url_template, page);
        let page_items = match replay_items(engine, rules, &url, ctx).await {
            Ok(items) => items,
            Err(e) => {
                warn!(page, error = %e, "Page replay failed; stopping pagination");
                stopped_early = true;
                break;
            }
        };

        let mut oldest: Option<NaiveDate> = None;
        for item in &page_items {
            if let Some(url) = &item.url {
                if !seen_urls.insert(canonicalize(url)) {
                    continue;
                }
            }
            if let Some(date) = item.date {
                oldest = Some(oldest.map_or(date, |o| o.min(date)));
            }
            collection.items.push(item.clone());
        }
        collection.pages_scraped += 1;
        debug!(page, items = page_items.len(), ?oldest, "Page scraped");

        if let (Some(cutoff), Some(oldest)) = (pagination.cutoff_date, oldest) {
            if oldest < cutoff {
                info!(page, %oldest, %cutoff, "Reached cutoff date");
                stopped_early = true;
                break;
            }
        }
        if page_items.is_empty() {
            stopped_early = true;
            break;
        }
    }

    collection.hit_page_cap = !stopped_early && pagination.max_pages > 0;
    info!(
        pages = collection.pages_scraped,
        items = collection.items.len(),
        hit_page_cap = collection.hit_page_cap,
        "Pagination finished"
    );
    collection
}

/// Replay the trained page once; duplicate URLs keep their first item.
#[instrument(level = "info", skip_all, fields(url = %url))]
pub async fn collect_single<E: ExtractionEngine>(
    engine: &E,
    rules: &str,
    url: &str,
    ctx: MappingContext<'_>,
) -> Vec<ExtractedItem> {
    match replay_items(engine, rules, url, ctx).await {
        Ok(items) => {
            let mut seen_urls = HashSet::new();
            items
                .into_iter()
                .filter(|item| item.url.as_ref().is_none_or(|u| seen_urls.insert(canonicalize(u))))
                .collect()
        }
        Err(e) => {
            warn!(error = %e, "Replay failed");
            Vec::new()
        }
    }
}

/// Publication instants for undated items that have a URL.
///
/// The result is aligned with `items`; slots that were not looked up or
/// whose page failed are `None`.
pub async fn hydrate_dates(http: &HttpClient, items: &[ExtractedItem]) -> Vec<Option<DateTime<Utc>>> {
    let wanted: Vec<(usize, String)> = items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.date.is_none())
        .filter_map(|(i, item)| item.url.clone().map(|url| (i, url)))
        .collect();
    let mut hydrated = vec![None; items.len()];
    if wanted.is_empty() {
        return hydrated;
    }
    let urls: Vec<String> = wanted.iter().map(|(_, url)| url.clone()).collect();
    let dates = fetch_article_dates(http, &urls).await;
    for ((i, _), date) in wanted.into_iter().zip(dates) {
        hydrated[i] = date;
    }
    hydrated
}

/// Build a record from an item; items with neither URL nor title are dropped.
///
/// An extracted calendar day is anchored at 00:00 in `tz`, the reference
/// timezone of the day window, so it never shifts to a neighbouring day.
pub fn item_to_record(
    item: ExtractedItem,
    source: &str,
    tz: Tz,
    hydrated: Option<DateTime<Utc>>,
) -> Option<ArticleRecord> {
    if item.url.is_none() && item.title.is_none() {
        return None;
    }
    Some(ArticleRecord {
        title: item.title.unwrap_or_default(),
        url: item.url.map(|u| canonicalize(&u)).unwrap_or_default(),
        published_at: item.date.map(|date| local_midnight(date, tz)).or(hydrated),
        source: source.to_string(),
        via: Via::TrainedExtractor,
    })
}

/// Records from one trained source.
#[derive(Debug, Default)]
pub struct TrainedScrape {
    pub records: Vec<ArticleRecord>,
    /// Set when the source is paginated.
    pub pages_scraped: Option<u32>,
    pub hit_page_cap: bool,
}

/// Collect a trained source end to end.
///
/// # Arguments
///
/// * `engine` - Replays the source's rule set
/// * `http` - Used only for date hydration
/// * `source` - Trained source configuration
/// * `thresholds` - Field inference cut-offs
/// * `tz` - Reference timezone extracted calendar days are anchored in
pub async fn scrape_trained<E: ExtractionEngine>(
    engine: &E,
    http: &HttpClient,
    source: &TrainedSource,
    thresholds: &InferenceThresholds,
    tz: Tz,
) -> TrainedScrape {
    let ctx = MappingContext {
        selected: &source.selected_rules,
        overrides: &source.mapping,
        thresholds,
    };
    let mut scrape = TrainedScrape::default();
    let items = match &source.pagination {
        Some(pagination) => {
            let collection = collect_pages(engine, &source.rules, pagination, ctx).await;
            scrape.pages_scraped = Some(collection.pages_scraped);
            scrape.hit_page_cap = collection.hit_page_cap;
            collection.items
        }
        None => collect_single(engine, &source.rules, &source.url, ctx).await,
    };

    let hydrated = if source.hydrate_dates {
        hydrate_dates(http, &items).await
    } else {
        vec![None; items.len()]
    };
    let name = source.display_name();
    scrape.records = items
        .into_iter()
        .zip(hydrated)
        .filter_map(|(item, date)| item_to_record(item, &name, tz, date))
        .collect();
    info!(source = %name, count = scrape.records.len(), "Trained source collected");
    scrape
}


#[cfg(test)]
mod tests {
    use super::testing::FakeEngine;
    use super::*;
    use crate::config::HttpSettings;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;
    use chrono_tz::Europe::London;
    use mockito::Server;

    const TEMPLATE: &str = "https://ex.com/news?page={page}";

    fn ctx<'a>(
        selected: &'a [String],
        overrides: &'a BTreeMap<String, FieldChoice>,
        thresholds: &'a InferenceThresholds,
    ) -> MappingContext<'a> {
        MappingContext {
            selected,
            overrides,
            thresholds,
        }
    }

    fn pagination(cutoff: Option<NaiveDate>) -> PaginationSpec {
        PaginationSpec {
            page_url_template: TEMPLATE.to_string(),
            start_page: 1,
            max_pages: 10,
            cutoff_date: cutoff,
        }
    }

    fn cutoff_engine() -> FakeEngine {
        FakeEngine::default()
            .with_page(
                "https://ex.com/news?page=1",
                &[
                    ("u", &["https://ex.com/a", "https://ex.com/b"]),
                    ("d", &["2024-03-12", "2024-03-10"]),
                ],
            )
            .with_page(
                "https://ex.com/news?page=2",
                &[
                    ("u", &["https://ex.com/c", "https://ex.com/d"]),
                    ("d", &["2024-03-08", "2024-03-05"]),
                ],
            )
            .with_page(
                "https://ex.com/news?page=3",
                &[
                    ("u", &["https://ex.com/e", "https://ex.com/f"]),
                    ("d", &["2024-02-25", "2024-02-20"]),
                ],
            )
            .with_page(
                "https://ex.com/news?page=4",
                &[("u", &["https://ex.com/g"]), ("d", &["2024-02-10"])],
            )
    }

    #[tokio::test]
    async fn test_cutoff_stops_after_page_three() {
        let engine = cutoff_engine();
        let overrides = BTreeMap::new();
        let thresholds = InferenceThresholds::default();
        let cutoff = NaiveDate::from_ymd_opt(2024, 3, 1);

        let collection = collect_pages(&engine, "rules.json", &pagination(cutoff), ctx(&[], &overrides, &thresholds)).await;

        assert_eq!(collection.pages_scraped, 3);
        assert_eq!(collection.items.len(), 6);
        assert!(!collection.hit_page_cap);
        assert_eq!(engine.requested.borrow().len(), 3);
    }

    #[tokio::test]
    async fn test_no_cutoff_runs_until_failure() {
        let engine = cutoff_engine();
        let overrides = BTreeMap::new();
        let thresholds = InferenceThresholds::default();

        let collection = collect_pages(&engine, "rules.json", &pagination(None), ctx(&[], &overrides, &thresholds)).await;

        // Page 5 is unknown to the fake engine and fails.
        assert_eq!(collection.pages_scraped, 4);
        assert_eq!(collection.items.len(), 7);
        assert_eq!(engine.requested.borrow().len(), 5);
    }

    #[tokio::test]
    async fn test_dateless_pages_ignore_cutoff_and_hit_cap() {
        let mut engine = FakeEngine::default();
        for page in 1..=3 {
            engine = engine.with_page(
                &format!("https://ex.com/news?page={page}"),
                &[("u", &[format!("https://ex.com/{page}").as_str()])],
            );
        }
        let overrides = BTreeMap::new();
        let thresholds = InferenceThresholds::default();
        let spec = PaginationSpec {
            max_pages: 3,
            ..pagination(NaiveDate::from_ymd_opt(2024, 3, 1))
        };

        let collection = collect_pages(&engine, "rules.json", &spec, ctx(&[], &overrides, &thresholds)).await;
        assert_eq!(collection.pages_scraped, 3);
        assert!(collection.hit_page_cap);
    }

    #[tokio::test]
    async fn test_duplicates_skipped_but_page_counted() {
        let engine = FakeEngine::default()
            .with_page("https://ex.com/news?page=1", &[("u", &["https://ex.com/a"])])
            .with_page("https://ex.com/news?page=2", &[("u", &["https://ex.com/a/"])])
            .with_page("https://ex.com/news?page=3", &[("u", &[])]);
        let overrides = BTreeMap::new();
        let thresholds = InferenceThresholds::default();

        let collection = collect_pages(&engine, "rules.json", &pagination(None), ctx(&[], &overrides, &thresholds)).await;
        assert_eq!(collection.pages_scraped, 3);
        assert_eq!(collection.items.len(), 1);
    }

    #[tokio::test]
    async fn test_selected_rules_and_overrides() {
        let engine = FakeEngine::default().with_page(
            "https://ex.com/latest",
            &[
                ("links", &["https://ex.com/a"]),
                ("alt_links", &["https://ex.com/z"]),
                ("heads", &["Central bank holds rates"]),
            ],
        );
        let selected = vec!["alt_links".to_string(), "heads".to_string()];
        let overrides: BTreeMap<String, FieldChoice> = [("heads".to_string(), FieldChoice::Title)].into_iter().collect();
        let thresholds = InferenceThresholds::default();

        let items = collect_single(&engine, "rules.json", "https://ex.com/latest", ctx(&selected, &overrides, &thresholds)).await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url.as_deref(), Some("https://ex.com/z"));
        assert_eq!(items[0].title.as_deref(), Some("Central bank holds rates"));
    }

    #[test]
    fn test_item_to_record() {
        let item = ExtractedItem {
            title: Some("Headline".to_string()),
            url: Some("https://ex.com/a/?utm_source=x".to_string()),
            date: NaiveDate::from_ymd_opt(2024, 3, 1),
        };
        let record = item_to_record(item.clone(), "Example Daily", London, None).unwrap();
        assert_eq!(record.url, "https://ex.com/a");
        assert_eq!(record.published_at, Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));
        assert_eq!(record.source, "Example Daily");
        assert_eq!(record.via, Via::TrainedExtractor);

        assert!(item_to_record(ExtractedItem::default(), "x", London, None).is_none());

        // West of UTC the day starts five hours later.
        let record = item_to_record(item, "Example Daily", New_York, None).unwrap();
        assert_eq!(record.published_at, Some(Utc.with_ymd_and_hms(2024, 3, 1, 5, 0, 0).unwrap()));
    }

    #[tokio::test]
    async fn test_hydration_fills_missing_dates() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/story")
            .with_status(200)
            .with_body(r#"<meta property="article:published_time" content="2024-03-01T08:30:00Z">"#)
            .create_async()
            .await;

        let items = vec![
            ExtractedItem {
                title: Some("Dated".to_string()),
                url: Some(format!("{}/dated", server.url())),
                date: NaiveDate::from_ymd_opt(2024, 2, 1),
            },
            ExtractedItem {
                title: Some("Undated".to_string()),
                url: Some(format!("{}/story", server.url())),
                date: None,
            },
            ExtractedItem {
                title: Some("No url".to_string()),
                url: None,
                date: None,
            },
        ];
        let http = HttpClient::new(&HttpSettings::default()).unwrap();
        let hydrated = hydrate_dates(&http, &items).await;
        assert_eq!(
            hydrated,
            vec![None, Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap()), None]
        );
    }
}
