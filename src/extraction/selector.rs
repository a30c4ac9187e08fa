//! CSS-selector extraction engine.
//!
//! Training takes a listing page and a few sample values copied from it (a
//! headline, its link, its date). Every element whose text or `href`/`src`
//! equals a sample yields a rule: a short `tag.class > tag.class` path from
//! that element up to two ancestors, plus the attribute to read, if any.
//! Replaying a rule selects every element on the same path, which is how one
//! sample generalizes to the whole list.
//!
//! Rule sets are persisted as JSON and referenced by file path.

use crate::error::{FetchError, FetchOutcome};
use crate::extraction::{ExtractionEngine, GroupedResult};
use crate::http::HttpClient;
use crate::utils::{collapse_whitespace, truncate_for_log};
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::error::Error;
use std::path::Path;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// How many elements (the match plus its ancestors) a selector path spans.
const PATH_DEPTH: usize = 3;

/// Attributes checked against samples besides element text.
const SAMPLE_ATTRIBUTES: [&str; 2] = ["href", "src"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Rule {
    pub id: String,
    pub selector: String,
    /// Read this attribute instead of the element text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Rule {
    fn new(selector: String, attribute: Option<&str>) -> Self {
        let digest = Sha256::digest(format!("{selector}|{}", attribute.unwrap_or("")).as_bytes());
        Self {
            id: format!("rule_{}", &hex::encode(digest)[..8]),
            selector,
            attribute: attribute.map(String::from),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuleSet {
    /// Page the rules were learned from.
    pub trained_on: String,
    pub rules: Vec<Rule>,
}

fn is_css_identifier(class: &str) -> bool {
    !class.is_empty()
        && !class.starts_with(|c: char| c.is_ascii_digit())
        && class.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn segment(element: &ElementRef) -> String {
    let tag = element.value().name();
    let classes = element
        .value()
        .classes()
        .filter(|c| is_css_identifier(c))
        .join(".");
    if classes.is_empty() {
        tag.to_string()
    } else {
        format!("{tag}.{classes}")
    }
}

/// `tag.class > tag.class > tag` path ending at `element`.
fn selector_path(element: ElementRef) -> String {
    let mut segments = vec![segment(&element)];
    let mut current = element;
    while segments.len() < PATH_DEPTH {
        let Some(parent) = current.parent().and_then(ElementRef::wrap) else {
            break;
        };
        if matches!(parent.value().name(), "html" | "body") {
            break;
        }
        segments.push(segment(&parent));
        current = parent;
    }
    segments.iter().rev().join(" > ")
}

fn element_text(element: &ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn resolve(base: Option<&Url>, raw: &str) -> String {
    base.and_then(|b| b.join(raw).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Learn rules from a parsed page and sample values.
///
/// Text matches keep only the innermost element carrying the sample, so a
/// headline inside `<h2><a>` produces one rule for the `<a>`.
pub fn learn_rules(html: &str, page_url: &str, samples: &[String]) -> Vec<Rule> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    let elements: Vec<ElementRef> = document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect();

    let mut rules = Vec::new();
    for sample in samples {
        let wanted = collapse_whitespace(sample);
        if wanted.is_empty() {
            continue;
        }
        for element in &elements {
            if element_text(element) == wanted {
                let child_matches = element
                    .children()
                    .filter_map(ElementRef::wrap)
                    .any(|child| element_text(&child) == wanted);
                if !child_matches {
                    rules.push(Rule::new(selector_path(*element), None));
                }
            }
            for attribute in SAMPLE_ATTRIBUTES {
                let Some(raw) = element.value().attr(attribute) else {
                    continue;
                };
                if raw.trim() == wanted || resolve(base.as_ref(), raw.trim()) == wanted {
                    rules.push(Rule::new(selector_path(*element), Some(attribute)));
                }
            }
        }
    }
    rules.into_iter().unique_by(|r| r.id.clone()).collect()
}

/// Run every rule against a page. Rules that match nothing are left out.
pub fn apply_rules(rule_set: &RuleSet, html: &str, page_url: &str) -> GroupedResult {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    let mut grouped = GroupedResult::new();

    for rule in &rule_set.rules {
        let selector = match Selector::parse(&rule.selector) {
            Ok(s) => s,
            Err(e) => {
                warn!(rule = %rule.id, selector = %truncate_for_log(&rule.selector, 120), error = %e, "Invalid rule selector");
                continue;
            }
        };
        let values: Vec<String> = document
            .select(&selector)
            .filter_map(|element| match &rule.attribute {
                Some(attribute) => element
                    .value()
                    .attr(attribute)
                    .map(|raw| raw.trim())
                    .filter(|raw| !raw.is_empty())
                    .map(|raw| resolve(base.as_ref(), raw)),
                None => Some(element_text(&element)).filter(|t| !t.is_empty()),
            })
            .unique()
            .collect();
        debug!(rule = %rule.id, values = values.len(), "Applied rule");
        if !values.is_empty() {
            grouped.insert(rule.id.clone(), values);
        }
    }
    grouped
}

/// Read a persisted rule set.
pub async fn load_rules(path: &str) -> Result<RuleSet, FetchError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| FetchError::RuleSet(format!("{path}: {e}")))?;
    serde_json::from_str(&raw).map_err(|e| FetchError::RuleSet(format!("{path}: {e}")))
}

/// Persist a rule set as pretty JSON, creating parent directories.
#[instrument(level = "info", skip_all, fields(%path, rules = rule_set.rules.len()))]
pub async fn save_rules(path: &str, rule_set: &RuleSet) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, serde_json::to_string_pretty(rule_set)?).await?;
    info!("Saved rule set");
    Ok(())
}

/// Selector engine backed by the shared HTTP client.
pub struct SelectorEngine<'a> {
    http: &'a HttpClient,
}

impl<'a> SelectorEngine<'a> {
    pub fn new(http: &'a HttpClient) -> Self {
        Self { http }
    }

    async fn fetch_page(&self, page_url: &str) -> Result<Option<String>, FetchError> {
        match self.http.get_text(page_url).await {
            FetchOutcome::Success(html) => Ok(Some(html)),
            FetchOutcome::Empty => Ok(None),
            FetchOutcome::Failed(e) => Err(e),
        }
    }

    /// Fetch `page_url` and learn rules for the given samples.
    ///
    /// # Errors
    ///
    /// Fails when the page cannot be fetched or no sample matched anything.
    #[instrument(level = "info", skip_all, fields(%page_url, samples = samples.len()))]
    pub async fn train(&self, page_url: &str, samples: &[String]) -> Result<RuleSet, FetchError> {
        let html = self
            .fetch_page(page_url)
            .await?
            .ok_or_else(|| FetchError::Malformed(format!("empty training page {page_url}")))?;
        let rules = learn_rules(&html, page_url, samples);
        if rules.is_empty() {
            return Err(FetchError::RuleSet("no element matched the samples".to_string()));
        }
        info!(rules = rules.len(), "Learned rules");
        Ok(RuleSet {
            trained_on: page_url.to_string(),
            rules,
        })
    }
}

impl ExtractionEngine for SelectorEngine<'_> {
    fn rules_available(&self, rules: &str) -> bool {
        !rules.trim().is_empty() && Path::new(rules).is_file()
    }

    #[instrument(level = "info", skip_all, fields(%rules, %page_url))]
    async fn replay(&self, rules: &str, page_url: &str) -> Result<GroupedResult, FetchError> {
        let rule_set = load_rules(rules).await?;
        let Some(html) = self.fetch_page(page_url).await? else {
            return Ok(GroupedResult::new());
        };
        let grouped = apply_rules(&rule_set, &html, page_url);
        info!(groups = grouped.len(), "Replayed rule set");
        Ok(grouped)
    }
}
