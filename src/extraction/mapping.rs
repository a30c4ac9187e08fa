//! Field inference and item assembly for trained extraction output.
//!
//! Each rule group is classified from three statistics over its non-blank
//! values: the fraction that look like absolute URLs, the fraction the strict
//! date parser accepts, and the average length. At most one group becomes
//! `url`, at most one becomes `date`, the rest are `title` or `other`.

use crate::extraction::GroupedResult;
use crate::models::ExtractedItem;
use crate::normalize::dates::parse_date_string;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^https?://").expect("static regex"));

pub fn looks_like_url(s: &str) -> bool {
    URL_RE.is_match(s.trim())
}

/// Semantic field a rule group is mapped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Url,
    Title,
    Date,
    Other,
}

/// A caller-supplied mapping entry; `Auto` defers to inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldChoice {
    Url,
    Title,
    Date,
    Other,
    Auto,
}

impl FieldChoice {
    pub fn field(self) -> Option<Field> {
        match self {
            FieldChoice::Url => Some(Field::Url),
            FieldChoice::Title => Some(Field::Title),
            FieldChoice::Date => Some(Field::Date),
            FieldChoice::Other => Some(Field::Other),
            FieldChoice::Auto => None,
        }
    }
}

/// Empirical cut-offs of the inference heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct InferenceThresholds {
    /// A group becomes `url` only above this URL fraction.
    pub url_threshold: f64,
    /// A group becomes `date` only above this date fraction.
    pub date_threshold: f64,
    /// Remaining groups with a longer average become `title`.
    pub title_min_len: usize,
}

impl Default for InferenceThresholds {
    fn default() -> Self {
        Self {
            url_threshold: 0.2,
            date_threshold: 0.15,
            title_min_len: 10,
        }
    }
}

/// Rule id to field, in rule order. Assembly takes the last rule per field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldMapping {
    entries: Vec<(String, Field)>,
}

impl FieldMapping {
    pub fn set(&mut self, rule_id: &str, field: Field) {
        match self.entries.iter_mut().find(|(id, _)| id == rule_id) {
            Some((_, existing)) => *existing = field,
            None => self.entries.push((rule_id.to_string(), field)),
        }
    }

    pub fn get(&self, rule_id: &str) -> Option<Field> {
        self.entries
            .iter()
            .find(|(id, _)| id == rule_id)
            .map(|(_, field)| *field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Field)> {
        self.entries.iter().map(|(id, field)| (id.as_str(), *field))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct GroupMetrics {
    url_fraction: f64,
    date_fraction: f64,
    avg_len: f64,
}

fn metrics_for(values: &[String]) -> GroupMetrics {
    let non_blank: Vec<&String> = values.iter().filter(|v| !v.trim().is_empty()).collect();
    if non_blank.is_empty() {
        return GroupMetrics::default();
    }
    let n = non_blank.len() as f64;
    let urls = non_blank.iter().filter(|v| looks_like_url(v)).count() as f64;
    let dates = non_blank
        .iter()
        .filter(|v| parse_date_string(v).is_some())
        .count() as f64;
    let chars: usize = non_blank.iter().map(|v| v.chars().count()).sum();
    GroupMetrics {
        url_fraction: urls / n,
        date_fraction: dates / n,
        avg_len: chars as f64 / n,
    }
}

/// First rule maximizing `key`; later rules must be strictly greater to win.
fn first_max<'a>(
    candidates: impl Iterator<Item = &'a (String, GroupMetrics)>,
    key: impl Fn(&GroupMetrics) -> (f64, f64),
) -> Option<&'a (String, GroupMetrics)> {
    candidates.fold(None, |best, candidate| match best {
        Some(current) if key(&candidate.1) <= key(&current.1) => Some(current),
        _ => Some(candidate),
    })
}

fn title_or_other(metrics: &GroupMetrics, thresholds: &InferenceThresholds) -> Field {
    if metrics.avg_len > thresholds.title_min_len as f64 {
        Field::Title
    } else {
        Field::Other
    }
}

/// Heuristically map every rule group to a field.
///
/// 1. `url`: the group with the highest `(url_fraction, avg_len)`, if its URL
///    fraction exceeds `url_threshold`
/// 2. `date`: among the rest, the highest `(date_fraction, -avg_len)`, if its
///    date fraction exceeds `date_threshold`
/// 3. everything else: `title` when the average length exceeds
///    `title_min_len`, otherwise `other`
pub fn infer_mapping(grouped: &GroupedResult, thresholds: &InferenceThresholds) -> FieldMapping {
    let metrics: Vec<(String, GroupMetrics)> = grouped
        .iter()
        .map(|(rule_id, values)| (rule_id.to_string(), metrics_for(values)))
        .collect();

    let mut assigned: BTreeMap<&str, Field> = BTreeMap::new();

    if let Some((rule_id, m)) = first_max(metrics.iter(), |m| (m.url_fraction, m.avg_len)) {
        if m.url_fraction > thresholds.url_threshold {
            assigned.insert(rule_id, Field::Url);
        }
    }

    let remaining = metrics.iter().filter(|(id, _)| !assigned.contains_key(id.as_str()));
    if let Some((rule_id, m)) = first_max(remaining, |m| (m.date_fraction, -m.avg_len)) {
        if m.date_fraction > thresholds.date_threshold {
            assigned.insert(rule_id, Field::Date);
        }
    }

    let mut mapping = FieldMapping::default();
    for (rule_id, m) in &metrics {
        let field = assigned
            .get(rule_id.as_str())
            .copied()
            .unwrap_or_else(|| title_or_other(m, thresholds));
        mapping.set(rule_id, field);
    }
    debug!(?mapping, "Inferred field mapping");
    mapping
}

/// Inference with per-rule manual overrides applied on top.
///
/// An override naming `url` or `date` demotes any inferred holder of that
/// field to `title`/`other`. Overrides for rules absent from `grouped` and
/// `auto` entries leave inference untouched.
pub fn resolve_mapping(
    grouped: &GroupedResult,
    overrides: &BTreeMap<String, FieldChoice>,
    thresholds: &InferenceThresholds,
) -> FieldMapping {
    let mut mapping = infer_mapping(grouped, thresholds);
    let pinned: Vec<(&str, Field)> = overrides
        .iter()
        .filter(|(rule_id, _)| grouped.get(rule_id).is_some())
        .filter_map(|(rule_id, choice)| choice.field().map(|field| (rule_id.as_str(), field)))
        .collect();
    if pinned.is_empty() {
        return mapping;
    }

    for (rule_id, values) in grouped.iter() {
        if pinned.iter().any(|(id, _)| *id == rule_id) {
            continue;
        }
        let inferred = mapping.get(rule_id);
        let clashes = pinned
            .iter()
            .any(|(_, field)| matches!(field, Field::Url | Field::Date) && Some(*field) == inferred);
        if clashes {
            mapping.set(rule_id, title_or_other(&metrics_for(values), thresholds));
        }
    }
    for (rule_id, field) in pinned {
        mapping.set(rule_id, field);
    }
    mapping
}

/// Zip the url, title and date groups positionally into items.
///
/// Runs to the longest of the three lists; missing or blank slots are
/// `None`. A missing URL is filled from a title that itself looks like a URL.
pub fn assemble(grouped: &GroupedResult, mapping: &FieldMapping) -> Vec<ExtractedItem> {
    let mut urls: &[String] = &[];
    let mut titles: &[String] = &[];
    let mut dates: &[String] = &[];
    for (rule_id, field) in mapping.iter() {
        let values = grouped.get(rule_id).unwrap_or(&[]);
        match field {
            Field::Url => urls = values,
            Field::Title => titles = values,
            Field::Date => dates = values,
            Field::Other => {}
        }
    }

    let slot = |values: &[String], i: usize| {
        values
            .get(i)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let len = urls.len().max(titles.len()).max(dates.len());
    (0..len)
        .map(|i| {
            let title = slot(titles, i);
            let url = slot(urls, i).or_else(|| title.clone().filter(|t| looks_like_url(t)));
            let date = slot(dates, i).and_then(|d| parse_date_string(&d));
            ExtractedItem { title, url, date }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn grouped(groups: &[(&str, &[&str])]) -> GroupedResult {
        groups
            .iter()
            .map(|(id, values)| (id.to_string(), strings(values)))
            .collect()
    }

    #[test]
    fn test_title_needs_average_length_above_cutoff() {
        let g = grouped(&[
            ("g1", &["https://a.com/1", "https://a.com/2"]),
            ("g2", &["2024-01-01", "2024-01-02"]),
            ("g3", &["Title One", "Title Two"]),
        ]);
        let mapping = infer_mapping(&g, &InferenceThresholds::default());
        assert_eq!(mapping.get("g1"), Some(Field::Url));
        assert_eq!(mapping.get("g2"), Some(Field::Date));
        // Nine characters on average is not above the ten character cut-off.
        assert_eq!(mapping.get("g3"), Some(Field::Other));

        let relaxed = InferenceThresholds {
            title_min_len: 8,
            ..InferenceThresholds::default()
        };
        assert_eq!(infer_mapping(&g, &relaxed).get("g3"), Some(Field::Title));
    }

    #[test]
    fn test_long_strings_become_titles() {
        let g = grouped(&[
            ("links", &["https://a.com/1", "https://a.com/2"]),
            ("dates", &["2024-01-01", "2024-01-02"]),
            ("heads", &["Parliament passes budget", "Central bank holds rates"]),
            ("tags", &["Politics", "Economy"]),
        ]);
        let mapping = infer_mapping(&g, &InferenceThresholds::default());
        assert_eq!(mapping.get("heads"), Some(Field::Title));
        assert_eq!(mapping.get("tags"), Some(Field::Other));
    }

    #[test]
    fn test_thresholds_gate_assignment() {
        let g = grouped(&[
            ("mostly_text", &["one headline here", "another headline", "third headline", "https://a.com/x", "fifth one here", "sixth headline"]),
        ]);
        // URL fraction 1/6 is below 0.2.
        let mapping = infer_mapping(&g, &InferenceThresholds::default());
        assert_eq!(mapping.get("mostly_text"), Some(Field::Title));

        let lenient = InferenceThresholds {
            url_threshold: 0.1,
            ..InferenceThresholds::default()
        };
        assert_eq!(infer_mapping(&g, &lenient).get("mostly_text"), Some(Field::Url));
    }

    #[test]
    fn test_date_ties_prefer_shorter_strings() {
        let g = grouped(&[
            ("long", &["Published on 2024-01-01 by the desk", "Published on 2024-01-02 by the desk"]),
            ("short", &["2024-01-01", "2024-01-02"]),
        ]);
        let mapping = infer_mapping(&g, &InferenceThresholds::default());
        assert_eq!(mapping.get("short"), Some(Field::Date));
        assert_eq!(mapping.get("long"), Some(Field::Title));
    }

    #[test]
    fn test_url_ties_go_to_first_rule() {
        let g = grouped(&[
            ("first", &["https://a.com/1"]),
            ("second", &["https://a.com/2"]),
        ]);
        let mapping = infer_mapping(&g, &InferenceThresholds::default());
        assert_eq!(mapping.get("first"), Some(Field::Url));
        assert_eq!(mapping.get("second"), Some(Field::Title));
    }

    #[test]
    fn test_empty_groups_are_other() {
        let g = grouped(&[("empty", &["", "  "])]);
        let mapping = infer_mapping(&g, &InferenceThresholds::default());
        assert_eq!(mapping.get("empty"), Some(Field::Other));
    }

    #[test]
    fn test_override_takes_precedence_per_rule() {
        let g = grouped(&[
            ("a", &["https://a.com/1", "https://a.com/2"]),
            ("b", &["https://b.com/1", "https://b.com/2"]),
            ("c", &["Some long headline", "Another long headline"]),
        ]);
        let overrides: BTreeMap<String, FieldChoice> = [
            ("b".to_string(), FieldChoice::Url),
            ("c".to_string(), FieldChoice::Auto),
            ("missing".to_string(), FieldChoice::Date),
        ]
        .into_iter()
        .collect();

        let mapping = resolve_mapping(&g, &overrides, &InferenceThresholds::default());
        assert_eq!(mapping.get("b"), Some(Field::Url));
        assert_eq!(mapping.get("a"), Some(Field::Title));
        assert_eq!(mapping.get("c"), Some(Field::Title));
        assert_eq!(mapping.get("missing"), None);
    }

    #[test]
    fn test_assemble_zips_to_longest() {
        let g = grouped(&[
            ("u", &["https://a.com/1", "https://a.com/2"]),
            ("t", &["First headline", "Second headline", "Third headline"]),
            ("d", &["01.03.2024"]),
        ]);
        let mut mapping = FieldMapping::default();
        mapping.set("u", Field::Url);
        mapping.set("t", Field::Title);
        mapping.set("d", Field::Date);

        let items = assemble(&g, &mapping);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].url.as_deref(), Some("https://a.com/1"));
        assert_eq!(items[0].date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(items[1].date, None);
        assert_eq!(items[2].url, None);
        assert_eq!(items[2].title.as_deref(), Some("Third headline"));
    }

    #[test]
    fn test_assemble_promotes_url_like_titles() {
        let g = grouped(&[("t", &["https://a.com/story", "Plain headline"])]);
        let mut mapping = FieldMapping::default();
        mapping.set("t", Field::Title);

        let items = assemble(&g, &mapping);
        assert_eq!(items[0].url.as_deref(), Some("https://a.com/story"));
        assert_eq!(items[1].url, None);
    }

    #[test]
    fn test_assemble_last_rule_per_field_wins() {
        let g = grouped(&[
            ("t1", &["Headline from rule one"]),
            ("t2", &["Headline from rule two"]),
        ]);
        let mapping = infer_mapping(&g, &InferenceThresholds::default());
        let items = assemble(&g, &mapping);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title.as_deref(), Some("Headline from rule two"));
    }
}
