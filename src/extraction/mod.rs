//! Trained extraction: grouped rule output and the engine that produces it.
//!
//! A trained rule set, replayed against a page, yields an ordered list of
//! `(rule_id, values)` groups. The core only depends on that shape:
//!
//! - [`GroupedResult`]: the ordered grouped output
//! - [`ExtractionEngine`]: replay capability, implemented by
//!   [`selector::SelectorEngine`] and by in-memory fakes in tests
//! - [`mapping`]: classification of groups into url / title / date fields and
//!   assembly of positional items

pub mod mapping;
pub mod selector;

use crate::error::FetchError;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Values extracted per rule, in rule order.
///
/// Order is significant: ties in field inference go to the earliest rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GroupedResult {
    groups: Vec<(String, Vec<String>)>,
}

impl GroupedResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a group; an existing rule id keeps its position and gets the new values.
    pub fn insert(&mut self, rule_id: impl Into<String>, values: Vec<String>) {
        let rule_id = rule_id.into();
        match self.groups.iter_mut().find(|(id, _)| *id == rule_id) {
            Some((_, existing)) => *existing = values,
            None => self.groups.push((rule_id, values)),
        }
    }

    pub fn get(&self, rule_id: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|(id, _)| id == rule_id)
            .map(|(_, values)| values.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.groups
            .iter()
            .map(|(id, values)| (id.as_str(), values.as_slice()))
    }

    pub fn rule_ids(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(id, _)| id.as_str())
    }

    /// Keep only the selected rules. An empty selection keeps everything.
    pub fn retain_rules(&mut self, selected: &[String]) {
        if selected.is_empty() {
            return;
        }
        self.groups.retain(|(id, _)| selected.contains(id));
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// All values across groups, first occurrence kept.
    pub fn flatten_unique(&self) -> Vec<String> {
        self.groups
            .iter()
            .flat_map(|(_, values)| values.iter().cloned())
            .unique()
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<String>)> for GroupedResult {
    fn from_iter<I: IntoIterator<Item = (K, Vec<String>)>>(iter: I) -> Self {
        let mut grouped = GroupedResult::new();
        for (rule_id, values) in iter {
            grouped.insert(rule_id, values);
        }
        grouped
    }
}

/// Replays a trained rule set against a page.
///
/// `rules` is an opaque reference to a persisted rule set (for
/// [`selector::SelectorEngine`], a JSON file path).
pub trait ExtractionEngine {
    /// Whether `rules` refers to a rule set this engine can load.
    fn rules_available(&self, rules: &str) -> bool;

    /// Grouped output: one entry per rule that matched something.
    async fn replay(&self, rules: &str, page_url: &str) -> Result<GroupedResult, FetchError>;

    /// Ungrouped output: every extracted value once, in rule order.
    async fn replay_single(&self, rules: &str, page_url: &str) -> Result<Vec<String>, FetchError> {
        Ok(self.replay(rules, page_url).await?.flatten_unique())
    }
}
