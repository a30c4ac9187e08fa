//! Record de-duplication.

use crate::models::ArticleRecord;
use crate::normalize::canonical::canonicalize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Identity key of a record: SHA-256 of `lower(trim(title)) | canonical(url)`.
pub fn record_key(record: &ArticleRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.title.trim().to_lowercase().as_bytes());
    hasher.update(b"|");
    hasher.update(canonicalize(&record.url).as_bytes());
    hex::encode(hasher.finalize())
}

/// Drop every record whose [`record_key`] was already seen.
///
/// Order-preserving: the first occurrence wins, so the caller's merge order
/// decides which duplicate survives.
pub fn dedup(records: Vec<ArticleRecord>) -> Vec<ArticleRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record_key(record)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Via;

    fn record(title: &str, url: &str, via: Via) -> ArticleRecord {
        ArticleRecord {
            title: title.to_string(),
            url: url.to_string(),
            published_at: None,
            source: "ex.com".to_string(),
            via,
        }
    }

    #[test]
    fn test_first_occurrence_wins() {
        let records = vec![
            record("Story", "https://ex.com/a", Via::Rss),
            record("Other", "https://ex.com/b", Via::Rss),
            record("  STORY ", "https://ex.com/a", Via::Gdelt),
        ];
        let out = dedup(records);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].via, Via::Rss);
        assert_eq!(out[1].title, "Other");
    }

    #[test]
    fn test_same_url_different_title_is_kept() {
        let out = dedup(vec![
            record("Morning edition", "https://ex.com/a", Via::Html),
            record("Evening edition", "https://ex.com/a", Via::Html),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_empty_titles_still_collide() {
        let out = dedup(vec![
            record("", "https://ex.com/a", Via::TrainedExtractor),
            record("", "https://ex.com/a", Via::TrainedExtractor),
            record("", "https://ex.com/b", Via::TrainedExtractor),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let records = vec![
            record("A", "https://ex.com/1", Via::Rss),
            record("a", "https://ex.com/1", Via::Rss),
            record("B", "https://ex.com/2", Via::Rss),
            record("A", "https://ex.com/3", Via::Rss),
        ];
        let once = dedup(records);
        let twice = dedup(once.clone());
        assert_eq!(once, twice);
        assert_eq!(once.len(), 3);
    }

    #[test]
    fn test_key_is_hex_sha256() {
        let key = record_key(&record("A", "https://ex.com/1", Via::Rss));
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
