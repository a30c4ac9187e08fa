//! Record producers.
//!
//! Every producer turns one configured source into raw [`ArticleRecord`]s
//! and never fails the run: unreachable pages, bad feeds and upstream errors
//! are logged and contribute nothing.
//!
//! | Source kind | Module | Method | Notes |
//! |-------------|--------|--------|-------|
//! | Site | [`site`] | Feed discovery, then [`feeds`] | First 6 discovered feeds |
//! | Site (fallback) | [`html`] | Front-page anchors + article metadata | 8 concurrent date lookups |
//! | Trained | [`trained`] | Rule-set replay, optional pagination | Dates at midnight UTC unless hydrated |
//! | GDELT | [`gdelt`] | Rolling `ArtList` window | Ceiling of 10,000 articles |
//!
//! [`ArticleRecord`]: crate::models::ArticleRecord

pub mod feeds;
pub mod gdelt;
pub mod html;
pub mod site;
pub mod trained;
