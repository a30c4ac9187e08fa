//! Pure normalization steps applied to every producer's output.
//!
//! | Step | Module | Purpose |
//! |------|--------|---------|
//! | Canonical URL | [`canonical`] | Stable comparison key for article URLs |
//! | Date parsing | [`dates`] | Heterogeneous timestamps to UTC instants / calendar days |
//! | De-duplication | [`dedup`] | First-occurrence-wins on `title | url` |
//! | Day window | [`window`] | Inclusive local-calendar-day filter |
//!
//! None of these functions touch the network or fail: bad input degrades to
//! the original string or `None`.

pub mod canonical;
pub mod dates;
pub mod dedup;
pub mod window;
