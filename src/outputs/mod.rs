//! Output writers.
//!
//! - [`json`]: final records and per-source reports as JSON files

pub mod json;
