//! Heterogeneous date and time parsing.
//!
//! Two entry points:
//!
//! - [`parse_any`]: general, format-flexible parsing of feed, meta-tag and API
//!   timestamps into a UTC instant. Values without an offset are read as UTC.
//! - [`parse_date_string`]: the stricter calendar-day parser used to classify
//!   and read trained-extractor date groups. It digs dates out of surrounding
//!   noise ("Published 2024-03-01 by ...") where `parse_any` would give up.
//!
//! Neither function ever fails loudly: unparseable input yields `None`.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Date-time layouts tried after RFC 3339 and RFC 2822, offset-aware first.
const OFFSET_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S %z",
];

const NAIVE_DATETIME_FORMATS: [&str; 14] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y%m%dT%H%M%SZ",
    "%Y%m%d%H%M%S",
    "%d.%m.%Y %H:%M",
    "%d/%m/%Y %H:%M",
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M %p",
    "%B %d, %Y %H:%M",
    "%d %B %Y %H:%M",
];

/// Calendar-only layouts accepted by both parsers, in priority order.
pub const COMMON_DATE_FORMATS: [&str; 10] = [
    "%Y-%m-%d",
    "%d.%m.%Y",
    "%d.%m.%y",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %b %Y",
    "%d %B %Y",
];

static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("static regex"));
static NUMERIC_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2}[./]\d{1,2}[./]\d{2,4})").expect("static regex"));
static TEXTUAL_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z]{3,9} \d{1,2}, \d{4})").expect("static regex"));

/// Parse a timestamp string of unknown shape into a UTC instant.
///
/// Accepts ISO 8601 / RFC 3339, RFC 2822 (RSS `pubDate`), GDELT's compact
/// `YYYYMMDDTHHMMSSZ`, and the calendar layouts in [`COMMON_DATE_FORMATS`]
/// (read as midnight). Strings without an offset are taken to be UTC.
///
/// # Returns
///
/// `None` for `None`, blank or unrecognized input.
pub fn parse_any(value: Option<&str>) -> Option<DateTime<Utc>> {
    let s = value?.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    parse_calendar_date(s).map(midnight_utc)
}

/// Anchor a calendar day at 00:00:00 UTC.
pub fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

/// Strictly parse a trained-extractor value into a calendar day.
///
/// Attempts, in order:
/// 1. a `YYYY-MM-DD` substring anywhere in the value
/// 2. the whole (trimmed) value against [`COMMON_DATE_FORMATS`]
/// 3. a `D.M.YYYY` / `D/M/YYYY` shaped substring
/// 4. a `Month D, YYYY` shaped substring
pub fn parse_date_string(s: &str) -> Option<NaiveDate> {
    let clean = s.trim();
    if clean.is_empty() {
        return None;
    }

    if let Some(m) = ISO_DATE_RE.find(clean) {
        if let Ok(date) = NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d") {
            return Some(date);
        }
    }

    if let Some(date) = parse_calendar_date(clean) {
        return Some(date);
    }

    if let Some(caps) = NUMERIC_DATE_RE.captures(clean) {
        let candidate = &caps[1];
        for fmt in ["%d.%m.%Y", "%d/%m/%Y", "%m/%d/%Y", "%d.%m.%y"] {
            if let Some(date) = parse_with_format(candidate, fmt) {
                return Some(date);
            }
        }
    }

    if let Some(caps) = TEXTUAL_DATE_RE.captures(clean) {
        let candidate = &caps[1];
        for fmt in ["%B %d, %Y", "%b %d, %Y"] {
            if let Some(date) = parse_with_format(candidate, fmt) {
                return Some(date);
            }
        }
    }

    None
}

fn parse_calendar_date(s: &str) -> Option<NaiveDate> {
    COMMON_DATE_FORMATS
        .iter()
        .find_map(|fmt| parse_with_format(s, fmt))
}

/// `%Y` in chrono happily reads `21` as the year 21; a four digit year is
/// required so `01.02.21` falls through to the `%y` layout.
fn parse_with_format(s: &str, fmt: &str) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(s, fmt).ok()?;
    if fmt.contains("%Y") && date.year() < 1000 {
        return None;
    }
    Some(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_any_none_and_garbage() {
        assert_eq!(parse_any(None), None);
        assert_eq!(parse_any(Some("   ")), None);
        assert_eq!(parse_any(Some("yesterday-ish")), None);
    }

    #[test]
    fn test_parse_any_offsets_become_utc() {
        let dt = parse_any(Some("2024-03-01T10:00:00+02:00")).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap());

        let rss = parse_any(Some("Fri, 01 Mar 2024 10:00:00 GMT")).unwrap();
        assert_eq!(rss, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_any_naive_is_utc() {
        let dt = parse_any(Some("2024-03-01 10:15:00")).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap());
    }

    #[test]
    fn test_parse_any_gdelt_seendate() {
        let dt = parse_any(Some("20240115T083000Z")).unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_any_calendar_layouts() {
        let expected = midnight_utc(ymd(2024, 3, 15));
        for s in [
            "2024-03-15",
            "15.03.2024",
            "15/03/2024",
            "03/15/2024",
            "2024/03/15",
            "Mar 15, 2024",
            "March 15, 2024",
            "15 Mar 2024",
        ] {
            assert_eq!(parse_any(Some(s)), Some(expected), "failed on {s}");
        }
    }

    #[test]
    fn test_parse_date_string_iso_substring_first() {
        assert_eq!(
            parse_date_string("Published 2024-01-02 by staff"),
            Some(ymd(2024, 1, 2))
        );
    }

    #[test]
    fn test_parse_date_string_two_digit_year() {
        assert_eq!(parse_date_string("01.02.21"), Some(ymd(2021, 2, 1)));
    }

    #[test]
    fn test_parse_date_string_regex_fallbacks() {
        assert_eq!(parse_date_string("Updated: 5.3.2024 14:00"), Some(ymd(2024, 3, 5)));
        assert_eq!(parse_date_string("Posted on Jan 2, 2021 at noon"), Some(ymd(2021, 1, 2)));
        assert_eq!(parse_date_string("by staff, January 12, 2023"), Some(ymd(2023, 1, 12)));
    }

    #[test]
    fn test_parse_date_string_rejects_titles() {
        assert_eq!(parse_date_string("Parliament passes budget"), None);
        assert_eq!(parse_date_string("https://a.com/1"), None);
        assert_eq!(parse_date_string(""), None);
    }
}
