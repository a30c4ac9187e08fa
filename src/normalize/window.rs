//! Inclusive calendar-day window in a fixed reference timezone.

use crate::models::ArticleRecord;
use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::debug;

/// What to do with records that have no publication timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DatelessPolicy {
    #[default]
    Drop,
    Keep,
}

impl DatelessPolicy {
    pub fn from_keep_flag(keep_dateless: bool) -> Self {
        if keep_dateless { Self::Keep } else { Self::Drop }
    }
}

/// `[start, end]` calendar days, both inclusive, interpreted in `tz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub tz: Tz,
}

impl DayWindow {
    pub fn new(start: NaiveDate, end: NaiveDate, tz: Tz) -> Self {
        Self { start, end, tz }
    }

    /// 00:00:00 local time on `start`, as a UTC instant.
    pub fn start_instant(&self) -> DateTime<Utc> {
        local_midnight(self.start, self.tz)
    }

    /// 23:59:59 local time on `end`, as a UTC instant.
    pub fn end_instant(&self) -> DateTime<Utc> {
        let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
        local_to_utc(self.end.and_time(last_second), self.tz)
    }

    /// Whether the instant falls on a local calendar day inside the window.
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        let local_date = instant.with_timezone(&self.tz).date_naive();
        self.start <= local_date && local_date <= self.end
    }
}

fn local_to_utc(local: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // Inside a DST gap: use the wall time an hour later.
        LocalResult::None => {
            let later = local + chrono::Duration::hours(1);
            tz.from_local_datetime(&later)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&local))
        }
    }
}

/// 00:00:00 local time in `tz` on `date`, as a UTC instant.
///
/// A calendar day anchored this way always maps back to the same local day
/// when tested against a [`DayWindow`] in `tz`.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    local_to_utc(date.and_time(NaiveTime::default()), tz)
}

/// Keep the records whose timestamp falls inside `window`.
///
/// Dateless records are dropped or kept according to `policy`. Timestamps
/// are `DateTime<Utc>` throughout, so every surviving record already carries
/// its UTC-normalized instant.
pub fn cap(records: Vec<ArticleRecord>, window: &DayWindow, policy: DatelessPolicy) -> Vec<ArticleRecord> {
    let before = records.len();
    let kept: Vec<ArticleRecord> = records
        .into_iter()
        .filter(|record| match &record.published_at {
            Some(instant) => window.contains(instant),
            None => policy == DatelessPolicy::Keep,
        })
        .collect();
    debug!(
        before,
        after = kept.len(),
        start = %window.start,
        end = %window.end,
        ?policy,
        "Applied day window"
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Via;
    use chrono::Duration;
    use chrono_tz::America::{New_York, Santiago};
    use chrono_tz::Europe::London;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record_at(published_at: Option<DateTime<Utc>>) -> ArticleRecord {
        ArticleRecord {
            title: "t".to_string(),
            url: "https://ex.com/t".to_string(),
            published_at,
            source: "ex.com".to_string(),
            via: Via::Rss,
        }
    }

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        London
            .with_ymd_and_hms(y, m, d, h, min, s)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_window_bounds_in_summer_time() {
        let window = DayWindow::new(ymd(2024, 7, 1), ymd(2024, 7, 2), London);
        assert_eq!(window.start_instant(), Utc.with_ymd_and_hms(2024, 6, 30, 23, 0, 0).unwrap());
        assert_eq!(window.end_instant(), Utc.with_ymd_and_hms(2024, 7, 2, 22, 59, 59).unwrap());
    }

    #[test]
    fn test_inclusive_end_day() {
        let window = DayWindow::new(ymd(2024, 7, 1), ymd(2024, 7, 2), London);
        let end_midnight = local(2024, 7, 2, 0, 0, 0);
        let past_end = local(2024, 7, 3, 0, 0, 0) + Duration::seconds(1);

        let out = cap(
            vec![record_at(Some(end_midnight)), record_at(Some(past_end))],
            &window,
            DatelessPolicy::Drop,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].published_at, Some(end_midnight));
    }

    #[test]
    fn test_local_day_differs_from_utc_day() {
        // 23:30 UTC on 30 June is 00:30 on 1 July in London.
        let window = DayWindow::new(ymd(2024, 7, 1), ymd(2024, 7, 1), London);
        assert!(window.contains(&Utc.with_ymd_and_hms(2024, 6, 30, 23, 30, 0).unwrap()));
        assert!(!window.contains(&Utc.with_ymd_and_hms(2024, 6, 30, 22, 30, 0).unwrap()));
    }

    #[test]
    fn test_local_midnight_stays_on_its_day_west_of_utc() {
        let day = ymd(2024, 3, 1);
        let anchored = local_midnight(day, New_York);
        assert_eq!(anchored, Utc.with_ymd_and_hms(2024, 3, 1, 5, 0, 0).unwrap());
        assert!(DayWindow::new(day, day, New_York).contains(&anchored));

        // Santiago springs forward at local midnight.
        let gap_day = ymd(2024, 9, 8);
        let anchored = local_midnight(gap_day, Santiago);
        assert_eq!(anchored.with_timezone(&Santiago).date_naive(), gap_day);
    }

    #[test]
    fn test_dateless_policy() {
        let window = DayWindow::new(ymd(2024, 1, 1), ymd(2024, 1, 1), London);
        let records = vec![record_at(None), record_at(Some(local(2024, 1, 1, 12, 0, 0)))];

        assert_eq!(cap(records.clone(), &window, DatelessPolicy::Drop).len(), 1);
        assert_eq!(cap(records, &window, DatelessPolicy::Keep).len(), 2);
        assert_eq!(DatelessPolicy::from_keep_flag(true), DatelessPolicy::Keep);
    }
}
