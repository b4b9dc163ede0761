//! Calendar-aligned, gap-filled time series
//!
//! Bucket keys are generated for the whole window first and records are
//! folded into them afterwards, so a bucket exists for every day (or week)
//! of the window whether or not anything happened in it.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analytics::models::{MetricRecord, TimeBucket};

/// Width of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    /// Sunday-to-Saturday weeks
    Week,
}

/// How records contribute to their bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Count,
    Sum,
}

impl Granularity {
    pub const fn step_days(self) -> u64 {
        match self {
            Granularity::Day => 1,
            Granularity::Week => 7,
        }
    }

    /// Start date of the bucket that contains `date`
    pub fn align(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Day => date,
            Granularity::Week => {
                let since_sunday = u64::from(date.weekday().num_days_from_sunday());
                date.checked_sub_days(Days::new(since_sunday))
                    .unwrap_or(NaiveDate::MIN)
            }
        }
    }

    /// Bucket key of an instant, using its UTC calendar date
    pub fn key(self, ts: DateTime<Utc>) -> NaiveDate {
        self.align(ts.date_naive())
    }

    /// Midnight UTC at the start of the bucket containing `ts`
    pub fn floor(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.key(ts).and_time(NaiveTime::default()))
    }
}

/// Start of a trailing window of `length` buckets ending at `now`.
///
/// Daily windows start exactly `length` days before `now`; weekly windows
/// start `length` weeks before `now`, pulled back to that week's Sunday.
pub fn trailing_window_start(
    now: DateTime<Utc>,
    granularity: Granularity,
    length: u32,
) -> DateTime<Utc> {
    let span = Days::new(u64::from(length) * granularity.step_days());
    let raw = now.checked_sub_days(span).unwrap_or(DateTime::<Utc>::MIN_UTC);

    match granularity {
        Granularity::Day => raw,
        Granularity::Week => Granularity::Week.floor(raw),
    }
}

/// Build the gap-filled series for `[window_start, now]`.
///
/// Only records whose timestamp falls inside the window contribute. When
/// `window_start` lies after `now` a single empty bucket at `now` is returned.
pub fn bucketize(
    records: &[MetricRecord],
    window_start: DateTime<Utc>,
    now: DateTime<Utc>,
    granularity: Granularity,
    aggregate: Aggregate,
) -> Vec<TimeBucket> {
    let last = granularity.key(now);

    if window_start > now {
        debug!(%window_start, %now, "window starts after its anchor, emitting one empty bucket");
        return vec![TimeBucket::empty(last)];
    }

    let start = match granularity {
        Granularity::Day => window_start,
        Granularity::Week => granularity.floor(window_start),
    };

    let mut buckets = bucket_keys(granularity.key(start), last, granularity)
        .map(TimeBucket::empty)
        .collect::<Vec<_>>();

    for record in records
        .iter()
        .filter(|r| r.timestamp >= start && r.timestamp <= now)
    {
        let key = granularity.key(record.timestamp);
        if let Ok(idx) = buckets.binary_search_by_key(&key, |b| b.start) {
            buckets[idx].value += match aggregate {
                Aggregate::Count => 1.0,
                Aggregate::Sum => record.value.unwrap_or(0.0),
            };
        }
    }

    buckets
}

/// Every bucket key from `first` through `last`, inclusive
fn bucket_keys(
    first: NaiveDate,
    last: NaiveDate,
    granularity: Granularity,
) -> impl Iterator<Item = NaiveDate> {
    let step = Days::new(granularity.step_days());
    std::iter::successors(Some(first), move |d| d.checked_add_days(step))
        .take_while(move |d| *d <= last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Weekday};

    fn now() -> DateTime<Utc> {
        // Friday
        Utc.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap()
    }

    fn record_at(ts: DateTime<Utc>, value: Option<f64>) -> MetricRecord {
        MetricRecord {
            entity_id: "listing-1".to_string(),
            timestamp: ts,
            category: None,
            value,
        }
    }

    #[test]
    fn test_daily_series_is_gap_filled_without_records() {
        let now = now();
        let start = trailing_window_start(now, Granularity::Day, 30);
        let series = bucketize(&[], start, now, Granularity::Day, Aggregate::Count);

        assert_eq!(series.len(), 31);
        assert!(series.iter().all(|b| b.value == 0.0));
        assert_eq!(series[0].start, NaiveDate::from_ymd_opt(2024, 2, 14).unwrap());
        assert_eq!(series[30].start, now.date_naive());
        for pair in series.windows(2) {
            assert_eq!(pair[1].start - pair[0].start, Duration::days(1));
        }
    }

    #[test]
    fn test_daily_series_folds_records_into_their_day() {
        let now = now();
        let start = trailing_window_start(now, Granularity::Day, 30);
        let mut records = Vec::new();
        for _ in 0..3 {
            records.push(record_at(now - Duration::days(1), None));
        }
        for _ in 0..2 {
            records.push(record_at(now - Duration::days(5), None));
        }

        let series = bucketize(&records, start, now, Granularity::Day, Aggregate::Count);

        assert_eq!(series.len(), 31);
        let t1 = (now - Duration::days(1)).date_naive();
        let t5 = (now - Duration::days(5)).date_naive();
        for bucket in &series {
            let expected = if bucket.start == t1 {
                3.0
            } else if bucket.start == t5 {
                2.0
            } else {
                0.0
            };
            assert_eq!(bucket.value, expected, "bucket {}", bucket.start);
        }
        assert_eq!(series.iter().filter(|b| b.value == 0.0).count(), 29);
    }

    #[test]
    fn test_records_outside_window_are_ignored() {
        let now = now();
        let start = trailing_window_start(now, Granularity::Day, 30);
        let records = vec![
            record_at(start - Duration::seconds(1), None),
            record_at(start, None),
            record_at(now, None),
            record_at(now + Duration::seconds(1), None),
        ];

        let series = bucketize(&records, start, now, Granularity::Day, Aggregate::Count);
        let total: f64 = series.iter().map(|b| b.value).sum();

        assert_eq!(total, 2.0);
    }

    #[test]
    fn test_weekly_buckets_start_on_sunday() {
        let now = now();
        let start = trailing_window_start(now, Granularity::Week, 12);
        let records = vec![
            record_at(now, Some(4.0)),
            record_at(now - Duration::days(20), Some(1.5)),
        ];

        let series = bucketize(&records, start, now, Granularity::Week, Aggregate::Sum);

        assert_eq!(series.len(), 13);
        assert!(series.iter().all(|b| b.start.weekday() == Weekday::Sun));
        assert_eq!(series[12].start, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(series[12].value, 4.0);
        let total: f64 = series.iter().map(|b| b.value).sum();
        assert_eq!(total, 5.5);
    }

    #[test]
    fn test_weekly_window_start_is_realigned() {
        let now = now();
        let raw = now - Duration::weeks(12);
        let series = bucketize(&[], raw, now, Granularity::Week, Aggregate::Count);

        assert_eq!(series[0].start.weekday(), Weekday::Sun);
        assert!(series[0].start <= raw.date_naive());
        assert_eq!(series.len(), 13);
    }

    #[test]
    fn test_sum_treats_missing_value_as_zero() {
        let now = now();
        let start = trailing_window_start(now, Granularity::Day, 7);
        let records = vec![record_at(now, None), record_at(now, Some(2.5))];

        let series = bucketize(&records, start, now, Granularity::Day, Aggregate::Sum);

        assert_eq!(series.last().unwrap().value, 2.5);
    }

    #[test]
    fn test_window_after_now_yields_single_empty_bucket() {
        let now = now();
        let records = vec![record_at(now, Some(1.0))];

        let series = bucketize(
            &records,
            now + Duration::days(3),
            now,
            Granularity::Week,
            Aggregate::Count,
        );

        assert_eq!(series, vec![TimeBucket::empty(Granularity::Week.key(now))]);
    }

    #[test]
    fn test_sunday_aligns_to_itself() {
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2024, 3, 16).unwrap();

        assert_eq!(Granularity::Week.align(sunday), sunday);
        assert_eq!(Granularity::Week.align(saturday), sunday);
        assert_eq!(Granularity::Day.align(saturday), saturday);
    }

    #[test]
    fn test_zero_length_window_has_one_bucket() {
        let now = now();
        let series = bucketize(&[], now, now, Granularity::Day, Aggregate::Count);
        assert_eq!(series.len(), 1);
    }
}
