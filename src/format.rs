// SPDX-License-Identifier: MPL-2.0

//! Human-readable byte formatting
//!
//! Both formatters scale by 1024 until the value drops below 1024 or the
//! largest unit is reached.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::usage::{PeriodKind, UsageBucket};

const RATE_UNITS: [&str; 4] = ["B/s", "KB/s", "MB/s", "GB/s"];
const TOTAL_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

fn scale(mut value: f64, units: &[&'static str]) -> (f64, &'static str) {
    let mut unit = 0;
    while value >= 1024.0 && unit < units.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    (value, units[unit])
}

/// Throughput with one decimal, e.g. `1.5 KB/s`.
pub fn format_rate(bytes_per_sec: f64) -> String {
    let (value, unit) = scale(bytes_per_sec.max(0.0), &RATE_UNITS);
    format!("{value:.1} {unit}")
}

/// Cumulative total with two decimals, e.g. `1.50 KB`.
pub fn format_total(bytes: i64) -> String {
    let (value, unit) = scale(bytes.max(0) as f64, &TOTAL_UNITS);
    format!("{value:.2} {unit}")
}

/// One dropdown row: the day row also breaks out both directions.
pub fn usage_summary(kind: PeriodKind, bucket: &UsageBucket) -> String {
    let total = format_total(bucket.total_bytes());
    match kind {
        PeriodKind::Day => format!(
            "{}: {} (↓{} ↑{})",
            kind.label(),
            total,
            format_total(bucket.total_downloaded),
            format_total(bucket.total_uploaded)
        ),
        _ => format!("{}: {}", kind.label(), total),
    }
}

fn short_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Dates a bucket covers in `tz`: one date when it starts and ends on the
/// same day, otherwise `start - end`.
pub fn format_period_range<Tz: TimeZone>(
    start: &DateTime<Utc>,
    end: &DateTime<Utc>,
    tz: &Tz,
) -> String {
    let start = start.with_timezone(tz).date_naive();
    let end = end.with_timezone(tz).date_naive();
    if start == end {
        short_date(start)
    } else {
        format!("{} - {}", short_date(start), short_date(end))
    }
}

/// Full usage card for one period: total, both directions and the dates
/// covered.
pub fn usage_detail<Tz: TimeZone>(kind: PeriodKind, bucket: &UsageBucket, tz: &Tz) -> String {
    format!(
        "{}: {} (↓{} ↑{}) [{}]",
        kind.label(),
        format_total(bucket.total_bytes()),
        format_total(bucket.total_downloaded),
        format_total(bucket.total_uploaded),
        format_period_range(&bucket.period_start, &bucket.period_end, tz)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn rate_units() {
        assert_eq!(format_rate(0.0), "0.0 B/s");
        assert_eq!(format_rate(512.0), "512.0 B/s");
        assert_eq!(format_rate(1536.0), "1.5 KB/s");
        assert_eq!(format_rate(5.0 * 1024.0 * 1024.0), "5.0 MB/s");
        // GB/s is the ceiling.
        assert_eq!(format_rate(2048.0 * 1024.0 * 1024.0 * 1024.0), "2048.0 GB/s");
    }

    #[test]
    fn total_units() {
        assert_eq!(format_total(0), "0.00 B");
        assert_eq!(format_total(1536), "1.50 KB");
        assert_eq!(format_total(3 * 1024 * 1024 * 1024), "3.00 GB");
        assert_eq!(format_total(1 << 40), "1.00 TB");
        assert_eq!(format_total(-42), "0.00 B");
    }

    #[test]
    fn summaries() {
        let t0 = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();
        let bucket = UsageBucket {
            total_downloaded: 1024,
            total_uploaded: 512,
            period_start: t0,
            period_end: t0,
        };
        assert_eq!(
            usage_summary(PeriodKind::Day, &bucket),
            "Today: 1.50 KB (↓1.00 KB ↑512.00 B)"
        );
        assert_eq!(usage_summary(PeriodKind::Month, &bucket), "This Month: 1.50 KB");
    }

    #[test]
    fn period_range_collapses_a_single_day() {
        let start = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 10, 19, 18, 30, 0).unwrap();
        assert_eq!(format_period_range(&start, &end, &Utc), "2026-10-19");

        let end = Utc.with_ymd_and_hms(2026, 10, 21, 9, 0, 0).unwrap();
        assert_eq!(format_period_range(&start, &end, &Utc), "2026-10-19 - 2026-10-21");
    }

    #[test]
    fn period_range_uses_the_given_zone() {
        // 22:00 UTC is already the next day at +03:00.
        let tz = FixedOffset::east_opt(3 * 3600).unwrap();
        let start = Utc.with_ymd_and_hms(2026, 10, 18, 21, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 10, 18, 22, 0, 0).unwrap();
        assert_eq!(format_period_range(&start, &end, &Utc), "2026-10-18");
        assert_eq!(format_period_range(&start, &end, &tz), "2026-10-19");
    }

    #[test]
    fn detail_breaks_out_every_period() {
        let start = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        let bucket = UsageBucket {
            total_downloaded: 2048,
            total_uploaded: 1024,
            period_start: start,
            period_end: Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
        };
        assert_eq!(
            usage_detail(PeriodKind::Month, &bucket, &Utc),
            "This Month: 3.00 KB (↓2.00 KB ↑1.00 KB) [2026-10-01 - 2026-10-19]"
        );
    }
}
