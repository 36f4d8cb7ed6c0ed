// SPDX-License-Identifier: MPL-2.0

//! Calendar periods and their canonical boundaries.
//!
//! Boundaries are computed in whatever time zone the caller's `now` carries,
//! then returned as UTC instants so buckets can be stored zone-independently.
//! Weeks start on Monday (ISO 8601).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeDelta, TimeZone, Utc};
use thiserror::Error;

/// The rolling periods usage is bucketed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodKind {
    Day,
    Week,
    Month,
    Year,
    /// Never rolls over.
    AllTime,
}

impl PeriodKind {
    /// Every period, in display order.
    pub const ALL: [PeriodKind; 5] = [
        PeriodKind::Day,
        PeriodKind::Week,
        PeriodKind::Month,
        PeriodKind::Year,
        PeriodKind::AllTime,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PeriodKind::Day => "Today",
            PeriodKind::Week => "This Week",
            PeriodKind::Month => "This Month",
            PeriodKind::Year => "This Year",
            PeriodKind::AllTime => "All Time",
        }
    }

    /// Persistence key for this period's bucket record.
    pub fn key(self) -> &'static str {
        match self {
            PeriodKind::Day => "usage.today",
            PeriodKind::Week => "usage.week",
            PeriodKind::Month => "usage.month",
            PeriodKind::Year => "usage.year",
            PeriodKind::AllTime => "usage.alltime",
        }
    }

    /// Position in [`PeriodKind::ALL`].
    pub fn index(self) -> usize {
        match self {
            PeriodKind::Day => 0,
            PeriodKind::Week => 1,
            PeriodKind::Month => 2,
            PeriodKind::Year => 3,
            PeriodKind::AllTime => 4,
        }
    }

    pub fn rolls_over(self) -> bool {
        self != PeriodKind::AllTime
    }

    /// Canonical start of the period containing `now`.
    ///
    /// Day, week, month and year start at local midnight of their first day.
    /// `AllTime` has no calendar boundary, so its start is `now` itself.
    pub fn start_of<Tz: TimeZone>(self, now: &DateTime<Tz>) -> DateTime<Utc> {
        let today = now.date_naive();
        let first_day = match self {
            PeriodKind::Day => Some(today),
            PeriodKind::Week => today.checked_sub_days(Days::new(u64::from(
                today.weekday().num_days_from_monday(),
            ))),
            PeriodKind::Month => NaiveDate::from_ymd_opt(today.year(), today.month(), 1),
            PeriodKind::Year => NaiveDate::from_yo_opt(today.year(), 1),
            PeriodKind::AllTime => None,
        };

        first_day
            .and_then(|day| local_midnight(&now.timezone(), day))
            .unwrap_or_else(|| now.with_timezone(&Utc))
    }

    /// Whether a bucket that started at `start` still belongs to the period
    /// containing `now`.
    ///
    /// A day bucket is current only on the same calendar day. Week, month and
    /// year buckets are current unless they started before the canonical
    /// boundary, so a start stamped later in the same period still counts.
    pub fn is_current<Tz: TimeZone>(self, start: &DateTime<Utc>, now: &DateTime<Tz>) -> bool {
        match self {
            PeriodKind::Day => start.with_timezone(&now.timezone()).date_naive() == now.date_naive(),
            PeriodKind::Week | PeriodKind::Month | PeriodKind::Year => *start >= self.start_of(now),
            PeriodKind::AllTime => true,
        }
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
#[error("unknown period '{0}' (expected today, week, month, year or all-time)")]
pub struct ParsePeriodError(String);

impl FromStr for PeriodKind {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" | "day" => Ok(PeriodKind::Day),
            "week" => Ok(PeriodKind::Week),
            "month" => Ok(PeriodKind::Month),
            "year" => Ok(PeriodKind::Year),
            "all-time" | "alltime" | "all" => Ok(PeriodKind::AllTime),
            _ => Err(ParsePeriodError(s.to_owned())),
        }
    }
}

/// First instant of `day` in `tz`.
///
/// Falls forward one hour when midnight is skipped by a DST transition.
fn local_midnight<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> Option<DateTime<Utc>> {
    let midnight = day.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + TimeDelta::hours(1))).earliest())
        .map(|start| start.with_timezone(&Utc))
}
