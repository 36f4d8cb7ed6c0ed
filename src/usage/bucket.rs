// SPDX-License-Identifier: MPL-2.0

//! Running totals for one period

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Accumulated bytes for one rolling period.
///
/// `period_end` is refreshed on every add and is informational only; the
/// rollover decision looks at `period_start` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageBucket {
    #[serde(rename = "downloaded")]
    pub total_downloaded: i64,
    #[serde(rename = "uploaded")]
    pub total_uploaded: i64,
    #[serde(rename = "periodStart")]
    pub period_start: DateTime<Utc>,
    #[serde(rename = "periodEnd")]
    pub period_end: DateTime<Utc>,
}

impl UsageBucket {
    /// Empty bucket starting at `start`.
    pub fn fresh(start: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            total_downloaded: 0,
            total_uploaded: 0,
            period_start: start,
            period_end: now,
        }
    }

    pub fn total_bytes(&self) -> i64 {
        self.total_downloaded.saturating_add(self.total_uploaded)
    }

    /// Add a delta. Negative inputs count as zero.
    pub fn add(&mut self, downloaded: i64, uploaded: i64, now: DateTime<Utc>) {
        self.total_downloaded = self.total_downloaded.saturating_add(downloaded.max(0));
        self.total_uploaded = self.total_uploaded.saturating_add(uploaded.max(0));
        self.period_end = now;
    }

    pub fn to_record(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decode a stored record, rejecting anything that could not have been
    /// written by [`UsageBucket::to_record`].
    pub fn from_record(raw: &[u8]) -> Option<Self> {
        let bucket: Self = serde_json::from_slice(raw).ok()?;
        if bucket.total_downloaded < 0 || bucket.total_uploaded < 0 {
            return None;
        }
        Some(bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn record_round_trip_preserves_every_field() {
        let t0 = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 10, 19, 13, 45, 12).unwrap();
        let bucket = UsageBucket {
            total_downloaded: 12345,
            total_uploaded: 6789,
            period_start: t0,
            period_end: t1,
        };

        let raw = bucket.to_record().unwrap();
        assert_eq!(UsageBucket::from_record(&raw), Some(bucket));
    }

    #[test]
    fn record_uses_stable_field_names() {
        let t0 = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        let raw = UsageBucket::fresh(t0, t0).to_record().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        for field in ["downloaded", "uploaded", "periodStart", "periodEnd"] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
    }

    #[test]
    fn malformed_records_are_rejected() {
        assert_eq!(UsageBucket::from_record(b"not json"), None);
        assert_eq!(UsageBucket::from_record(br#"{"downloaded": 1}"#), None);
        assert_eq!(
            UsageBucket::from_record(
                br#"{"downloaded": -5, "uploaded": 0,
                     "periodStart": "2026-10-01T00:00:00Z",
                     "periodEnd": "2026-10-01T00:00:00Z"}"#
            ),
            None
        );
    }

    #[test]
    fn add_ignores_negative_deltas_and_saturates() {
        let t0 = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 1).unwrap();
        let mut bucket = UsageBucket::fresh(t0, t0);
        bucket.add(-10, 20, t1);
        assert_eq!((bucket.total_downloaded, bucket.total_uploaded), (0, 20));
        assert_eq!(bucket.period_end, t1);

        bucket.total_downloaded = i64::MAX - 1;
        bucket.add(10, 0, t1);
        assert_eq!(bucket.total_downloaded, i64::MAX);
        assert_eq!(bucket.total_bytes(), i64::MAX);
    }
}
