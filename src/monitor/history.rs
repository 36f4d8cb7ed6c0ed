// SPDX-License-Identifier: MPL-2.0

//! Recent speed samples for charting

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of points kept by default: one minute at one tick per second.
pub const DEFAULT_HISTORY_POINTS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SpeedPoint {
    pub at: DateTime<Utc>,
    pub download: f64,
    pub upload: f64,
}

/// Bounded FIFO of the most recent speed points, oldest first.
#[derive(Debug, Clone)]
pub struct SpeedHistory {
    capacity: usize,
    points: VecDeque<SpeedPoint>,
}

impl Default for SpeedHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_POINTS)
    }
}

impl SpeedHistory {
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, point: SpeedPoint) {
        while self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn points(&self) -> impl Iterator<Item = &SpeedPoint> {
        self.points.iter()
    }

    pub fn to_vec(&self) -> Vec<SpeedPoint> {
        self.points.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn peak_download(&self) -> f64 {
        self.points.iter().map(|p| p.download).fold(0.0, f64::max)
    }

    pub fn peak_upload(&self) -> f64 {
        self.points.iter().map(|p| p.upload).fold(0.0, f64::max)
    }

    pub fn average_download(&self) -> f64 {
        self.average(|p| p.download)
    }

    pub fn average_upload(&self) -> f64 {
        self.average(|p| p.upload)
    }

    fn average(&self, field: impl Fn(&SpeedPoint) -> f64) -> f64 {
        if self.points.is_empty() {
            return 0.0;
        }
        self.points.iter().map(field).sum::<f64>() / self.points.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn point(second: i64, download: f64, upload: f64) -> SpeedPoint {
        let base = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        SpeedPoint {
            at: base + TimeDelta::seconds(second),
            download,
            upload,
        }
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut history = SpeedHistory::new(3);
        for s in 0..5 {
            history.push(point(s, s as f64, 0.0));
        }

        let downloads: Vec<f64> = history.points().map(|p| p.download).collect();
        assert_eq!(downloads, vec![2.0, 3.0, 4.0]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn peaks_and_averages() {
        let mut history = SpeedHistory::default();
        assert_eq!(history.average_download(), 0.0);
        assert_eq!(history.peak_upload(), 0.0);

        history.push(point(0, 100.0, 10.0));
        history.push(point(1, 300.0, 30.0));
        assert_eq!(history.peak_download(), 300.0);
        assert_eq!(history.peak_upload(), 30.0);
        assert_eq!(history.average_download(), 200.0);
        assert_eq!(history.average_upload(), 20.0);
    }

    #[test]
    fn zero_capacity_keeps_latest_point() {
        let mut history = SpeedHistory::new(0);
        history.push(point(0, 1.0, 1.0));
        history.push(point(1, 2.0, 2.0));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.to_vec(), vec![point(1, 2.0, 2.0)]);
    }
}
