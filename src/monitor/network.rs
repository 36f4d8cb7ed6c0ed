// SPDX-License-Identifier: MPL-2.0

//! Network monitor
//!
//! Wires a [`RateSampler`] to a [`UsageAccumulator`] and a [`SpeedHistory`].
//! All three live behind one mutex: the sampling task is the only writer,
//! and presentation code reads through [`NetworkMonitor::snapshot`], which
//! always observes a fully applied tick.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeZone, Utc};
use tokio::time::MissedTickBehavior;

use super::history::{SpeedHistory, SpeedPoint};
use super::sampler::{RateEvent, RateSample, RateSampler};
use super::source::{CounterSource, SampleError};
use crate::config::Config;
use crate::usage::{PeriodKind, UsageAccumulator, UsageBucket, UsageStore};

struct Inner<C, S, Tz: TimeZone> {
    sampler: RateSampler<C>,
    usage: UsageAccumulator<S, Tz>,
    history: SpeedHistory,
    is_monitoring: bool,
}

/// Consistent copy of everything the presentation layer shows.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub rate: RateSample,
    /// In [`PeriodKind::ALL`] order.
    pub usage: Vec<(PeriodKind, UsageBucket)>,
    pub history: Vec<SpeedPoint>,
    pub is_monitoring: bool,
}

impl Snapshot {
    pub fn usage(&self, kind: PeriodKind) -> Option<&UsageBucket> {
        self.usage
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, bucket)| bucket)
    }
}

/// Calendar buckets follow the accumulator's time zone, `Local` by default.
pub struct NetworkMonitor<C, S, Tz: TimeZone = Local> {
    inner: Arc<Mutex<Inner<C, S, Tz>>>,
    update_interval: Duration,
}

impl<C, S, Tz: TimeZone> Clone for NetworkMonitor<C, S, Tz> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            update_interval: self.update_interval,
        }
    }
}

impl<C: CounterSource, S: UsageStore, Tz: TimeZone> NetworkMonitor<C, S, Tz> {
    /// New, stopped monitor.
    pub fn new(source: C, usage: UsageAccumulator<S, Tz>, config: &Config) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                sampler: RateSampler::new(source),
                usage,
                history: SpeedHistory::new(config.history_points),
                is_monitoring: false,
            })),
            update_interval: config.update_interval(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<C, S, Tz>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin accepting ticks. The first tick afterwards re-primes the
    /// sampler so time spent stopped is not counted.
    pub fn start(&self) {
        let mut inner = self.lock();
        if inner.is_monitoring {
            return;
        }
        inner.sampler.reset();
        inner.is_monitoring = true;
        log::info!("Network monitoring started");
    }

    pub fn stop(&self) {
        let mut inner = self.lock();
        if inner.is_monitoring {
            inner.is_monitoring = false;
            log::info!("Network monitoring stopped");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.lock().is_monitoring
    }

    /// Run one sampler tick and feed any delta into the accumulator.
    ///
    /// Returns `Ok(None)` while stopped. `now` drives the rate maths and
    /// `wall` the calendar buckets.
    pub fn tick(&self, now: Instant, wall: DateTime<Utc>) -> Result<Option<RateEvent>, SampleError> {
        let mut inner = self.lock();
        if !inner.is_monitoring {
            return Ok(None);
        }

        let event = inner.sampler.tick(now)?;
        if event.measured {
            inner.history.push(SpeedPoint {
                at: wall,
                download: event.sample.download_speed,
                upload: event.sample.upload_speed,
            });
        }
        if let Some(delta) = event.delta {
            inner.usage.add_usage(delta.downloaded, delta.uploaded, wall);
        }
        Ok(Some(event))
    }

    pub fn current_rate(&self) -> RateSample {
        self.lock().sampler.current().clone()
    }

    pub fn usage(&self, kind: PeriodKind) -> UsageBucket {
        self.lock().usage.usage(kind).clone()
    }

    pub fn reset_usage(&self, kind: PeriodKind, now: DateTime<Utc>) {
        self.lock().usage.reset_usage(kind, now);
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.lock();
        Snapshot {
            rate: inner.sampler.current().clone(),
            usage: inner
                .usage
                .iter()
                .map(|(kind, bucket)| (kind, bucket.clone()))
                .collect(),
            history: inner.history.to_vec(),
            is_monitoring: inner.is_monitoring,
        }
    }

    /// Tick at the configured interval until `shutdown` resolves.
    ///
    /// Read failures are logged and retried on the next tick. Ticks missed
    /// while the host was busy are skipped rather than replayed.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.update_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = interval.tick() => {
                    if let Err(e) = self.tick(Instant::now(), Utc::now()) {
                        log::warn!("Network sample failed: {}", e);
                    }
                }
            }
        }

        self.stop();
    }
}
