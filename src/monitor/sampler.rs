// SPDX-License-Identifier: MPL-2.0

//! Rate sampling

use std::time::Instant;

use super::source::{CounterPair, CounterSource, SampleError};
use crate::format::format_rate;

/// Live throughput, recomputed every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSample {
    /// Bytes per second received
    pub download_speed: f64,
    /// Bytes per second sent
    pub upload_speed: f64,
    pub is_connected: bool,
    pub interface_label: String,
}

impl Default for RateSample {
    fn default() -> Self {
        Self {
            download_speed: 0.0,
            upload_speed: 0.0,
            is_connected: false,
            interface_label: String::from("Unknown"),
        }
    }
}

impl RateSample {
    /// Menu bar title, e.g. `↓ 1.5 KB/s ↑ 0.0 B/s`.
    pub fn title(&self) -> String {
        format!(
            "↓ {} ↑ {}",
            format_rate(self.download_speed),
            format_rate(self.upload_speed)
        )
    }

    fn idle(&self) -> Self {
        Self {
            download_speed: 0.0,
            upload_speed: 0.0,
            ..self.clone()
        }
    }
}

/// Bytes moved since the previous tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageDelta {
    pub downloaded: i64,
    pub uploaded: i64,
}

/// Result of one successful tick.
#[derive(Debug, Clone, PartialEq)]
pub struct RateEvent {
    pub sample: RateSample,
    /// Present only when bytes actually moved.
    pub delta: Option<UsageDelta>,
    /// False when the tick was not after the previous one and the stored
    /// rate was left alone.
    pub measured: bool,
}

#[derive(Debug, Clone, Copy)]
struct Baseline {
    counters: CounterPair,
    at: Instant,
}

/// Turns cumulative counters into rates and deltas.
///
/// The first successful read only primes the baseline. After that, each
/// tick compares against the previous read; a counter that went backwards
/// (interface reset, reboot, wraparound) counts as zero for that interval.
pub struct RateSampler<C> {
    source: C,
    baseline: Option<Baseline>,
    current: RateSample,
}

impl<C: CounterSource> RateSampler<C> {
    pub fn new(source: C) -> Self {
        Self {
            source,
            baseline: None,
            current: RateSample::default(),
        }
    }

    /// Latest computed rate.
    pub fn current(&self) -> &RateSample {
        &self.current
    }

    pub fn is_primed(&self) -> bool {
        self.baseline.is_some()
    }

    /// Forget the baseline so the next tick primes again.
    pub fn reset(&mut self) {
        self.baseline = None;
    }

    /// Read the counters once and derive the rate since the previous read.
    ///
    /// On a read failure nothing changes and the error is returned; the
    /// caller retries on its next tick. A `now` that is not after the
    /// previous tick yields a zero-rate event and leaves all state alone.
    pub fn tick(&mut self, now: Instant) -> Result<RateEvent, SampleError> {
        let counters = self.source.sample()?;

        let Some(baseline) = self.baseline else {
            log::debug!(
                "Sampler primed at {} rx / {} tx bytes",
                counters.received,
                counters.sent
            );
            self.baseline = Some(Baseline { counters, at: now });
            self.refresh_link();
            self.current = self.current.idle();
            return Ok(RateEvent {
                sample: self.current.clone(),
                delta: None,
                measured: true,
            });
        };

        let elapsed = match now.checked_duration_since(baseline.at) {
            Some(elapsed) if !elapsed.is_zero() => elapsed.as_secs_f64(),
            _ => {
                return Ok(RateEvent {
                    sample: self.current.idle(),
                    delta: None,
                    measured: false,
                });
            }
        };

        let received = counter_delta(counters.received, baseline.counters.received, "received");
        let sent = counter_delta(counters.sent, baseline.counters.sent, "sent");

        self.refresh_link();
        self.current.download_speed = received as f64 / elapsed;
        self.current.upload_speed = sent as f64 / elapsed;
        self.baseline = Some(Baseline { counters, at: now });

        let delta = (received > 0 || sent > 0).then(|| UsageDelta {
            downloaded: i64::try_from(received).unwrap_or(i64::MAX),
            uploaded: i64::try_from(sent).unwrap_or(i64::MAX),
        });

        Ok(RateEvent {
            sample: self.current.clone(),
            delta,
            measured: true,
        })
    }

    fn refresh_link(&mut self) {
        let link = self.source.link();
        self.current.is_connected = link.connected;
        self.current.interface_label = link.label;
    }
}

fn counter_delta(current: u64, previous: u64, direction: &str) -> u64 {
    if current < previous {
        log::debug!(
            "{} counter went backwards ({} -> {}), counting as zero",
            direction,
            previous,
            current
        );
    }
    current.saturating_sub(previous)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    fn scripted(
        readings: Vec<Result<CounterPair, SampleError>>,
    ) -> impl FnMut() -> Result<CounterPair, SampleError> {
        let mut readings = VecDeque::from(readings);
        move || {
            readings.pop_front().unwrap_or(Err(SampleError::Source {
                reason: "script exhausted".into(),
            }))
        }
    }

    fn secs(base: Instant, s: f64) -> Instant {
        base + Duration::from_secs_f64(s)
    }

    #[test]
    fn first_tick_primes_without_delta() {
        let mut sampler = RateSampler::new(scripted(vec![Ok(CounterPair::new(1000, 500))]));
        let event = sampler.tick(Instant::now()).unwrap();

        assert_eq!(event.delta, None);
        assert_eq!(event.sample.download_speed, 0.0);
        assert_eq!(event.sample.upload_speed, 0.0);
        assert!(sampler.is_primed());
    }

    #[test]
    fn rate_is_delta_over_elapsed_seconds() {
        let t0 = Instant::now();
        let mut sampler = RateSampler::new(scripted(vec![
            Ok(CounterPair::new(1000, 500)),
            Ok(CounterPair::new(3000, 500)),
        ]));
        sampler.tick(t0).unwrap();
        let event = sampler.tick(secs(t0, 2.0)).unwrap();

        assert_eq!(event.sample.download_speed, 1000.0);
        assert_eq!(event.sample.upload_speed, 0.0);
        assert_eq!(
            event.delta,
            Some(UsageDelta {
                downloaded: 2000,
                uploaded: 0
            })
        );
        assert_eq!(sampler.current(), &event.sample);
    }

    #[test]
    fn counter_decrease_counts_as_zero() {
        let t0 = Instant::now();
        let mut sampler = RateSampler::new(scripted(vec![
            Ok(CounterPair::new(5000, 100)),
            Ok(CounterPair::new(100, 300)),
            Ok(CounterPair::new(600, 300)),
        ]));
        sampler.tick(t0).unwrap();

        let event = sampler.tick(secs(t0, 1.0)).unwrap();
        assert_eq!(event.sample.download_speed, 0.0);
        assert_eq!(event.sample.upload_speed, 200.0);
        assert_eq!(
            event.delta,
            Some(UsageDelta {
                downloaded: 0,
                uploaded: 200
            })
        );

        // The lower reading becomes the new baseline.
        let event = sampler.tick(secs(t0, 2.0)).unwrap();
        assert_eq!(event.sample.download_speed, 500.0);
    }

    #[test]
    fn idle_interval_updates_rate_but_emits_no_delta() {
        let t0 = Instant::now();
        let mut sampler = RateSampler::new(scripted(vec![
            Ok(CounterPair::new(0, 0)),
            Ok(CounterPair::new(4096, 0)),
            Ok(CounterPair::new(4096, 0)),
        ]));
        sampler.tick(t0).unwrap();
        sampler.tick(secs(t0, 1.0)).unwrap();

        let event = sampler.tick(secs(t0, 2.0)).unwrap();
        assert_eq!(event.delta, None);
        assert_eq!(sampler.current().download_speed, 0.0);
    }

    #[test]
    fn non_positive_elapsed_is_a_no_op() {
        let t0 = Instant::now();
        let mut sampler = RateSampler::new(scripted(vec![
            Ok(CounterPair::new(0, 0)),
            Ok(CounterPair::new(1024, 0)),
            Ok(CounterPair::new(9999, 0)),
            Ok(CounterPair::new(3072, 0)),
        ]));
        sampler.tick(t0).unwrap();
        sampler.tick(secs(t0, 1.0)).unwrap();
        assert_eq!(sampler.current().download_speed, 1024.0);

        // Duplicate timestamp: zero-rate event, stored rate and baseline kept.
        let event = sampler.tick(secs(t0, 1.0)).unwrap();
        assert_eq!(event.sample.download_speed, 0.0);
        assert_eq!(event.delta, None);
        assert!(!event.measured);
        assert_eq!(sampler.current().download_speed, 1024.0);

        // Measured against the 1024 baseline at t=1s, not the skipped read.
        let event = sampler.tick(secs(t0, 2.0)).unwrap();
        assert_eq!(event.sample.download_speed, 2048.0);
        assert!(event.measured);
    }

    #[test]
    fn read_failure_keeps_previous_state() {
        let t0 = Instant::now();
        let mut sampler = RateSampler::new(scripted(vec![
            Ok(CounterPair::new(0, 0)),
            Ok(CounterPair::new(2048, 1024)),
            Err(SampleError::NoInterfaces),
            Ok(CounterPair::new(4096, 1024)),
        ]));
        sampler.tick(t0).unwrap();
        sampler.tick(secs(t0, 1.0)).unwrap();

        let err = sampler.tick(secs(t0, 2.0)).unwrap_err();
        assert!(matches!(err, SampleError::NoInterfaces));
        assert_eq!(sampler.current().download_speed, 2048.0);
        assert_eq!(sampler.current().upload_speed, 1024.0);

        // Next success spans both intervals from the last good baseline.
        let event = sampler.tick(secs(t0, 3.0)).unwrap();
        assert_eq!(event.sample.download_speed, 1024.0);
        assert_eq!(event.sample.upload_speed, 0.0);
    }

    #[test]
    fn failure_before_priming_leaves_sampler_unprimed() {
        let mut sampler = RateSampler::new(scripted(vec![Err(SampleError::NoInterfaces)]));
        assert!(sampler.tick(Instant::now()).is_err());
        assert!(!sampler.is_primed());
    }

    #[test]
    fn reset_reprimes_on_next_tick() {
        let t0 = Instant::now();
        let mut sampler = RateSampler::new(scripted(vec![
            Ok(CounterPair::new(0, 0)),
            Ok(CounterPair::new(1_000_000, 0)),
        ]));
        sampler.tick(t0).unwrap();
        sampler.reset();

        let event = sampler.tick(secs(t0, 60.0)).unwrap();
        assert_eq!(event.delta, None);
        assert_eq!(event.sample.download_speed, 0.0);
    }

    #[test]
    fn title_formats_both_directions() {
        let sample = RateSample {
            download_speed: 1536.0,
            upload_speed: 0.0,
            ..RateSample::default()
        };
        assert_eq!(sample.title(), "↓ 1.5 KB/s ↑ 0.0 B/s");
    }
}
