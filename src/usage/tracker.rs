// SPDX-License-Identifier: MPL-2.0

//! Usage accumulator
//!
//! Keeps one [`UsageBucket`] per [`PeriodKind`], rolls stale buckets over
//! before every add, and writes all five back to the store as one batch.
//!
//! Each bucket's own `period_start` decides whether that bucket is stale, so
//! a day bucket reset by hand never holds back a week or month rollover.
//! A process that was asleep for several periods lands directly in the
//! current one; intermediate periods are not materialised.

use chrono::{DateTime, Local, TimeZone, Utc};

use super::bucket::UsageBucket;
use super::period::PeriodKind;
use super::store::{StoreError, UsageStore};

/// Store key holding the time of the last successful write.
pub const LAST_UPDATE_KEY: &str = "usage.lastUpdate";

pub struct UsageAccumulator<S, Tz: TimeZone = Local> {
    /// Indexed by [`PeriodKind::index`].
    buckets: [UsageBucket; 5],
    store: S,
    tz: Tz,
    persist_error: Option<StoreError>,
}

impl<S: UsageStore> UsageAccumulator<S, Local> {
    /// Load using the system's local time zone for calendar boundaries.
    pub fn load_local(store: S, now: DateTime<Utc>) -> Self {
        Self::load(store, Local, now)
    }
}

impl<S: UsageStore, Tz: TimeZone> UsageAccumulator<S, Tz> {
    /// Restore buckets from `store`, then roll over anything stale.
    ///
    /// Missing or malformed records only affect their own bucket, which
    /// starts fresh at the canonical start of its period.
    pub fn load(store: S, tz: Tz, now: DateTime<Utc>) -> Self {
        let local_now = now.with_timezone(&tz);
        let buckets = PeriodKind::ALL.map(|kind| {
            let stored = store.get(kind.key()).and_then(|raw| {
                let bucket = UsageBucket::from_record(&raw);
                if bucket.is_none() {
                    log::warn!("Discarding malformed {} record", kind.key());
                }
                bucket
            });
            stored.unwrap_or_else(|| UsageBucket::fresh(kind.start_of(&local_now), now))
        });

        let mut accumulator = Self {
            buckets,
            store,
            tz,
            persist_error: None,
        };
        accumulator.roll_over(now);
        accumulator
    }

    /// Record transferred bytes against every period.
    ///
    /// Stale buckets are replaced first, so a delta arriving just after
    /// midnight lands only in the new day. Persistence failures are logged
    /// and kept in [`UsageAccumulator::persist_error`]; the in-memory totals
    /// stay updated either way.
    pub fn add_usage(&mut self, downloaded: i64, uploaded: i64, now: DateTime<Utc>) {
        self.roll_over(now);
        for bucket in &mut self.buckets {
            bucket.add(downloaded, uploaded, now);
        }
        self.persist(now);
    }

    pub fn usage(&self, kind: PeriodKind) -> &UsageBucket {
        &self.buckets[kind.index()]
    }

    /// All buckets in [`PeriodKind::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (PeriodKind, &UsageBucket)> {
        PeriodKind::ALL.into_iter().zip(self.buckets.iter())
    }

    /// Zero one period and persist immediately.
    pub fn reset_usage(&mut self, kind: PeriodKind, now: DateTime<Utc>) {
        let start = kind.start_of(&now.with_timezone(&self.tz));
        self.buckets[kind.index()] = UsageBucket::fresh(start, now);
        log::info!("{} usage reset", kind);
        self.persist(now);
    }

    /// Replace every bucket whose period no longer contains `now`.
    ///
    /// Returns the periods that were rolled over. Running it again with a
    /// `now` in the same periods is a no-op.
    pub fn roll_over(&mut self, now: DateTime<Utc>) -> Vec<PeriodKind> {
        let local_now = now.with_timezone(&self.tz);
        let mut rolled = Vec::new();

        for kind in PeriodKind::ALL {
            let bucket = &mut self.buckets[kind.index()];
            if !kind.rolls_over() || kind.is_current(&bucket.period_start, &local_now) {
                continue;
            }

            log::info!(
                "{} rolled over: {} down / {} up since {}",
                kind,
                bucket.total_downloaded,
                bucket.total_uploaded,
                bucket.period_start
            );
            *bucket = UsageBucket::fresh(kind.start_of(&local_now), now);
            rolled.push(kind);
        }

        rolled
    }

    /// Time of the last successful write, as recorded in the store.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        let raw = self.store.get(LAST_UPDATE_KEY)?;
        serde_json::from_slice(&raw).ok()
    }

    /// Error from the most recent write, cleared by the next success.
    pub fn persist_error(&self) -> Option<&StoreError> {
        self.persist_error.as_ref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn persist(&mut self, now: DateTime<Utc>) {
        match self.write_all(now) {
            Ok(()) => self.persist_error = None,
            Err(e) => {
                log::error!("Failed to save usage data: {}", e);
                self.persist_error = Some(e);
            }
        }
    }

    fn write_all(&mut self, now: DateTime<Utc>) -> Result<(), StoreError> {
        let mut entries = Vec::with_capacity(PeriodKind::ALL.len() + 1);
        for (kind, bucket) in PeriodKind::ALL.into_iter().zip(self.buckets.iter()) {
            entries.push((kind.key().to_owned(), bucket.to_record()?));
        }
        entries.push((LAST_UPDATE_KEY.to_owned(), serde_json::to_vec(&now)?));
        self.store.set_batch(entries)
    }
}
