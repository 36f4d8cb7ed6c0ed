// SPDX-License-Identifier: MPL-2.0

//! Usage accounting: calendar periods, buckets, persistence

pub mod bucket;
pub mod period;
pub mod store;
pub mod tracker;

pub use bucket::UsageBucket;
pub use period::PeriodKind;
pub use store::{JsonFileStore, MemoryStore, StoreError, StoreLock, UsageStore};
pub use tracker::UsageAccumulator;
