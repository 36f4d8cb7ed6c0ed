// SPDX-License-Identifier: MPL-2.0

//! Network speed meter
//!
//! Samples cumulative interface byte counters on a fixed cadence, turns them
//! into upload/download rates, and accumulates usage into day, week, month,
//! year and all-time buckets that survive restarts.
//!
//! ```no_run
//! use chrono::Utc;
//! use speedmeter::config::Config;
//! use speedmeter::monitor::{NetworkMonitor, SysinfoSource};
//! use speedmeter::usage::{JsonFileStore, UsageAccumulator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_default();
//! let store = JsonFileStore::open("usage.json")?;
//! let usage = UsageAccumulator::load_local(store, Utc::now());
//! let monitor = NetworkMonitor::new(SysinfoSource::new(), usage, &config);
//!
//! monitor.start();
//! monitor.tick(std::time::Instant::now(), Utc::now())?;
//! println!("{}", monitor.current_rate().title());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod format;
pub mod monitor;
pub mod usage;

pub use config::Config;
pub use format::{format_period_range, format_rate, format_total, usage_detail, usage_summary};
