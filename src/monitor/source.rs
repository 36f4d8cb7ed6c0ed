// SPDX-License-Identifier: MPL-2.0

//! # Counter Sources
//!
//! A counter source reports the cumulative received/sent byte counts summed
//! over every active interface. The counts only need to be monotonic per
//! boot; the sampler copes with resets.
//!
//! ## Implementations
//!
//! - [`SysinfoSource`]: reads per-interface totals through `sysinfo`
//!   (`/proc/net/dev` on Linux, `getifaddrs` on macOS and the BSDs,
//!   `GetIfTable2` on Windows), skipping loopback devices.
//! - Any `FnMut() -> Result<CounterPair, SampleError>` closure, which is
//!   what the tests script readings with.

use sysinfo::Networks;
use thiserror::Error;

/// Cumulative byte counters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterPair {
    pub received: u64,
    pub sent: u64,
}

impl CounterPair {
    pub fn new(received: u64, sent: u64) -> Self {
        Self { received, sent }
    }
}

/// Connectivity as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkStatus {
    pub connected: bool,
    pub label: String,
}

impl Default for LinkStatus {
    fn default() -> Self {
        Self {
            connected: false,
            label: String::from("Unknown"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("counter source unavailable: {reason}")]
    Source { reason: String },

    #[error("no network interfaces found")]
    NoInterfaces,
}

/// Provider of cumulative interface byte counts.
pub trait CounterSource {
    fn sample(&mut self) -> Result<CounterPair, SampleError>;

    /// Link state as of the last successful `sample`.
    fn link(&self) -> LinkStatus {
        LinkStatus::default()
    }
}

impl<F> CounterSource for F
where
    F: FnMut() -> Result<CounterPair, SampleError>,
{
    fn sample(&mut self) -> Result<CounterPair, SampleError> {
        self()
    }
}

// ============================================================================
// sysinfo-backed source
// ============================================================================

/// Counter source over every non-loopback interface `sysinfo` can see.
pub struct SysinfoSource {
    networks: Networks,
}

impl SysinfoSource {
    pub fn new() -> Self {
        Self {
            networks: Networks::new_with_refreshed_list(),
        }
    }

    fn interfaces(&self) -> impl Iterator<Item = (&String, &sysinfo::NetworkData)> {
        self.networks
            .iter()
            .filter(|(name, _)| !is_loopback(name))
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterSource for SysinfoSource {
    fn sample(&mut self) -> Result<CounterPair, SampleError> {
        // `refresh` alone never picks up interfaces that appear later
        // (VPN tunnels, tethering, hot-plugged adapters).
        self.networks.refresh_list();
        self.networks.refresh();

        let mut seen = false;
        let mut totals = CounterPair::default();
        for (_name, data) in self.interfaces() {
            seen = true;
            totals.received = totals.received.saturating_add(data.total_received());
            totals.sent = totals.sent.saturating_add(data.total_transmitted());
        }

        if !seen {
            return Err(SampleError::NoInterfaces);
        }
        Ok(totals)
    }

    /// Connected when any non-loopback interface has moved traffic; the
    /// label is the busiest such interface.
    fn link(&self) -> LinkStatus {
        self.interfaces()
            .map(|(name, data)| {
                let traffic = data.total_received().saturating_add(data.total_transmitted());
                (name, traffic)
            })
            .filter(|(_, traffic)| *traffic > 0)
            .max_by_key(|(_, traffic)| *traffic)
            .map(|(name, _)| LinkStatus {
                connected: true,
                label: name.clone(),
            })
            .unwrap_or_default()
    }
}

fn is_loopback(name: &str) -> bool {
    name == "lo" || name.starts_with("lo0") || name.to_ascii_lowercase().contains("loopback")
}
