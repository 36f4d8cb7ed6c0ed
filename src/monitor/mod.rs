// SPDX-License-Identifier: MPL-2.0

//! Network throughput sampling

pub mod history;
pub mod network;
pub mod sampler;
pub mod source;

pub use history::{SpeedHistory, SpeedPoint};
pub use network::{NetworkMonitor, Snapshot};
pub use sampler::{RateEvent, RateSample, RateSampler, UsageDelta};
pub use source::{CounterPair, CounterSource, LinkStatus, SampleError, SysinfoSource};
