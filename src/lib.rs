//! Host reachability monitor.
//!
//! A [`Controller`] runs one probe loop at a time against a single target,
//! calling a [`Prober`] at a fixed interval and handing every outcome to a
//! [`ProbeObserver`]. [`NetworkProber`] is the ICMP/TCP implementation used
//! by the binary.

pub mod api;
pub mod board;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod observer;
pub mod prober;

pub use config::{ControllerConfig, DnsUpstream, MonitorConfig};
pub use controller::{Controller, StartOutcome, StopOutcome};
pub use error::{ConfigError, ControllerError, ProberError};
pub use models::{ProbeOutcome, ProbeReport, ProbeTarget, RunState};
pub use observer::{ChannelObserver, LogObserver, Observers, ProbeObserver};
pub use prober::{NetworkProber, Prober, RESOLUTION_FAILED};
