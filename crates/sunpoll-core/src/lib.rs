//! # sunpoll core library
//!
//! Polls the SolarEdge monitoring API for recent production readings and
//! records each finalized reading in InfluxDB exactly once, even across
//! restarts.
//!
//! ## Architecture
//!
//! - **Tracker**: a JSON-persisted set of the reading timestamps already
//!   written, pruned to the last 24 hours
//! - **Poller**: sleeps until one minute past each quarter hour, fetches the
//!   last hour of readings with bounded retry, and writes what is new
//! - **Integrations**: the SolarEdge client and InfluxDB writer behind the
//!   [`EnergySource`] and [`PointSink`] traits
//!
//! ## Key Components
//!
//! - [`TimestampTracker`] / [`TrackerStore`]: dedup set and its file
//! - [`Poller`]: the sleep/poll state machine
//! - [`RetryPolicy`]: exponential backoff helper
//! - [`Config`]: environment and TOML configuration

pub mod config;
pub mod energy;
pub mod error;
pub mod integrations;
pub mod point;
pub mod poller;
pub mod retry;
pub mod schedule;
pub mod storage;

pub use config::Config;
pub use energy::{EnergyDetails, EnergyRequest, MeterReadings, MeterType, Sample, TimeUnit};
pub use error::{ConfigError, CoreError, SinkError, TrackerError, UpstreamError};
pub use integrations::{EnergySource, InfluxSink, PointSink, SolarEdgeClient};
pub use point::Point;
pub use poller::{CycleOutcome, CycleReport, Poller, SampleStatus};
pub use retry::{RetryExhausted, RetryPolicy};
pub use storage::{TimestampTracker, TrackerStore};
