//! The poll loop.
//!
//! Alternates between sleeping until the next wake instant and polling the
//! energy source. A poll fetches the last hour of quarter-hour Production
//! readings, writes every finalized and not-yet-recorded reading to the
//! sink, then prunes and saves the tracker.
//!
//! Only fatal conditions come back as `Err`: a tracker that cannot be saved,
//! or a response with no Production readings at all. Upstream failures are
//! retried and then the cycle is abandoned; sink failures are logged and the
//! reading is picked up again on a later cycle.

use std::convert::Infallible;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use crate::energy::{bucket_width, EnergyRequest, MeterType};
use crate::error::{CoreError, Result, UpstreamError};
use crate::integrations::traits::{EnergySource, PointSink};
use crate::point::Point;
use crate::retry::RetryPolicy;
use crate::schedule;
use crate::storage::{TimestampTracker, TrackerStore};

pub const MEASUREMENT: &str = "energyDetail";
pub const FIELD_GENERATED: &str = "generated";

/// How far back each poll asks for readings.
pub fn poll_window() -> Duration {
    Duration::hours(1)
}

/// How long recorded timestamps are remembered.
pub fn tracker_retention() -> Duration {
    Duration::hours(24)
}

/// A reading that had a value during a cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleStatus {
    pub timestamp: DateTime<Tz>,
    pub value: f64,
    pub recorded: bool,
}

/// Summary of a completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub now: DateTime<Tz>,
    /// Readings with a value, newest first.
    pub samples: Vec<SampleStatus>,
    /// Readings without a value yet.
    pub pending: usize,
    pub write_failures: usize,
    pub pruned: usize,
}

impl CycleReport {
    pub fn recorded(&self) -> usize {
        self.samples.iter().filter(|s| s.recorded).count()
    }
}

/// How a single poll cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// The energy source kept failing. Nothing was written or saved.
    Abandoned {
        attempts: u32,
        last_error: UpstreamError,
    },
}

/// Polls `source` at each wake instant and writes new Production
/// samples to `sink`, remembering what was written in the tracker file.
pub struct Poller<S, K> {
    source: S,
    sink: K,
    store: TrackerStore,
    retry: RetryPolicy,
    timezone: Tz,
}

impl<S: EnergySource, K: PointSink> Poller<S, K> {
    pub fn new(source: S, sink: K, store: TrackerStore, timezone: Tz) -> Self {
        Self {
            source,
            sink,
            store,
            retry: RetryPolicy::default(),
            timezone,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &TrackerStore {
        &self.store
    }

    /// Current time in the reference timezone.
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.timezone)
    }

    /// Sleep and poll forever. Returns only on a fatal error.
    pub async fn run(&self, mut tracker: TimestampTracker) -> Result<Infallible> {
        loop {
            let now = self.now();
            let wake = schedule::next_wake(&now);
            log::info!("Sleep Until: {wake}");
            tokio::time::sleep(schedule::until(&now, &wake)).await;

            log::info!("checking");
            let outcome = self.poll_once(&mut tracker, self.now()).await?;
            match outcome {
                CycleOutcome::Completed(report) => log::info!(
                    "cycle done: {} recorded, {} pending, {} write failures, {} tracked",
                    report.recorded(),
                    report.pending,
                    report.write_failures,
                    tracker.len()
                ),
                CycleOutcome::Abandoned { attempts, .. } => {
                    log::warn!("cycle abandoned after {attempts} attempts")
                }
            }
        }
    }

    /// Run a single poll cycle as of `now`.
    pub async fn poll_once(
        &self,
        tracker: &mut TimestampTracker,
        now: DateTime<Tz>,
    ) -> Result<CycleOutcome> {
        let request = EnergyRequest::production(now - poll_window(), now);

        let details = match self
            .retry
            .run(|| self.source.energy_details(&request))
            .await
        {
            Ok(details) => details,
            Err(exhausted) => {
                log::error!(
                    "retries exceeded getting site energy: {}",
                    exhausted.last_error
                );
                return Ok(CycleOutcome::Abandoned {
                    attempts: exhausted.attempts,
                    last_error: exhausted.last_error,
                });
            }
        };

        let mut samples = match details.meter(&MeterType::Production) {
            Some(meter) if !meter.samples.is_empty() => meter.samples.clone(),
            _ => return Err(CoreError::NoProductionMeter),
        };
        samples.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let point_time = now.with_timezone(&Utc);
        let mut report = CycleReport {
            now,
            samples: Vec::with_capacity(samples.len()),
            pending: 0,
            write_failures: 0,
            pruned: 0,
        };

        for sample in samples {
            let Some(value) = sample.value else {
                report.pending += 1;
                continue;
            };

            let mut recorded = false;
            let age = now.signed_duration_since(sample.timestamp);
            if age > bucket_width() && !tracker.has(&sample.timestamp) {
                let point = Point::new(MEASUREMENT, point_time)
                    .with_tag("unit", "energy")
                    .with_field(FIELD_GENERATED, value);
                match self.sink.write_point(&point).await {
                    Ok(()) => {
                        tracker.add(&sample.timestamp);
                        recorded = true;
                    }
                    Err(e) => {
                        log::error!("error writing record: {e}");
                        report.write_failures += 1;
                    }
                }
            }

            log::info!("{}: {:.6} {}", sample.timestamp, value, recorded);
            report.samples.push(SampleStatus {
                timestamp: sample.timestamp,
                value,
                recorded,
            });
        }

        report.pruned = tracker.prune_older(&(now - tracker_retention()));
        self.store.save(tracker)?;

        Ok(CycleOutcome::Completed(report))
    }
}
