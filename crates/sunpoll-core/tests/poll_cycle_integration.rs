//! Integration tests for poll cycles and the run loop against fake collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::America::Los_Angeles;
use chrono_tz::Tz;
use tempfile::TempDir;

use sunpoll_core::{
    CoreError, CycleOutcome, CycleReport, EnergyDetails, EnergyRequest, EnergySource,
    MeterReadings, MeterType, Point, PointSink, Poller, Sample, SinkError, TimeUnit,
    TimestampTracker, TrackerStore, UpstreamError,
};

#[derive(Default)]
struct FakeSource {
    responses: Mutex<VecDeque<Result<EnergyDetails, UpstreamError>>>,
    requests: Mutex<Vec<EnergyRequest>>,
    calls: AtomicU32,
}

impl FakeSource {
    fn replying(responses: Vec<Result<EnergyDetails, UpstreamError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EnergySource for &FakeSource {
    async fn energy_details(&self, request: &EnergyRequest) -> Result<EnergyDetails, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(UpstreamError::Decode("no scripted response".to_string())))
    }
}

#[derive(Default)]
struct FakeSink {
    points: Mutex<Vec<Point>>,
    failing: AtomicBool,
}

impl FakeSink {
    fn points(&self) -> Vec<Point> {
        self.points.lock().unwrap().clone()
    }
}

impl PointSink for &FakeSink {
    async fn write_point(&self, point: &Point) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        self.points.lock().unwrap().push(point.clone());
        Ok(())
    }
}

fn cycle_time() -> DateTime<Tz> {
    Los_Angeles.with_ymd_and_hms(2024, 6, 10, 12, 1, 0).unwrap()
}

fn production(samples: Vec<(DateTime<Tz>, Option<f64>)>) -> EnergyDetails {
    EnergyDetails {
        time_unit: Some("QUARTER_OF_AN_HOUR".to_string()),
        unit: Some("Wh".to_string()),
        meters: vec![MeterReadings {
            meter_type: MeterType::Production,
            samples: samples
                .into_iter()
                .map(|(timestamp, value)| Sample { timestamp, value })
                .collect(),
        }],
    }
}

fn completed(outcome: CycleOutcome) -> CycleReport {
    match outcome {
        CycleOutcome::Completed(report) => report,
        other => panic!("expected a completed cycle, got {other:?}"),
    }
}

struct Harness {
    _dir: TempDir,
    store: TrackerStore,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let store = TrackerStore::new(dir.path().join("tracker.json"));
        Self { _dir: dir, store }
    }

    fn poller<'a>(
        &self,
        source: &'a FakeSource,
        sink: &'a FakeSink,
    ) -> Poller<&'a FakeSource, &'a FakeSink> {
        Poller::new(source, sink, self.store.clone(), Los_Angeles)
    }
}

#[tokio::test(start_paused = true)]
async fn test_finalized_sample_is_recorded_once() {
    let harness = Harness::new();
    let now = cycle_time();
    let sample_time = now - Duration::minutes(20);

    let source = FakeSource::replying(vec![
        Ok(production(vec![(sample_time, Some(5.0))])),
        Ok(production(vec![(sample_time, Some(5.0))])),
    ]);
    let sink = FakeSink::default();
    let poller = harness.poller(&source, &sink);
    let mut tracker = harness.store.load().unwrap();

    let report = completed(poller.poll_once(&mut tracker, now).await.unwrap());
    assert_eq!(report.recorded(), 1);
    assert!(tracker.has(&sample_time));

    let points = sink.points();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].measurement, "energyDetail");
    assert_eq!(points[0].tags.get("unit").map(String::as_str), Some("energy"));
    assert_eq!(points[0].fields.get("generated"), Some(&5.0));
    // Points carry the cycle time, not the reading's own timestamp
    assert_eq!(points[0].time, now.with_timezone(&Utc));

    // The saved snapshot already has it
    assert!(harness.store.load().unwrap().has(&sample_time));

    // A later cycle still sees the reading in its window
    let later = now + Duration::minutes(15);
    let report = completed(poller.poll_once(&mut tracker, later).await.unwrap());
    assert_eq!(report.recorded(), 0);
    assert_eq!(report.samples.len(), 1);
    assert_eq!(sink.points().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dedup_survives_restart() {
    let harness = Harness::new();
    let now = cycle_time();
    let sample_time = now - Duration::minutes(30);

    let source = FakeSource::replying(vec![
        Ok(production(vec![(sample_time, Some(1.5))])),
        Ok(production(vec![(sample_time, Some(1.5))])),
    ]);
    let sink = FakeSink::default();

    let mut tracker = harness.store.load().unwrap();
    harness
        .poller(&source, &sink)
        .poll_once(&mut tracker, now)
        .await
        .unwrap();

    // Fresh process: reload from disk
    let mut reloaded = harness.store.load().unwrap();
    harness
        .poller(&source, &sink)
        .poll_once(&mut reloaded, now + Duration::minutes(15))
        .await
        .unwrap();

    assert_eq!(sink.points().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_recent_sample_is_never_recorded() {
    let harness = Harness::new();
    let now = cycle_time();

    let source = FakeSource::replying(vec![Ok(production(vec![
        (now - Duration::minutes(5), Some(3.0)),
        (now - Duration::minutes(15), Some(4.0)),
    ]))]);
    let sink = FakeSink::default();
    let mut tracker = TimestampTracker::new();

    let report = completed(
        harness
            .poller(&source, &sink)
            .poll_once(&mut tracker, now)
            .await
            .unwrap(),
    );

    // 5 minutes is inside the guard; exactly 15 minutes is not "older than"
    assert_eq!(report.samples.len(), 2);
    assert_eq!(report.recorded(), 0);
    assert!(sink.points().is_empty());
    assert!(tracker.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_samples_without_value_are_skipped() {
    let harness = Harness::new();
    let now = cycle_time();

    let source = FakeSource::replying(vec![Ok(production(vec![
        (now - Duration::minutes(45), None),
        (now - Duration::minutes(30), Some(2.0)),
    ]))]);
    let sink = FakeSink::default();
    let mut tracker = TimestampTracker::new();

    let report = completed(
        harness
            .poller(&source, &sink)
            .poll_once(&mut tracker, now)
            .await
            .unwrap(),
    );

    assert_eq!(report.pending, 1);
    assert_eq!(report.samples.len(), 1);
    assert!(!tracker.has(&(now - Duration::minutes(45))));
    assert!(tracker.has(&(now - Duration::minutes(30))));
}

#[tokio::test(start_paused = true)]
async fn test_report_lists_newest_first() {
    let harness = Harness::new();
    let now = cycle_time();
    let times = [
        now - Duration::minutes(60),
        now - Duration::minutes(30),
        now - Duration::minutes(45),
    ];

    let source = FakeSource::replying(vec![Ok(production(
        times.iter().map(|t| (*t, Some(1.0))).collect(),
    ))]);
    let sink = FakeSink::default();
    let mut tracker = TimestampTracker::new();

    let report = completed(
        harness
            .poller(&source, &sink)
            .poll_once(&mut tracker, now)
            .await
            .unwrap(),
    );

    let order: Vec<_> = report.samples.iter().map(|s| s.timestamp).collect();
    assert_eq!(order, vec![times[1], times[2], times[0]]);
    assert_eq!(sink.points().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_write_leaves_sample_for_next_cycle() {
    let harness = Harness::new();
    let now = cycle_time();
    let sample_time = now - Duration::minutes(20);

    let source = FakeSource::replying(vec![
        Ok(production(vec![(sample_time, Some(7.25))])),
        Ok(production(vec![(sample_time, Some(7.25))])),
    ]);
    let sink = FakeSink::default();
    sink.failing.store(true, Ordering::SeqCst);
    let poller = harness.poller(&source, &sink);
    let mut tracker = TimestampTracker::new();

    let report = completed(poller.poll_once(&mut tracker, now).await.unwrap());
    assert_eq!(report.write_failures, 1);
    assert_eq!(report.recorded(), 0);
    assert!(!tracker.has(&sample_time));

    sink.failing.store(false, Ordering::SeqCst);
    let report = completed(
        poller
            .poll_once(&mut tracker, now + Duration::minutes(15))
            .await
            .unwrap(),
    );
    assert_eq!(report.recorded(), 1);
    assert_eq!(sink.points()[0].fields.get("generated"), Some(&7.25));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_abandon_cycle() {
    let harness = Harness::new();
    let now = cycle_time();

    let source = FakeSource::replying(
        (0..5)
            .map(|_| {
                Err(UpstreamError::Status {
                    status: 500,
                    body: "oops".to_string(),
                })
            })
            .collect(),
    );
    let sink = FakeSink::default();
    let mut tracker: TimestampTracker = [(now - Duration::hours(30)).timestamp()]
        .into_iter()
        .collect();
    let before = tracker.clone();

    let started = tokio::time::Instant::now();
    let outcome = harness
        .poller(&source, &sink)
        .poll_once(&mut tracker, now)
        .await
        .unwrap();

    match outcome {
        CycleOutcome::Abandoned { attempts, .. } => assert_eq!(attempts, 5),
        other => panic!("expected abandoned cycle, got {other:?}"),
    }
    assert_eq!(source.calls(), 5);
    assert_eq!(started.elapsed(), std::time::Duration::from_secs(15));
    // No prune, no write, no save
    assert_eq!(tracker, before);
    assert!(sink.points().is_empty());
    assert!(!harness.store.path().exists());
}

#[tokio::test(start_paused = true)]
async fn test_retry_recovers_within_cycle() {
    let harness = Harness::new();
    let now = cycle_time();

    let source = FakeSource::replying(vec![
        Err(UpstreamError::Decode("truncated".to_string())),
        Ok(production(vec![(now - Duration::minutes(20), Some(9.0))])),
    ]);
    let sink = FakeSink::default();
    let mut tracker = TimestampTracker::new();

    let report = completed(
        harness
            .poller(&source, &sink)
            .poll_once(&mut tracker, now)
            .await
            .unwrap(),
    );
    assert_eq!(source.calls(), 2);
    assert_eq!(report.recorded(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_request_covers_last_hour_of_production() {
    let harness = Harness::new();
    let now = cycle_time();

    let source = FakeSource::replying(vec![Ok(production(vec![(
        now - Duration::minutes(20),
        Some(1.0),
    )]))]);
    let sink = FakeSink::default();
    let mut tracker = TimestampTracker::new();
    harness
        .poller(&source, &sink)
        .poll_once(&mut tracker, now)
        .await
        .unwrap();

    let requests = source.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].start, now - Duration::hours(1));
    assert_eq!(requests[0].end, now);
    assert_eq!(requests[0].time_unit, TimeUnit::QuarterOfAnHour);
    assert_eq!(requests[0].meters, vec![MeterType::Production]);
}

#[tokio::test(start_paused = true)]
async fn test_missing_production_meter_is_fatal() {
    let harness = Harness::new();
    let now = cycle_time();

    let consumption_only = EnergyDetails {
        meters: vec![MeterReadings {
            meter_type: MeterType::Consumption,
            samples: vec![Sample {
                timestamp: now - Duration::minutes(20),
                value: Some(1.0),
            }],
        }],
        ..EnergyDetails::default()
    };
    let source = FakeSource::replying(vec![Ok(consumption_only)]);
    let sink = FakeSink::default();
    let mut tracker = TimestampTracker::new();

    let result = harness
        .poller(&source, &sink)
        .poll_once(&mut tracker, now)
        .await;

    assert!(matches!(result, Err(CoreError::NoProductionMeter)));
    assert_eq!(source.calls(), 1);
    assert!(!harness.store.path().exists());
}

#[tokio::test(start_paused = true)]
async fn test_empty_production_meter_is_fatal() {
    let harness = Harness::new();
    let source = FakeSource::replying(vec![Ok(production(vec![]))]);
    let sink = FakeSink::default();
    let mut tracker = TimestampTracker::new();

    let result = harness
        .poller(&source, &sink)
        .poll_once(&mut tracker, cycle_time())
        .await;
    assert!(matches!(result, Err(CoreError::NoProductionMeter)));
}

#[tokio::test(start_paused = true)]
async fn test_prunes_day_old_entries_and_always_saves() {
    let harness = Harness::new();
    let now = cycle_time();
    let stale = now - Duration::hours(25);
    let fresh = now - Duration::hours(23);

    let source = FakeSource::replying(vec![Ok(production(vec![(
        now - Duration::minutes(5),
        Some(1.0),
    )]))]);
    let sink = FakeSink::default();
    let mut tracker: TimestampTracker = [stale.timestamp(), fresh.timestamp()]
        .into_iter()
        .collect();

    let report = completed(
        harness
            .poller(&source, &sink)
            .poll_once(&mut tracker, now)
            .await
            .unwrap(),
    );

    assert_eq!(report.recorded(), 0);
    assert_eq!(report.pruned, 1);
    let saved = harness.store.load().unwrap();
    assert!(!saved.has(&stale));
    assert!(saved.has(&fresh));
}

#[tokio::test(start_paused = true)]
async fn test_unwritable_tracker_is_fatal() {
    let dir = TempDir::new().unwrap();
    let store = TrackerStore::new(dir.path().join("missing").join("tracker.json"));
    let now = cycle_time();

    let source = FakeSource::replying(vec![Ok(production(vec![(
        now - Duration::minutes(20),
        Some(1.0),
    )]))]);
    let sink = FakeSink::default();
    let poller = Poller::new(&source, &sink, store, Los_Angeles);
    let mut tracker = TimestampTracker::new();

    let result = poller.poll_once(&mut tracker, now).await;
    assert!(matches!(result, Err(CoreError::Tracker(_))));
}

#[tokio::test(start_paused = true)]
async fn test_run_keeps_going_after_abandoned_cycle_and_halts_on_missing_meter() {
    let harness = Harness::new();

    let mut responses: Vec<Result<EnergyDetails, UpstreamError>> = (0..5)
        .map(|_| Err(UpstreamError::Decode("gateway timeout".to_string())))
        .collect();
    responses.push(Ok(EnergyDetails {
        meters: vec![MeterReadings {
            meter_type: MeterType::Consumption,
            samples: vec![],
        }],
        ..EnergyDetails::default()
    }));
    let source = FakeSource::replying(responses);
    let sink = FakeSink::default();

    let result = harness
        .poller(&source, &sink)
        .run(TimestampTracker::new())
        .await;

    assert!(matches!(result, Err(CoreError::NoProductionMeter)));
    assert_eq!(source.calls(), 6);
    assert!(sink.points().is_empty());
    assert!(!harness.store.path().exists());
}
