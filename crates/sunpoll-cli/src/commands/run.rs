use std::path::Path;

use serde_json::json;
use sunpoll_core::{Config, CycleOutcome, CycleReport};

use super::{build_poller, runtime};

/// Load state and poll forever.
pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(config_path)?;
    let poller = build_poller(&config)?;
    let tracker = poller.store().load()?;

    match runtime()?.block_on(poller.run(tracker)) {
        Ok(never) => match never {},
        Err(e) => Err(e.into()),
    }
}

/// One poll cycle, right now.
pub fn once(config_path: Option<&Path>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(config_path)?;
    let poller = build_poller(&config)?;
    let mut tracker = poller.store().load()?;

    let outcome = runtime()?.block_on(poller.poll_once(&mut tracker, poller.now()))?;
    match outcome {
        CycleOutcome::Completed(report) if json => {
            println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
        }
        CycleOutcome::Completed(report) => print_report(&report),
        CycleOutcome::Abandoned {
            attempts,
            last_error,
        } => {
            println!("cycle abandoned after {attempts} attempts: {last_error}");
        }
    }
    Ok(())
}

fn print_report(report: &CycleReport) {
    println!("cycle at {}", report.now.to_rfc3339());
    for sample in &report.samples {
        let mark = if sample.recorded { "recorded" } else { "-" };
        println!(
            "  {}  {:>12.3}  {mark}",
            sample.timestamp.to_rfc3339(),
            sample.value
        );
    }
    println!(
        "{} recorded, {} pending, {} write failures, {} pruned",
        report.recorded(),
        report.pending,
        report.write_failures,
        report.pruned
    );
}

fn report_json(report: &CycleReport) -> serde_json::Value {
    json!({
        "now": report.now.to_rfc3339(),
        "samples": report.samples.iter().map(|s| json!({
            "timestamp": s.timestamp.to_rfc3339(),
            "value": s.value,
            "recorded": s.recorded,
        })).collect::<Vec<_>>(),
        "pending": report.pending,
        "write_failures": report.write_failures,
        "pruned": report.pruned,
    })
}
