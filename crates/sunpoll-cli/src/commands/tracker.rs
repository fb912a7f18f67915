use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use clap::Args;
use sunpoll_core::config::load_timezone;
use sunpoll_core::{Config, TrackerStore};

#[derive(Args)]
pub struct TrackerArgs {
    /// Tracker file to read instead of the configured one
    #[arg(long)]
    file: Option<PathBuf>,
    /// Print the raw JSON snapshot
    #[arg(long)]
    json: bool,
}

pub fn run(config_path: Option<&Path>, args: TrackerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (path, timezone) = match args.file {
        Some(file) => (file, load_timezone(config_path)?),
        None => {
            let config = Config::load(config_path)?;
            (config.tracker_file, config.timezone)
        }
    };

    let tracker = TrackerStore::new(path).load()?;
    if args.json {
        println!("{}", serde_json::to_string(&tracker)?);
        return Ok(());
    }

    for ts in tracker.iter() {
        match Utc.timestamp_opt(*ts, 0).single() {
            Some(t) => println!("{ts}  {}", t.with_timezone(&timezone).to_rfc3339()),
            None => println!("{ts}"),
        }
    }
    println!("{} tracked", tracker.len());
    Ok(())
}
