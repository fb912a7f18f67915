//! Dedup set of sample timestamps already written downstream.
//!
//! On disk the tracker is a JSON object keyed by decimal Unix seconds:
//!
//! ```json
//! {"1718000100":{},"1718001000":{}}
//! ```
//!
//! Values are written as `{}` and ignored when reading.

use std::collections::btree_set;
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use serde::de::IgnoredAny;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TrackerError;

/// Set of Unix timestamps (seconds) that have been recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimestampTracker {
    seen: BTreeSet<i64>,
}

#[derive(Serialize)]
struct Marker {}

impl TimestampTracker {
    /// An empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the second-resolution timestamp of `ts` is tracked.
    pub fn has<Tz: TimeZone>(&self, ts: &DateTime<Tz>) -> bool {
        self.seen.contains(&ts.timestamp())
    }

    /// Track the second-resolution timestamp of `ts`. Idempotent.
    pub fn add<Tz: TimeZone>(&mut self, ts: &DateTime<Tz>) {
        self.seen.insert(ts.timestamp());
    }

    /// Remove every timestamp strictly older than `cutoff`.
    ///
    /// Returns how many entries were dropped.
    pub fn prune_older<Tz: TimeZone>(&mut self, cutoff: &DateTime<Tz>) -> usize {
        let before = self.seen.len();
        self.seen = self.seen.split_off(&cutoff.timestamp());
        before - self.seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Tracked Unix seconds in ascending order.
    pub fn iter(&self) -> btree_set::Iter<'_, i64> {
        self.seen.iter()
    }
}

impl FromIterator<i64> for TimestampTracker {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        Self {
            seen: iter.into_iter().collect(),
        }
    }
}

impl Serialize for TimestampTracker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.seen.len()))?;
        for ts in &self.seen {
            map.serialize_entry(&ts.to_string(), &Marker {})?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TimestampTracker {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<i64, IgnoredAny>::deserialize(deserializer)?;
        Ok(Self {
            seen: raw.into_keys().collect(),
        })
    }
}

/// File-backed persistence for a [`TimestampTracker`].
#[derive(Debug, Clone)]
pub struct TrackerStore {
    path: PathBuf,
}

impl TrackerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the tracker snapshot.
    ///
    /// A missing file yields an empty tracker. Any other read failure or a
    /// malformed file is an error.
    pub fn load(&self) -> Result<TimestampTracker, TrackerError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("no tracker at {}, starting empty", self.path.display());
                return Ok(TimestampTracker::new());
            }
            Err(source) => {
                return Err(TrackerError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let tracker: TimestampTracker =
            serde_json::from_slice(&bytes).map_err(|source| TrackerError::Parse {
                path: self.path.clone(),
                source,
            })?;
        log::info!(
            "loaded {} tracked timestamps from {}",
            tracker.len(),
            self.path.display()
        );
        Ok(tracker)
    }

    /// Overwrite the backing file with the current snapshot.
    pub fn save(&self, tracker: &TimestampTracker) -> Result<(), TrackerError> {
        let bytes = serde_json::to_vec(tracker).map_err(TrackerError::Serialize)?;
        std::fs::write(&self.path, bytes).map_err(|source| TrackerError::Write {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
