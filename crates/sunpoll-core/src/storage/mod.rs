pub mod tracker;

pub use tracker::{TimestampTracker, TrackerStore};
