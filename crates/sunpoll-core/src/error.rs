//! Core error types for sunpoll-core.
//!
//! Errors are split by how the poll loop reacts to them:
//! configuration and tracker errors are fatal, upstream errors are retried,
//! sink errors are logged and the sample is left for a later cycle.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for sunpoll-core.
///
/// Anything that reaches the caller as a `CoreError` ends the process.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Tracker persistence errors
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    /// The upstream response had no usable Production meter
    #[error("no extracted meter: upstream response has no Production samples")]
    NoProductionMeter,

    /// Failed to set up an HTTP client
    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Timezone name not found in the tz database
    #[error("Unknown timezone: {0}")]
    UnknownTimezone(String),

    /// Failed to read a configuration file
    #[error("Failed to load configuration from {path}: {source}")]
    LoadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a configuration file
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(#[from] toml::de::Error),
}

/// Tracker file errors. All of them are fatal.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// The tracker file exists but could not be read
    #[error("error reading file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tracker file is not a valid JSON object of Unix-second keys
    #[error("unmarshalling tracker {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The tracker could not be encoded as JSON
    #[error("marshaling tracker: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The tracker file could not be written
    #[error("writing tracker {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the energy API. Retryable.
#[derive(Error, Debug)]
pub enum UpstreamError {
    /// Transport-level failure
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Errors from the time-series sink. Logged, never fatal.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Transport-level failure
    #[error("write request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("write rejected (HTTP {status}): {body}")]
    Status { status: u16, body: String },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
