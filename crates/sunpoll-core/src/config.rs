//! Runtime configuration.
//!
//! Settings come from environment variables, optionally layered over a TOML
//! file. Environment variables win. Required settings:
//!
//! - `TRACKER_FILE`
//! - `SOLAREDGE_AUTH_TOKEN`, `SOLAREDGE_SITEID`
//! - `INFLUX_USER`, `INFLUX_PASS`, `INFLUX_URL`
//!
//! Optional: `SUNPOLL_TIMEZONE`, `SOLAREDGE_API_URL`, `INFLUX_DATABASE`,
//! `INFLUX_RETENTION_POLICY`.

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_TIMEZONE: &str = "America/Los_Angeles";
pub const DEFAULT_SOLAREDGE_API_URL: &str = "https://monitoringapi.solaredge.com";
pub const DEFAULT_INFLUX_DATABASE: &str = "solar";
pub const DEFAULT_INFLUX_RETENTION_POLICY: &str = "autogen";

/// SolarEdge monitoring API settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SolarEdgeConfig {
    pub api_url: String,
    pub token: String,
    pub site_id: i64,
}

/// InfluxDB write settings.
#[derive(Debug, Clone, PartialEq)]
pub struct InfluxConfig {
    pub url: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub retention_policy: String,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub tracker_file: PathBuf,
    pub solaredge: SolarEdgeConfig,
    pub influx: InfluxConfig,
    /// Reference timezone for the schedule and for SolarEdge wall-clock times.
    pub timezone: Tz,
}

/// Optional settings as read from a TOML file.
///
/// ```toml
/// tracker_file = "/var/lib/sunpoll/tracker.json"
/// timezone = "America/Los_Angeles"
///
/// [solaredge]
/// token = "..."
/// site_id = 12345
///
/// [influx]
/// url = "http://localhost:8086"
/// user = "solar"
/// password = "..."
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub tracker_file: Option<PathBuf>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub solaredge: SolarEdgeFile,
    #[serde(default)]
    pub influx: InfluxFile,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolarEdgeFile {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub site_id: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfluxFile {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub retention_policy: Option<String>,
}

impl ConfigFile {
    /// Read and parse a TOML config file.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }
}

impl Config {
    /// Resolve configuration from the process environment, layered over the
    /// TOML file at `path` when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) => ConfigFile::read(p)?,
            None => ConfigFile::default(),
        };
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from `file` and a variable lookup.
    ///
    /// Empty variables count as unset.
    pub fn resolve<F>(file: ConfigFile, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let required = |key: &str, fallback: Option<String>| {
            var(key)
                .or(fallback)
                .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
        };

        let tracker_file = var("TRACKER_FILE")
            .map(PathBuf::from)
            .or(file.tracker_file)
            .ok_or_else(|| ConfigError::MissingKey("TRACKER_FILE".to_string()))?;

        let token = required("SOLAREDGE_AUTH_TOKEN", file.solaredge.token)?;
        let site_id = match var("SOLAREDGE_SITEID") {
            Some(raw) => parse_site_id(&raw)?,
            None => file
                .solaredge
                .site_id
                .ok_or_else(|| ConfigError::MissingKey("SOLAREDGE_SITEID".to_string()))?,
        };
        let api_url = var("SOLAREDGE_API_URL")
            .or(file.solaredge.api_url)
            .unwrap_or_else(|| DEFAULT_SOLAREDGE_API_URL.to_string());

        let influx = InfluxConfig {
            user: required("INFLUX_USER", file.influx.user)?,
            password: required("INFLUX_PASS", file.influx.password)?,
            url: required("INFLUX_URL", file.influx.url)?,
            database: var("INFLUX_DATABASE")
                .or(file.influx.database)
                .unwrap_or_else(|| DEFAULT_INFLUX_DATABASE.to_string()),
            retention_policy: var("INFLUX_RETENTION_POLICY")
                .or(file.influx.retention_policy)
                .unwrap_or_else(|| DEFAULT_INFLUX_RETENTION_POLICY.to_string()),
        };

        let timezone = resolve_timezone(file.timezone, &lookup)?;

        Ok(Self {
            tracker_file,
            solaredge: SolarEdgeConfig {
                api_url,
                token,
                site_id,
            },
            influx,
            timezone,
        })
    }
}

/// Reference timezone alone, for commands that need no credentials.
///
/// Same precedence as [`Config::load`]: `SUNPOLL_TIMEZONE`, then the file's
/// `timezone`, then [`DEFAULT_TIMEZONE`].
pub fn load_timezone(path: Option<&Path>) -> Result<Tz, ConfigError> {
    let file = match path {
        Some(p) => ConfigFile::read(p)?,
        None => ConfigFile::default(),
    };
    resolve_timezone(file.timezone, |key| std::env::var(key).ok())
}

fn resolve_timezone<F>(file_tz: Option<String>, lookup: F) -> Result<Tz, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let name = lookup("SUNPOLL_TIMEZONE")
        .filter(|v| !v.is_empty())
        .or(file_tz)
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    name.parse::<Tz>()
        .map_err(|_| ConfigError::UnknownTimezone(name.clone()))
}

fn parse_site_id(raw: &str) -> Result<i64, ConfigError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|e| ConfigError::InvalidValue {
            key: "SOLAREDGE_SITEID".to_string(),
            message: e.to_string(),
        })
}
