//! Energy readings as reported by the monitoring API.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;

/// Width of one reporting bucket.
pub fn bucket_width() -> Duration {
    Duration::minutes(15)
}

/// Aggregation interval for an energy request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    QuarterOfAnHour,
    Hour,
    Day,
}

impl TimeUnit {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            TimeUnit::QuarterOfAnHour => "QUARTER_OF_AN_HOUR",
            TimeUnit::Hour => "HOUR",
            TimeUnit::Day => "DAY",
        }
    }
}

/// Kind of meter a series of readings belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MeterType {
    Production,
    Consumption,
    SelfConsumption,
    FeedIn,
    Purchased,
    /// Anything the API adds later.
    Other(String),
}

impl MeterType {
    /// Value used in the `meters` request parameter.
    pub fn as_api_str(&self) -> &str {
        match self {
            MeterType::Production => "PRODUCTION",
            MeterType::Consumption => "CONSUMPTION",
            MeterType::SelfConsumption => "SELFCONSUMPTION",
            MeterType::FeedIn => "FEEDIN",
            MeterType::Purchased => "PURCHASED",
            MeterType::Other(name) => name,
        }
    }

    /// Parse the `type` field of a response meter (case-insensitive).
    pub fn from_api(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "production" => MeterType::Production,
            "consumption" => MeterType::Consumption,
            "selfconsumption" => MeterType::SelfConsumption,
            "feedin" => MeterType::FeedIn,
            "purchased" => MeterType::Purchased,
            _ => MeterType::Other(name.to_string()),
        }
    }
}

/// One bucket. `value` is absent until the API has data for the bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Tz>,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeterReadings {
    pub meter_type: MeterType,
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnergyDetails {
    pub time_unit: Option<String>,
    pub unit: Option<String>,
    pub meters: Vec<MeterReadings>,
}

impl EnergyDetails {
    /// First meter of the given type, if any.
    pub fn meter(&self, meter_type: &MeterType) -> Option<&MeterReadings> {
        self.meters.iter().find(|m| &m.meter_type == meter_type)
    }
}

/// Parameters for an energy-details request.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyRequest {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub time_unit: TimeUnit,
    pub meters: Vec<MeterType>,
}

impl EnergyRequest {
    /// Quarter-hour Production readings for `[start, end]`.
    pub fn production(start: DateTime<Tz>, end: DateTime<Tz>) -> Self {
        Self {
            start,
            end,
            time_unit: TimeUnit::QuarterOfAnHour,
            meters: vec![MeterType::Production],
        }
    }
}
