//! Time-series points and their InfluxDB line-protocol encoding.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

/// A single measurement written to the time-series sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, f64>,
    pub time: DateTime<Utc>,
}

impl Point {
    pub fn new(measurement: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            time,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: f64) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Encode as one line of line protocol, nanosecond precision.
    ///
    /// Tags are emitted in key order. Non-finite field values are dropped
    /// since InfluxDB cannot store them. Times outside the nanosecond range
    /// (before 1677 or after 2262) are left off so the server stamps the
    /// point on arrival.
    pub fn to_line_protocol(&self) -> String {
        let mut line = escape(&self.measurement, &[',', ' ']);
        for (key, value) in &self.tags {
            let _ = write!(
                line,
                ",{}={}",
                escape(key, &[',', '=', ' ']),
                escape(value, &[',', '=', ' '])
            );
        }

        let fields: Vec<String> = self
            .fields
            .iter()
            .filter(|(_, v)| v.is_finite())
            .map(|(k, v)| format!("{}={}", escape(k, &[',', '=', ' ']), v))
            .collect();
        line.push(' ');
        line.push_str(&fields.join(","));

        if let Some(nanos) = self.time.timestamp_nanos_opt() {
            let _ = write!(line, " {nanos}");
        }
        line
    }
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '\\' || special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_energy_detail_line() {
        let time = Utc.timestamp_opt(1_718_000_100, 0).unwrap();
        let point = Point::new("energyDetail", time)
            .with_tag("unit", "energy")
            .with_field("generated", 5.0);
        assert_eq!(
            point.to_line_protocol(),
            "energyDetail,unit=energy generated=5 1718000100000000000"
        );
    }

    #[test]
    fn test_fractional_value_and_tag_order() {
        let time = Utc.timestamp_opt(10, 500).unwrap();
        let point = Point::new("m", time)
            .with_tag("z", "1")
            .with_tag("a", "2")
            .with_field("v", 1234.5);
        assert_eq!(point.to_line_protocol(), "m,a=2,z=1 v=1234.5 10000000500");
    }

    #[test]
    fn test_escaping() {
        let time = Utc.timestamp_opt(0, 0).unwrap();
        let point = Point::new("solar energy,x", time)
            .with_tag("site name", "roof=south")
            .with_field("kw h", 1.0);
        assert_eq!(
            point.to_line_protocol(),
            r"solar\ energy\,x,site\ name=roof\=south kw\ h=1 0"
        );
    }

    #[test]
    fn test_non_finite_fields_are_dropped() {
        let time = Utc.timestamp_opt(0, 0).unwrap();
        let point = Point::new("m", time)
            .with_field("a", f64::NAN)
            .with_field("b", 2.0);
        assert_eq!(point.to_line_protocol(), "m b=2 0");
    }
}
