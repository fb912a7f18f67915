//! SolarEdge monitoring API -- site energy details.
//!
//! Request and response times are wall-clock times in the site's timezone,
//! formatted `YYYY-MM-DD hh:mm:ss`.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::config::SolarEdgeConfig;
use crate::energy::{EnergyDetails, EnergyRequest, MeterReadings, MeterType, Sample};
use crate::error::{ConfigError, CoreError, UpstreamError};
use crate::integrations::traits::EnergySource;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SolarEdgeClient {
    http: Client,
    /// `{api_url}/site/{site_id}/energyDetails`, without query.
    endpoint: Url,
    token: String,
    timezone: Tz,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EnergyDetailsResponse {
    energy_details: RawDetails,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDetails {
    #[serde(default)]
    time_unit: Option<String>,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    meters: Vec<RawMeter>,
}

#[derive(Deserialize)]
struct RawMeter {
    #[serde(rename = "type")]
    meter_type: String,
    #[serde(default)]
    values: Vec<RawValue>,
}

#[derive(Deserialize)]
struct RawValue {
    date: String,
    #[serde(default)]
    value: Option<f64>,
}

impl SolarEdgeClient {
    pub fn new(config: &SolarEdgeConfig, timezone: Tz) -> Result<Self, CoreError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: "SOLAREDGE_API_URL".to_string(),
            message,
        };

        let site = config.site_id.to_string();
        let mut endpoint = Url::parse(&config.api_url).map_err(|e| invalid(e.to_string()))?;
        endpoint
            .path_segments_mut()
            .map_err(|_| invalid(format!("{} cannot be used as a base URL", config.api_url)))?
            .pop_if_empty()
            .extend(["site", site.as_str(), "energyDetails"]);

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(CoreError::Client)?;

        Ok(Self {
            http,
            endpoint,
            token: config.token.clone(),
            timezone,
        })
    }

    /// Full request URL, API key included.
    ///
    /// Never put this URL in a log line or an error.
    fn request_url(&self, request: &EnergyRequest) -> Url {
        let mut url = self.endpoint.clone();
        let meters = request
            .meters
            .iter()
            .map(|m| m.as_api_str())
            .collect::<Vec<_>>()
            .join(",");

        url.query_pairs_mut()
            .append_pair("startTime", &self.format_time(&request.start))
            .append_pair("endTime", &self.format_time(&request.end))
            .append_pair("timeUnit", request.time_unit.as_api_str())
            .append_pair("meters", &meters)
            .append_pair("api_key", &self.token);
        url
    }

    fn format_time(&self, t: &DateTime<Tz>) -> String {
        t.with_timezone(&self.timezone).format(DATE_FORMAT).to_string()
    }

    fn convert(&self, raw: RawDetails) -> Result<EnergyDetails, UpstreamError> {
        let mut meters = Vec::with_capacity(raw.meters.len());
        for meter in raw.meters {
            let mut samples = Vec::with_capacity(meter.values.len());
            for value in meter.values {
                let naive = NaiveDateTime::parse_from_str(&value.date, DATE_FORMAT)
                    .map_err(|e| UpstreamError::Decode(format!("date {:?}: {e}", value.date)))?;
                match self.timezone.from_local_datetime(&naive).earliest() {
                    Some(timestamp) => samples.push(Sample {
                        timestamp,
                        value: value.value,
                    }),
                    None => log::warn!(
                        "dropping sample at {} which does not exist in {}",
                        value.date,
                        self.timezone
                    ),
                }
            }
            meters.push(MeterReadings {
                meter_type: MeterType::from_api(&meter.meter_type),
                samples,
            });
        }

        Ok(EnergyDetails {
            time_unit: raw.time_unit,
            unit: raw.unit,
            meters,
        })
    }
}

impl EnergySource for SolarEdgeClient {
    async fn energy_details(&self, request: &EnergyRequest) -> Result<EnergyDetails, UpstreamError> {
        // reqwest errors carry the request URL, which holds the API key
        let resp = self
            .http
            .get(self.request_url(request))
            .send()
            .await
            .map_err(|e| UpstreamError::Http(e.without_url()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| UpstreamError::Http(e.without_url()))?;
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EnergyDetailsResponse =
            serde_json::from_str(&body).map_err(|e| UpstreamError::Decode(e.to_string()))?;
        self.convert(parsed.energy_details)
    }
}
