//! InfluxDB point writer.
//!
//! Uses the `/api/v2/write` endpoint in its 1.x-compatible form: the bucket
//! is `database/retention_policy`, the organization is left empty and the
//! token is `user:password`.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use url::Url;

use crate::config::InfluxConfig;
use crate::error::{ConfigError, CoreError, SinkError};
use crate::integrations::traits::PointSink;
use crate::point::Point;

const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct InfluxSink {
    http: Client,
    write_url: Url,
    auth: String,
}

impl InfluxSink {
    pub fn new(config: &InfluxConfig) -> Result<Self, CoreError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: "INFLUX_URL".to_string(),
            message,
        };

        let mut write_url = Url::parse(&config.url).map_err(|e| invalid(e.to_string()))?;
        write_url
            .path_segments_mut()
            .map_err(|_| invalid(format!("{} cannot be used as a base URL", config.url)))?
            .pop_if_empty()
            .extend(["api", "v2", "write"]);
        write_url
            .query_pairs_mut()
            .append_pair("org", "")
            .append_pair(
                "bucket",
                &format!("{}/{}", config.database, config.retention_policy),
            )
            .append_pair("precision", "ns");

        let http = Client::builder()
            .timeout(WRITE_TIMEOUT)
            .build()
            .map_err(CoreError::Client)?;

        Ok(Self {
            http,
            write_url,
            auth: format!("Token {}:{}", config.user, config.password),
        })
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }
}

impl PointSink for InfluxSink {
    async fn write_point(&self, point: &Point) -> Result<(), SinkError> {
        let resp = self
            .http
            .post(self.write_url.clone())
            .header(AUTHORIZATION, &self.auth)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(point.to_line_protocol())
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(SinkError::Status {
            status: status.as_u16(),
            body,
        })
    }
}
