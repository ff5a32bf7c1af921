//! One-shot HTTP retrieval of the sensor's JSON snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{config::SensorConfig, discovery::SensorEndpoint};

/// A numeric reading that prints the way the sensor sent it.
///
/// Integers stay integral (`45`), floats use the shortest round-trip form
/// (`72.5`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reading(serde_json::Number);

impl Reading {
    pub fn as_f64(&self) -> f64 {
        self.0.as_f64().unwrap_or(f64::NAN)
    }
}

impl From<i64> for Reading {
    fn from(value: i64) -> Self {
        Self(value.into())
    }
}

impl TryFrom<f64> for Reading {
    type Error = f64;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        serde_json::Number::from_f64(value).map(Self).ok_or(value)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One decoded `/data` document. Every field is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    #[serde(rename = "hasalarms")]
    pub has_alarms: bool,
    #[serde(rename = "tempc")]
    pub temp_c: Reading,
    #[serde(rename = "temptrend")]
    pub temp_trend: Reading,
    pub humidity: Reading,
    #[serde(rename = "humiditytrend")]
    pub humidity_trend: Reading,
    pub darkness: Reading,
    #[serde(rename = "lightscale")]
    pub light_scale: Reading,
}

impl TelemetrySnapshot {
    pub fn from_json(body: &str) -> Result<Self, FetchError> {
        serde_json::from_str(body).map_err(FetchError::Decode)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("malformed sensor data: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Something that can produce a snapshot for an endpoint.
pub trait TelemetrySource {
    fn fetch(&mut self, endpoint: &SensorEndpoint) -> Result<TelemetrySnapshot, FetchError>;
}

/// Blocking HTTP client for the sensor's data service.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    port: u16,
    path: String,
}

impl HttpFetcher {
    pub fn new(settings: &SensorConfig) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.request_timeout)
            .no_proxy()
            .build()?;
        Ok(Self {
            client,
            port: settings.http_port,
            path: settings.data_path.clone(),
        })
    }

    pub fn url_for(&self, endpoint: &SensorEndpoint) -> String {
        endpoint.url(self.port, &self.path)
    }
}

impl TelemetrySource for HttpFetcher {
    fn fetch(&mut self, endpoint: &SensorEndpoint) -> Result<TelemetrySnapshot, FetchError> {
        let response = self.client.get(self.url_for(endpoint)).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.text()?;
        TelemetrySnapshot::from_json(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "hasalarms": false,
        "tempc": 72.5,
        "temptrend": 0.2,
        "humidity": 45,
        "humiditytrend": -1,
        "darkness": 500000,
        "lightscale": 10,
        "uptime": 1234
    }"#;

    #[test]
    fn decodes_snapshot_and_keeps_number_text() {
        let snap = TelemetrySnapshot::from_json(SAMPLE).unwrap();
        assert!(!snap.has_alarms);
        assert_eq!(snap.temp_c.to_string(), "72.5");
        assert_eq!(snap.temp_trend.to_string(), "0.2");
        assert_eq!(snap.humidity.to_string(), "45");
        assert_eq!(snap.humidity_trend.to_string(), "-1");
        assert_eq!(snap.darkness.as_f64(), 500000.0);
        assert_eq!(snap.light_scale.to_string(), "10");
    }

    #[test]
    fn missing_field_discards_snapshot() {
        let err = TelemetrySnapshot::from_json(r#"{"hasalarms": true, "tempc": 20}"#).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn wrong_kind_discards_snapshot() {
        let body = SAMPLE.replace("\"humidity\": 45", "\"humidity\": \"45\"");
        assert!(matches!(
            TelemetrySnapshot::from_json(&body),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        assert!(matches!(
            TelemetrySnapshot::from_json("<html>oops</html>"),
            Err(FetchError::Decode(_))
        ));
    }

    #[test]
    fn readings_convert_from_primitives() {
        assert_eq!(Reading::from(45_i64).to_string(), "45");
        assert_eq!(Reading::try_from(72.5_f64).unwrap().to_string(), "72.5");
        assert!(Reading::try_from(f64::NAN).is_err());
    }

    #[test]
    fn fetcher_builds_url_from_settings() {
        let settings = SensorConfig {
            http_port: 8080,
            ..SensorConfig::default()
        };
        let fetcher = HttpFetcher::new(&settings).unwrap();
        let endpoint = SensorEndpoint::new("10.0.0.7".parse().unwrap());
        assert_eq!(fetcher.url_for(&endpoint), "http://10.0.0.7:8080/data");
    }
}
