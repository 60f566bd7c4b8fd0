/// HTTP client for the remote sensor directory and collector
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::time::Duration;
use url::Url;

use super::RemoteService;
use crate::error::RemoteError;
use crate::models::{ConfigUpdate, Reading, RemoteSensorInfo, SensorType, StoredSensor};

/// Registration / info update body
#[derive(Serialize)]
struct SensorInfoBody<'a> {
    #[serde(rename = "sensor-id", skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(rename = "sensor-name")]
    name: &'a str,
    #[serde(rename = "sensor-type")]
    sensor_type: SensorType,
    #[serde(rename = "report-interval")]
    report_interval: u64,
    unit: BTreeMap<&'static str, &'static str>,
    key: &'a str,
}

#[derive(Serialize)]
struct DataBody<'a> {
    key: &'a str,
    records: &'a [Reading],
}

pub struct HttpRemote {
    client: Client,
    endpoint: String,
    key: String,
}

impl HttpRemote {
    pub fn new(endpoint: &Url, key: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.as_str().trim_end_matches('/').to_string(),
            key: key.to_string(),
        })
    }

    fn info_url(&self, sensor_id: &str) -> String {
        format!("{}/{}/info", self.endpoint, sensor_id)
    }

    fn data_url(&self, sensor_id: &str) -> String {
        format!("{}/{}/data", self.endpoint, sensor_id)
    }

    fn info_body<'a>(&'a self, sensor: &'a StoredSensor, with_id: bool) -> SensorInfoBody<'a> {
        SensorInfoBody {
            id: with_id.then_some(sensor.id.as_str()),
            name: &sensor.name,
            sensor_type: sensor.sensor_type,
            report_interval: sensor.report_interval,
            unit: sensor.sensor_type.units(),
            key: &self.key,
        }
    }
}

/// Interpret a push response body as an optional config update
fn parse_config_update(body: &str) -> Option<ConfigUpdate> {
    if body.trim().is_empty() {
        return None;
    }
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            warn!("Ignoring unparseable push response: {}", e);
            return None;
        }
    };
    if !value.is_object() {
        return None;
    }
    match serde_json::from_value::<ConfigUpdate>(value) {
        Ok(update) if !update.is_empty() => Some(update),
        Ok(_) => None,
        Err(e) => {
            warn!("Ignoring malformed config update: {}", e);
            None
        }
    }
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn fetch_info(&self, sensor_id: &str) -> Result<Option<RemoteSensorInfo>, RemoteError> {
        let response = self
            .client
            .get(self.info_url(sensor_id))
            .query(&[("key", self.key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        Ok(Some(serde_json::from_str(&body)?))
    }

    async fn register(&self, sensor: &StoredSensor) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.info_body(sensor, true))
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED => Ok(()),
            status => Err(RemoteError::RegistrationRejected(status.as_u16())),
        }
    }

    async fn update_info(&self, sensor: &StoredSensor) -> Result<(), RemoteError> {
        let response = self
            .client
            .put(self.info_url(&sensor.id))
            .json(&self.info_body(sensor, false))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }
        Ok(())
    }

    async fn push_records(
        &self,
        sensor_id: &str,
        records: &[Reading],
    ) -> Result<Option<ConfigUpdate>, RemoteError> {
        let body = DataBody {
            key: &self.key,
            records,
        };
        let response = self
            .client
            .post(self.data_url(sensor_id))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status(status.as_u16()));
        }
        let text = response.text().await?;
        debug!("Pushed {} records for {}", records.len(), sensor_id);
        Ok(parse_config_update(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Measurement;

    fn remote() -> HttpRemote {
        let endpoint = Url::parse("https://collector.example.org/sensors/").unwrap();
        HttpRemote::new(&endpoint, "secret", Duration::from_secs(5)).unwrap()
    }

    fn sensor() -> StoredSensor {
        StoredSensor {
            id: "ABCDEF".to_string(),
            name: "Duct 1".to_string(),
            sensor_type: SensorType::Airflow,
            report_interval: 120,
        }
    }

    #[test]
    fn builds_per_sensor_paths() {
        let remote = remote();
        assert_eq!(
            remote.info_url("ABCDEF"),
            "https://collector.example.org/sensors/ABCDEF/info"
        );
        assert_eq!(
            remote.data_url("ABCDEF"),
            "https://collector.example.org/sensors/ABCDEF/data"
        );
    }

    #[test]
    fn registration_body_shape() {
        let remote = remote();
        let sensor = sensor();
        let json = serde_json::to_value(remote.info_body(&sensor, true)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "sensor-id": "ABCDEF",
                "sensor-name": "Duct 1",
                "sensor-type": "LoRaTHA",
                "report-interval": 120,
                "unit": {"temperature": "degC", "humidity": "%RH", "airflow": "m/s"},
                "key": "secret"
            })
        );

        let update = serde_json::to_value(remote.info_body(&sensor, false)).unwrap();
        assert!(update.get("sensor-id").is_none());
    }

    #[test]
    fn data_body_shape() {
        let mut measurement = Measurement::new();
        measurement.insert("humidity".to_string(), 40.0);
        let records = vec![Reading {
            sensor_id: "ABCDEF".to_string(),
            timestamp: 1_700_000_000,
            measurement,
        }];
        let json = serde_json::to_value(DataBody {
            key: "secret",
            records: &records,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "key": "secret",
                "records": [{"timestamp": 1_700_000_000i64, "value": {"humidity": 40.0}}]
            })
        );
    }

    #[test]
    fn push_response_parsing() {
        assert_eq!(parse_config_update(""), None);
        assert_eq!(parse_config_update("ok"), None);
        assert_eq!(parse_config_update("[1, 2]"), None);
        assert_eq!(parse_config_update("{}"), None);
        assert_eq!(parse_config_update(r#"{"report-interval": "soon"}"#), None);
        assert_eq!(
            parse_config_update(r#"{"sensor-name": "Duct 2", "report-interval": 300}"#),
            Some(ConfigUpdate {
                name: Some("Duct 2".to_string()),
                report_interval: Some(300),
            })
        );
    }
}
