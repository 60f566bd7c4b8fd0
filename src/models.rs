use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Named measurement fields of a single reading
pub type Measurement = BTreeMap<String, f64>;

#[derive(Debug, Clone, Copy)]
pub struct RawByteEvent {
    pub byte: u8,
    pub received_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorType {
    Plain,
    Airflow,
    Occupancy,
}

impl SensorType {
    /// Unrecognised type names fall back to the plain temperature/humidity sensor
    pub fn from_name(name: &str) -> Self {
        match name {
            "LoRaTHA" => SensorType::Airflow,
            "LoRaTHO" => SensorType::Occupancy,
            _ => SensorType::Plain,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Plain => "LoRaTH",
            SensorType::Airflow => "LoRaTHA",
            SensorType::Occupancy => "LoRaTHO",
        }
    }

    /// Units advertised to the directory for each measurement field
    pub fn units(&self) -> BTreeMap<&'static str, &'static str> {
        let mut unit = BTreeMap::new();
        unit.insert("temperature", "degC");
        unit.insert("humidity", "%RH");
        match self {
            SensorType::Airflow => {
                unit.insert("airflow", "m/s");
            }
            SensorType::Occupancy => {
                unit.insert("occupancy", "/min");
            }
            SensorType::Plain => {}
        }
        unit
    }
}

impl Serialize for SensorType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SensorType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(SensorType::from_name(&name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    #[serde(skip)]
    pub sensor_id: String,
    pub timestamp: i64,
    #[serde(rename = "value")]
    pub measurement: Measurement,
}

/// Sensor entry as kept in the config store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSensor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub sensor_type: SensorType,
    #[serde(rename = "report-interval")]
    pub report_interval: u64,
}

/// Sensor configuration as reported by the remote directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSensorInfo {
    #[serde(rename = "sensor-id")]
    pub id: String,
    #[serde(rename = "sensor-name")]
    pub name: String,
    #[serde(rename = "sensor-type")]
    pub sensor_type: SensorType,
    #[serde(rename = "report-interval")]
    pub report_interval: u64,
}

/// Config update piggybacked on a data push response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigUpdate {
    #[serde(rename = "sensor-name")]
    pub name: Option<String>,
    #[serde(rename = "report-interval")]
    pub report_interval: Option<u64>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.report_interval.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_type_names_round_trip_and_default_to_plain() {
        let stored: StoredSensor = serde_json::from_str(
            r#"{"id": "ABC", "name": "Kitchen", "type": "LoRaTHO", "report-interval": 120}"#,
        )
        .unwrap();
        assert_eq!(stored.sensor_type, SensorType::Occupancy);
        assert_eq!(stored.report_interval, 120);

        let unknown: SensorType = serde_json::from_str(r#""LoRaXYZ""#).unwrap();
        assert_eq!(unknown, SensorType::Plain);

        let json = serde_json::to_value(SensorType::Airflow).unwrap();
        assert_eq!(json, serde_json::json!("LoRaTHA"));
    }

    #[test]
    fn units_follow_sensor_type() {
        assert!(!SensorType::Plain.units().contains_key("airflow"));
        assert_eq!(SensorType::Airflow.units().get("airflow"), Some(&"m/s"));
        assert_eq!(SensorType::Occupancy.units().get("occupancy"), Some(&"/min"));
        assert_eq!(SensorType::Occupancy.units().get("temperature"), Some(&"degC"));
    }

    #[test]
    fn reading_serializes_as_record() {
        let mut measurement = Measurement::new();
        measurement.insert("battery".to_string(), 3000.0);
        let reading = Reading {
            sensor_id: "ABC".to_string(),
            timestamp: 1_700_000_000,
            measurement,
        };
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"timestamp": 1_700_000_000i64, "value": {"battery": 3000.0}})
        );
    }

    #[test]
    fn config_update_tolerates_missing_fields() {
        let update: ConfigUpdate = serde_json::from_str(r#"{"sensor-name": "Attic"}"#).unwrap();
        assert_eq!(update.name.as_deref(), Some("Attic"));
        assert_eq!(update.report_interval, None);
        assert!(!update.is_empty());
        assert!(ConfigUpdate::default().is_empty());
    }
}
