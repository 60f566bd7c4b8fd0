/// Sensor records and the per-type decoding of frame payloads
pub mod airflow;
pub mod registry;

use log::debug;

use crate::frame::Payload;
use crate::models::{ConfigUpdate, Measurement, Reading, RemoteSensorInfo, SensorType, StoredSensor};

pub use registry::SensorRegistry;

/// Readings arriving sooner than this fraction of the report interval are not queued
const DEBOUNCE_FACTOR: f64 = 0.8;

pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 60;
const PLACEHOLDER_PREFIX: &str = "Unkn-";
const PLACEHOLDER_ID_CHARS: usize = 5;

/// Type-specific decoding state
#[derive(Debug, Clone, PartialEq)]
pub enum SensorKind {
    Plain,
    /// Auxiliary channel is the anemometer pulse frequency
    Airflow,
    /// Auxiliary channel goes negative on a motion event; events are counted
    /// until the next queued reading
    Occupancy { motion_events: u32 },
}

impl SensorKind {
    pub fn new(sensor_type: SensorType) -> Self {
        match sensor_type {
            SensorType::Plain => SensorKind::Plain,
            SensorType::Airflow => SensorKind::Airflow,
            SensorType::Occupancy => SensorKind::Occupancy { motion_events: 0 },
        }
    }

    pub fn sensor_type(&self) -> SensorType {
        match self {
            SensorKind::Plain => SensorType::Plain,
            SensorKind::Airflow => SensorType::Airflow,
            SensorKind::Occupancy { .. } => SensorType::Occupancy,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SensorRecord {
    pub id: String,
    pub name: String,
    pub kind: SensorKind,
    pub report_interval: u64,
    pub reading_display: String,
    pub last_reading_timestamp: i64,
    pub last_push_timestamp: i64,
    pub pushed_count: u64,
}

impl SensorRecord {
    pub fn new(id: &str, name: &str, sensor_type: SensorType, report_interval: u64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            kind: SensorKind::new(sensor_type),
            report_interval,
            reading_display: "-".to_string(),
            last_reading_timestamp: 0,
            last_push_timestamp: 0,
            pushed_count: 0,
        }
    }

    /// Default record for an identifier nobody has configured yet
    pub fn placeholder(id: &str) -> Self {
        let short: String = id.chars().take(PLACEHOLDER_ID_CHARS).collect();
        Self::new(
            id,
            &format!("{}{}", PLACEHOLDER_PREFIX, short),
            SensorType::Plain,
            DEFAULT_REPORT_INTERVAL_SECS,
        )
    }

    pub fn from_stored(stored: &StoredSensor) -> Self {
        Self::new(
            &stored.id,
            &stored.name,
            stored.sensor_type,
            stored.report_interval,
        )
    }

    pub fn from_remote(info: &RemoteSensorInfo) -> Self {
        Self::new(&info.id, &info.name, info.sensor_type, info.report_interval)
    }

    pub fn to_stored(&self) -> StoredSensor {
        StoredSensor {
            id: self.id.clone(),
            name: self.name.clone(),
            sensor_type: self.sensor_type(),
            report_interval: self.report_interval,
        }
    }

    pub fn sensor_type(&self) -> SensorType {
        self.kind.sensor_type()
    }

    /// Nothing has been queued for this sensor yet, so its identity may still
    /// need confirming with the directory
    pub fn is_provisional(&self) -> bool {
        self.pushed_count == 0
    }

    /// Decode one payload
    ///
    /// The display state and last reading time are always updated. A reading is
    /// only returned when the debounce gate passes, in which case the push
    /// bookkeeping advances and any occupancy count is reset.
    pub fn receive(&mut self, timestamp: i64, payload: &Payload) -> Option<Reading> {
        let temperature = payload.temperature as f64;
        let humidity = payload.humidity as f64;
        let volts = payload.battery_mv as f64 / 1000.0;

        let mut measurement = Measurement::new();
        measurement.insert("temperature".to_string(), temperature);
        measurement.insert("humidity".to_string(), humidity);

        match &mut self.kind {
            SensorKind::Plain => {
                self.reading_display =
                    format!("{:.2}°C {:.1}%RH {:.3}V", temperature, humidity, volts);
            }
            SensorKind::Airflow => {
                let velocity = airflow::frequency_to_velocity(payload.auxiliary as f64);
                measurement.insert("airflow".to_string(), velocity);
                self.reading_display = format!(
                    "{:.2}°C {:.1}%RH {:.2}m/s {:.3}V",
                    temperature, humidity, velocity, volts
                );
            }
            SensorKind::Occupancy { motion_events } => {
                if payload.auxiliary < 0.0 {
                    *motion_events += 1;
                }
                measurement.insert("occupancy".to_string(), *motion_events as f64);
                self.reading_display = format!(
                    "{:.2}°C {:.1}%RH {} times {:.3}V",
                    temperature, humidity, motion_events, volts
                );
            }
        }
        measurement.insert("battery".to_string(), payload.battery_mv as f64);
        self.last_reading_timestamp = timestamp;

        let earliest =
            self.last_push_timestamp as f64 + self.report_interval as f64 * DEBOUNCE_FACTOR;
        if (timestamp as f64) < earliest {
            debug!(
                "Debounced reading from {} ({}s since last push)",
                self.id,
                timestamp - self.last_push_timestamp
            );
            return None;
        }

        if let SensorKind::Occupancy { motion_events } = &mut self.kind {
            *motion_events = 0;
        }
        self.pushed_count += 1;
        self.last_push_timestamp = timestamp;

        Some(Reading {
            sensor_id: self.id.clone(),
            timestamp,
            measurement,
        })
    }

    /// Apply a config update returned by the collector; returns whether anything changed
    pub fn apply_update(&mut self, update: &ConfigUpdate) -> bool {
        let mut changed = false;
        if let Some(name) = &update.name {
            if *name != self.name {
                self.name = name.clone();
                changed = true;
            }
        }
        if let Some(interval) = update.report_interval {
            if interval != self.report_interval {
                self.report_interval = interval;
                changed = true;
            }
        }
        changed
    }

    /// Take the directory's canonical name, type and interval
    pub fn apply_remote_info(&mut self, info: &RemoteSensorInfo) {
        self.name = info.name.clone();
        self.report_interval = info.report_interval;
        if info.sensor_type != self.sensor_type() {
            self.kind = SensorKind::new(info.sensor_type);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn payload(auxiliary: f32) -> Payload {
        Payload {
            temperature: 21.5,
            humidity: 40.0,
            auxiliary,
            battery_mv: 3000,
        }
    }

    #[test]
    fn plain_reading_fields() {
        let mut sensor = SensorRecord::new("S1", "Kitchen", SensorType::Plain, 60);
        let reading = sensor.receive(1_000, &payload(5.0)).unwrap();

        assert_eq!(reading.sensor_id, "S1");
        assert_eq!(reading.timestamp, 1_000);
        assert_eq!(reading.measurement.len(), 3);
        assert_eq!(reading.measurement["temperature"], 21.5);
        assert_eq!(reading.measurement["humidity"], 40.0);
        assert_eq!(reading.measurement["battery"], 3000.0);
        assert_eq!(sensor.reading_display, "21.50°C 40.0%RH 3.000V");
        assert_eq!(sensor.pushed_count, 1);
        assert_eq!(sensor.last_push_timestamp, 1_000);
    }

    #[test]
    fn debounce_keeps_first_of_close_readings() {
        let mut sensor = SensorRecord::new("S1", "Kitchen", SensorType::Plain, 60);
        assert!(sensor.receive(1_000, &payload(0.0)).is_some());
        // 0.8 * 60 = 48 seconds minimum spacing
        assert!(sensor.receive(1_047, &payload(0.0)).is_none());
        assert_eq!(sensor.pushed_count, 1);
        assert_eq!(sensor.last_reading_timestamp, 1_047);
        assert_eq!(sensor.last_push_timestamp, 1_000);

        assert!(sensor.receive(1_048, &payload(0.0)).is_some());
        assert_eq!(sensor.pushed_count, 2);
    }

    #[test]
    fn airflow_converts_frequency() {
        let mut sensor = SensorRecord::new("A1", "Duct", SensorType::Airflow, 60);
        let reading = sensor.receive(1_000, &payload(150.0)).unwrap();
        assert_abs_diff_eq!(reading.measurement["airflow"], 8.3814, epsilon = 1e-9);
        assert_eq!(sensor.reading_display, "21.50°C 40.0%RH 8.38m/s 3.000V");
    }

    #[test]
    fn occupancy_accumulates_between_queued_readings() {
        let mut sensor = SensorRecord::new("O1", "Office", SensorType::Occupancy, 60);
        sensor.last_push_timestamp = 1_000;

        // Motion events arriving inside the debounce window are only counted
        assert!(sensor.receive(1_010, &payload(-1.0)).is_none());
        assert!(sensor.receive(1_020, &payload(1.0)).is_none());
        assert!(sensor.receive(1_030, &payload(-1.0)).is_none());
        assert_eq!(sensor.kind, SensorKind::Occupancy { motion_events: 2 });
        assert_eq!(sensor.reading_display, "21.50°C 40.0%RH 2 times 3.000V");

        let reading = sensor.receive(1_060, &payload(-1.0)).unwrap();
        assert_eq!(reading.measurement["occupancy"], 3.0);
        assert_eq!(sensor.kind, SensorKind::Occupancy { motion_events: 0 });

        let reading = sensor.receive(1_120, &payload(0.5)).unwrap();
        assert_eq!(reading.measurement["occupancy"], 0.0);
    }

    #[test]
    fn placeholder_defaults() {
        let sensor = SensorRecord::placeholder("ABCDEFGHIJ");
        assert_eq!(sensor.name, "Unkn-ABCDE");
        assert_eq!(sensor.sensor_type(), SensorType::Plain);
        assert_eq!(sensor.report_interval, 60);
        assert!(sensor.is_provisional());
    }

    #[test]
    fn config_update_reports_changes() {
        let mut sensor = SensorRecord::new("S1", "Kitchen", SensorType::Plain, 60);
        let update = ConfigUpdate {
            name: Some("Kitchen".to_string()),
            report_interval: None,
        };
        assert!(!sensor.apply_update(&update));

        let update = ConfigUpdate {
            name: Some("Pantry".to_string()),
            report_interval: Some(300),
        };
        assert!(sensor.apply_update(&update));
        assert_eq!(sensor.name, "Pantry");
        assert_eq!(sensor.report_interval, 300);
    }

    #[test]
    fn remote_info_can_change_type() {
        let mut sensor = SensorRecord::placeholder("ABCDEFGHIJ");
        sensor.apply_remote_info(&RemoteSensorInfo {
            id: "ABCDEFGHIJ".to_string(),
            name: "Lobby".to_string(),
            sensor_type: SensorType::Occupancy,
            report_interval: 120,
        });
        assert_eq!(sensor.name, "Lobby");
        assert_eq!(sensor.kind, SensorKind::Occupancy { motion_events: 0 });
        assert_eq!(sensor.report_interval, 120);
    }
}
