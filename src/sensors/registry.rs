/// Lock-guarded map of sensor identifier to sensor record
///
/// Every mutation goes through one of the methods below. The lock is never held
/// across an await point.
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::SensorRecord;
use crate::frame::Payload;
use crate::models::{ConfigUpdate, Reading, RemoteSensorInfo, StoredSensor};

#[derive(Debug, Default)]
pub struct SensorRegistry {
    sensors: Mutex<HashMap<String, SensorRecord>>,
}

impl SensorRegistry {
    pub fn from_stored(stored: &[StoredSensor]) -> Self {
        let sensors = stored
            .iter()
            .map(|s| (s.id.clone(), SensorRecord::from_stored(s)))
            .collect();
        Self {
            sensors: Mutex::new(sensors),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SensorRecord>> {
        self.sensors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn get(&self, id: &str) -> Option<SensorRecord> {
        self.lock().get(id).cloned()
    }

    /// Unknown or still provisional identifiers must be resolved against the directory
    pub fn needs_resolution(&self, id: &str) -> bool {
        self.lock().get(id).map_or(true, SensorRecord::is_provisional)
    }

    /// Return the existing record for `id`, creating a placeholder if there is none
    pub fn get_or_placeholder(&self, id: &str) -> SensorRecord {
        self.lock()
            .entry(id.to_string())
            .or_insert_with(|| SensorRecord::placeholder(id))
            .clone()
    }

    /// Merge the directory's view of a sensor into the registry
    pub fn apply_remote_info(&self, info: &RemoteSensorInfo) {
        self.lock()
            .entry(info.id.clone())
            .and_modify(|record| record.apply_remote_info(info))
            .or_insert_with(|| SensorRecord::from_remote(info));
    }

    /// Decode a payload for a known sensor; `None` if unknown or debounced
    pub fn receive(&self, id: &str, timestamp: i64, payload: &Payload) -> Option<Reading> {
        self.lock()
            .get_mut(id)
            .and_then(|record| record.receive(timestamp, payload))
    }

    pub fn apply_update(&self, id: &str, update: &ConfigUpdate) -> bool {
        self.lock()
            .get_mut(id)
            .map_or(false, |record| record.apply_update(update))
    }

    /// All records, ordered by identifier
    pub fn snapshot(&self) -> Vec<SensorRecord> {
        let mut records: Vec<SensorRecord> = self.lock().values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    pub fn to_stored(&self) -> Vec<StoredSensor> {
        self.snapshot().iter().map(SensorRecord::to_stored).collect()
    }
}
