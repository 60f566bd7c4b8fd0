use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use tokio::time::Duration;
use url::Url;

use crate::error::StoreError;
use crate::models::StoredSensor;

/// Process settings taken from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct HubConfig {
    pub config_path: PathBuf,
    pub serial_port: String,
    pub baud_rate: u32,
    pub push_interval: Duration,
    pub http_timeout: Duration,
    pub status_interval: Duration,
    pub ingest_capacity: usize,
}

fn setting<T, F>(lookup: &F, name: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid value '{}' for {}: {}", raw, name, e).into()),
        None => Ok(default),
    }
}

impl HubConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ingest_capacity = setting(&lookup, "INGEST_QUEUE_CAPACITY", 4096usize)?;
        if ingest_capacity == 0 {
            return Err("INGEST_QUEUE_CAPACITY must be greater than zero".into());
        }

        Ok(HubConfig {
            config_path: PathBuf::from(setting(&lookup, "HUB_CONFIG", "config.json".to_string())?),
            serial_port: setting(&lookup, "SERIAL_PORT", "/dev/ttyS0".to_string())?,
            baud_rate: setting(&lookup, "BAUD_RATE", 19200)?,
            push_interval: Duration::from_secs(setting(&lookup, "PUSH_INTERVAL_SECS", 10)?),
            http_timeout: Duration::from_secs(setting(&lookup, "HTTP_TIMEOUT_SECS", 30)?),
            status_interval: Duration::from_secs(setting(&lookup, "STATUS_INTERVAL_SECS", 60)?),
            ingest_capacity,
        })
    }
}

/// Contents of the JSON config store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredConfig {
    pub endpoint: String,
    pub key: String,
    /// Local configuration overrides the directory when set
    #[serde(default)]
    pub update_remote_config: bool,
    #[serde(default)]
    pub sensors: Vec<StoredSensor>,
    /// Keys this program does not use, kept as found
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StoredConfig {
    pub fn endpoint_url(&self) -> Result<Url, StoreError> {
        Ok(Url::parse(&self.endpoint)?)
    }
}

/// JSON document holding endpoint, shared key and known sensors
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<StoredConfig, StoreError> {
        let raw = fs::read_to_string(&self.path)?;
        let config: StoredConfig = serde_json::from_str(&raw)?;
        config.endpoint_url()?;
        Ok(config)
    }

    /// Rewrite the sensor list
    ///
    /// Everything else in the document is kept, except that local-authoritative
    /// mode is switched off: local edits are pushed to the directory once.
    pub fn save(&self, sensors: &[StoredSensor]) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let mut config: StoredConfig = serde_json::from_str(&fs::read_to_string(&self.path)?)?;
        config.update_remote_config = false;
        config.sensors = sensors.to_vec();

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&config)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
