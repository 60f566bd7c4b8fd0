/// Remote sensor directory and data collector
pub mod client;
pub mod directory;

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::models::{ConfigUpdate, Reading, RemoteSensorInfo, StoredSensor};

pub use client::HttpRemote;
pub use directory::{resolve_sensor, Resolution};

#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Look a sensor up in the directory; `None` if the directory does not know it
    async fn fetch_info(&self, sensor_id: &str) -> Result<Option<RemoteSensorInfo>, RemoteError>;

    /// Create a directory entry for a sensor
    async fn register(&self, sensor: &StoredSensor) -> Result<(), RemoteError>;

    /// Overwrite the directory entry with local configuration
    async fn update_info(&self, sensor: &StoredSensor) -> Result<(), RemoteError>;

    /// Deliver a batch of readings; the collector may answer with new configuration
    async fn push_records(
        &self,
        sensor_id: &str,
        records: &[Reading],
    ) -> Result<Option<ConfigUpdate>, RemoteError>;
}
