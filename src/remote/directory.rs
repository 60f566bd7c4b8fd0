/// Reconciliation of first-seen sensors with the remote directory
use log::info;

use super::RemoteService;
use crate::error::RemoteError;
use crate::models::RemoteSensorInfo;
use crate::sensors::SensorRegistry;

/// What resolving an identifier did
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Directory did not know the sensor; it was registered and read back
    Registered(RemoteSensorInfo),
    /// Directory knew the sensor and the local registry did not; remote config adopted
    Adopted(RemoteSensorInfo),
    /// Both sides knew the sensor; local config was pushed to the directory
    PushedLocal,
    /// Both sides knew the sensor; the directory stays authoritative
    Unchanged,
}

/// Resolve an unknown or provisional sensor identifier
///
/// A registration rejected by the directory is returned as an error and not
/// retried here; the next frame from the same sensor starts a fresh attempt.
pub async fn resolve_sensor(
    sensor_id: &str,
    registry: &SensorRegistry,
    remote: &dyn RemoteService,
    update_remote: bool,
) -> Result<Resolution, RemoteError> {
    match remote.fetch_info(sensor_id).await? {
        None => {
            let record = registry.get_or_placeholder(sensor_id);
            info!("Registering new sensor {} as '{}'", sensor_id, record.name);
            remote.register(&record.to_stored()).await?;

            // Read back whatever the directory made canonical
            let info = remote
                .fetch_info(sensor_id)
                .await?
                .ok_or(RemoteError::Status(404))?;
            let info = RemoteSensorInfo {
                id: sensor_id.to_string(),
                ..info
            };
            registry.apply_remote_info(&info);
            info!("Registered sensor {} as '{}'", sensor_id, info.name);
            Ok(Resolution::Registered(info))
        }
        Some(info) => match registry.get(sensor_id) {
            Some(record) if update_remote => {
                info!("Pushing local config of sensor {} to directory", sensor_id);
                remote.update_info(&record.to_stored()).await?;
                Ok(Resolution::PushedLocal)
            }
            Some(_) => Ok(Resolution::Unchanged),
            None => {
                let info = RemoteSensorInfo {
                    id: sensor_id.to_string(),
                    ..info
                };
                info!(
                    "Adopted sensor {} from directory as '{}' ({})",
                    sensor_id,
                    info.name,
                    info.sensor_type.as_str()
                );
                registry.apply_remote_info(&info);
                Ok(Resolution::Adopted(info))
            }
        },
    }
}
