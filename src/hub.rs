/// Frame handling pipeline: validation, identity resolution, decoding and queueing
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Duration};

use crate::config::{ConfigStore, StoredConfig};
use crate::error::FrameError;
use crate::frame::BinaryFrame;
use crate::models::RawByteEvent;
use crate::push::{PushEngine, SubmissionQueue};
use crate::remote::{resolve_sensor, RemoteService, Resolution};
use crate::sensors::SensorRegistry;
use crate::serial::FrameAssembler;
use crate::stats::FrameStats;
use crate::utils::format_unix;

pub struct Hub {
    pub registry: Arc<SensorRegistry>,
    pub queue: Arc<SubmissionQueue>,
    pub stats: Arc<FrameStats>,
    remote: Arc<dyn RemoteService>,
    store: ConfigStore,
    update_remote: bool,
}

impl Hub {
    pub fn new(store: ConfigStore, config: &StoredConfig, remote: Arc<dyn RemoteService>) -> Self {
        Self {
            registry: Arc::new(SensorRegistry::from_stored(&config.sensors)),
            queue: Arc::new(SubmissionQueue::new()),
            stats: Arc::new(FrameStats::default()),
            remote,
            store,
            update_remote: config.update_remote_config,
        }
    }

    pub fn push_engine(&self) -> PushEngine {
        PushEngine::new(
            self.registry.clone(),
            self.queue.clone(),
            self.remote.clone(),
            self.update_remote,
        )
    }

    /// Write the registry to the config store; failures are logged only
    pub fn persist(&self) {
        match self.store.save(&self.registry.to_stored()) {
            Ok(()) => debug!(
                "Saved {} sensors to {}",
                self.registry.len(),
                self.store.path().display()
            ),
            Err(e) => error!(
                "Failed to save config to {}: {}",
                self.store.path().display(),
                e
            ),
        }
    }

    /// Validate and decode one assembled frame
    pub async fn handle_frame(&self, data: &[u8], received_at: i64) {
        let frame = match BinaryFrame::parse(data) {
            Ok(frame) => frame,
            Err(e) => {
                FrameStats::bump(&self.stats.rejected);
                warn!("Rejected frame: {}", e);
                return;
            }
        };

        let sensor_id = frame.sensor_id();
        debug!(
            "Frame from {} (rssi {}, snr {}, signal rssi {}, checksum {:02X}): {}",
            sensor_id,
            frame.rssi,
            frame.snr,
            frame.signal_rssi,
            frame.checksum,
            data.iter().map(|b| format!("{:02X}", b)).collect::<String>()
        );

        if self.registry.needs_resolution(&sensor_id) {
            let resolution = resolve_sensor(
                &sensor_id,
                &self.registry,
                self.remote.as_ref(),
                self.update_remote,
            )
            .await;
            match resolution {
                Ok(Resolution::Registered(info)) | Ok(Resolution::Adopted(info)) => {
                    debug!(
                        "Sensor {} known as '{}' ({})",
                        info.id,
                        info.name,
                        info.sensor_type.as_str()
                    );
                    self.persist();
                }
                Ok(_) => {}
                Err(e) => {
                    FrameStats::bump(&self.stats.resolution_failures);
                    error!("Could not resolve sensor {}: {}", sensor_id, e);
                    return;
                }
            }
        }

        if let Some(reading) = self.registry.receive(&sensor_id, received_at, &frame.payload) {
            self.queue.submit(reading);
        }
        FrameStats::bump(&self.stats.processed);
    }

    /// Assemble frames from the byte stream until it ends or the stop signal fires
    pub async fn run_decoder(
        &self,
        mut bytes: mpsc::Receiver<RawByteEvent>,
        mut stop: watch::Receiver<bool>,
    ) {
        let mut assembler = FrameAssembler::new();

        while !*stop.borrow() {
            let event = tokio::select! {
                _ = stop.changed() => break,
                event = bytes.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            if let Some(candidate) = assembler.push(event.byte) {
                // An overflow is a give-up, not a terminator
                if !matches!(candidate, Err(FrameError::Overflow(_))) {
                    FrameStats::bump(&self.stats.identified);
                }
                match candidate {
                    Ok(data) => self.handle_frame(&data, event.received_at).await,
                    Err(e) => {
                        FrameStats::bump(&self.stats.rejected);
                        warn!("Discarded candidate frame: {}", e);
                    }
                }
            }
        }
    }

    /// Log counters and one line per sensor
    pub fn log_status(&self, degraded: bool) {
        let stats = self.stats.snapshot();
        let (queued, pushed) = self.queue.counts();
        info!(
            "Bytes: {}  Frames: {}  Processed: {}  Rejected: {}  Queued/Pushed: {}/{}{}",
            stats.bytes,
            stats.identified,
            stats.processed,
            stats.rejected,
            queued,
            pushed,
            if degraded { "  Internet Connection Lost" } else { "" }
        );
        if stats.dropped_bytes > 0 || stats.resolution_failures > 0 {
            info!(
                "Dropped bytes: {}  Unresolved frames: {}",
                stats.dropped_bytes, stats.resolution_failures
            );
        }

        for sensor in self.registry.snapshot() {
            let name: String = sensor.name.chars().take(10).collect();
            if sensor.last_reading_timestamp > 0 {
                // P: last reading was queued, D: it was debounced
                let flag = if sensor.last_reading_timestamp == sensor.last_push_timestamp {
                    "P"
                } else {
                    "D"
                };
                info!(
                    "{:<10}  {:<6}    {} {} ({})",
                    name,
                    sensor.pushed_count,
                    sensor.reading_display,
                    format_unix(sensor.last_reading_timestamp),
                    flag
                );
            } else {
                info!("{:<10}  {:<6}    {}", name, sensor.pushed_count, sensor.reading_display);
            }
        }
    }

    /// Log status every `period` until the stop signal fires
    pub async fn run_status(
        &self,
        engine: &PushEngine,
        period: Duration,
        mut stop: watch::Receiver<bool>,
    ) {
        while !*stop.borrow() {
            tokio::select! {
                _ = stop.changed() => break,
                _ = sleep(period) => self.log_status(engine.is_degraded()),
            }
        }
    }
}
