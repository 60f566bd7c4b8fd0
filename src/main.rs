mod config;
mod error;
mod frame;
mod hub;
mod models;
mod push;
mod remote;
mod sensors;
mod serial;
mod stats;
mod utils;

use futures_util::future::join_all;
use log::{error, info};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use config::{ConfigStore, HubConfig};
use hub::Hub;
use remote::{HttpRemote, RemoteService};
use serial::{open_serial, read_bytes};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let settings = match HubConfig::new() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let store = ConfigStore::new(&settings.config_path);
    let stored = match store.load() {
        Ok(stored) => stored,
        Err(e) => {
            error!(
                "Failed to read config store {}: {}",
                settings.config_path.display(),
                e
            );
            return Err(e.into());
        }
    };
    info!(
        "Loaded {} sensors, endpoint {}, {} config authoritative",
        stored.sensors.len(),
        stored.endpoint,
        if stored.update_remote_config { "local" } else { "remote" }
    );

    let remote: Arc<dyn RemoteService> = Arc::new(HttpRemote::new(
        &stored.endpoint_url()?,
        &stored.key,
        settings.http_timeout,
    )?);
    let hub = Arc::new(Hub::new(store, &stored, remote));
    let engine = Arc::new(hub.push_engine());

    let port = match open_serial(&settings.serial_port, settings.baud_rate) {
        Ok(port) => port,
        Err(e) => {
            error!("Failed to open serial port {}: {}", settings.serial_port, e);
            return Err(e.into());
        }
    };
    info!(
        "Sensor hub v{} listening on {} at {} baud",
        env!("CARGO_PKG_VERSION"),
        settings.serial_port,
        settings.baud_rate
    );

    let push_interval = settings.push_interval;
    let status_interval = settings.status_interval;
    let (stop_tx, stop_rx) = watch::channel(false);
    let (byte_tx, byte_rx) = mpsc::channel(settings.ingest_capacity);

    let workers = vec![
        tokio::spawn(read_bytes(port, byte_tx, hub.stats.clone(), stop_rx.clone())),
        tokio::spawn({
            let hub = hub.clone();
            let stop = stop_rx.clone();
            async move { hub.run_decoder(byte_rx, stop).await }
        }),
        tokio::spawn({
            let engine = engine.clone();
            let stop = stop_rx.clone();
            async move { engine.run(push_interval, stop).await }
        }),
        tokio::spawn({
            let hub = hub.clone();
            let engine = engine.clone();
            async move { hub.run_status(&engine, status_interval, stop_rx).await }
        }),
    ];

    // Handle Ctrl+C gracefully
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for Ctrl+C");
    info!("Program terminated by user. Shutting down.");
    let _ = stop_tx.send(true);

    for result in join_all(workers).await {
        if let Err(e) = result {
            error!("Worker ended abnormally: {}", e);
        }
    }

    hub.persist();
    let (queued, pushed) = hub.queue.counts();
    info!("Exiting with {} readings undelivered, {} pushed", queued, pushed);

    Ok(())
}
