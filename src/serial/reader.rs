/// Serial byte source feeding the frame assembler
use log::{error, info, warn};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::models::RawByteEvent;
use crate::stats::FrameStats;
use crate::utils::unix_now;

const READ_CHUNK: usize = 256;
const READ_ERROR_BACKOFF_MS: u64 = 500;
const DROP_WARN_EVERY: u64 = 1000;

/// Open the LoRa receiver's serial port (8N1, no flow control)
pub fn open_serial(path: &str, baud_rate: u32) -> Result<SerialStream, tokio_serial::Error> {
    tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
}

/// Read bytes from `source` and forward them, stamped with arrival time
///
/// The channel is bounded; when the decoder falls behind, new bytes are dropped
/// and counted rather than buffered without limit. Runs until the stop signal
/// fires, the source reaches end of stream, or the decoder side goes away.
pub async fn read_bytes<R>(
    mut source: R,
    tx: mpsc::Sender<RawByteEvent>,
    stats: Arc<FrameStats>,
    mut stop: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_CHUNK];

    while !*stop.borrow() {
        let read = tokio::select! {
            _ = stop.changed() => break,
            read = source.read(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                info!("Serial source closed");
                break;
            }
            Ok(n) => {
                let received_at = unix_now();
                stats.bytes.fetch_add(n as u64, Ordering::Relaxed);
                for &byte in &buf[..n] {
                    match tx.try_send(RawByteEvent { byte, received_at }) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            let dropped = FrameStats::bump(&stats.dropped_bytes);
                            if dropped % DROP_WARN_EVERY == 1 {
                                warn!("Ingest queue full, {} bytes dropped so far", dropped);
                            }
                        }
                        Err(TrySendError::Closed(_)) => return,
                    }
                }
            }
            Err(e) => {
                error!("Serial read failed: {}", e);
                sleep(Duration::from_millis(READ_ERROR_BACKOFF_MS)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn forwards_every_byte_until_eof() {
        let (tx, mut rx) = mpsc::channel(64);
        let (_stop_tx, stop_rx) = watch::channel(false);
        let stats = Arc::new(FrameStats::default());

        read_bytes(&b"0102\r\n"[..], tx, stats.clone(), stop_rx).await;

        let mut bytes = Vec::new();
        while let Some(event) = rx.recv().await {
            bytes.push(event.byte);
        }
        assert_eq!(bytes, b"0102\r\n");
        assert_eq!(stats.snapshot().bytes, 6);
        assert_eq!(stats.snapshot().dropped_bytes, 0);
    }

    #[tokio::test]
    async fn drops_new_bytes_when_queue_is_full() {
        let (tx, mut rx) = mpsc::channel(4);
        let (_stop_tx, stop_rx) = watch::channel(false);
        let stats = Arc::new(FrameStats::default());

        read_bytes(&b"ABCDEFGH"[..], tx, stats.clone(), stop_rx).await;

        let mut bytes = Vec::new();
        while let Some(event) = rx.recv().await {
            bytes.push(event.byte);
        }
        assert_eq!(bytes, b"ABCD");
        assert_eq!(stats.snapshot().dropped_bytes, 4);
    }

    #[tokio::test]
    async fn stops_on_signal() {
        let (tx, _rx) = mpsc::channel(4);
        let (stop_tx, stop_rx) = watch::channel(false);
        let stats = Arc::new(FrameStats::default());
        // A duplex half with no writer activity blocks on read forever
        let (_writer, reader) = tokio::io::duplex(16);

        let handle = tokio::spawn(read_bytes(reader, tx, stats, stop_rx));
        stop_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
