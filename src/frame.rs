/// Binary telemetry frame validation and field extraction
use data_encoding::BASE32;

use crate::error::FrameError;

pub const FRAME_LEN: usize = 30;

// Checksum covers the identifier and payload: bytes 3..=28
const CHECKSUM_START: usize = 3;
const CHECKSUM_INDEX: usize = 29;

// Base-32 padding in identifiers is replaced with this digit
const ID_PAD_SENTINEL: char = '0';

/// Decoded 30-byte telemetry frame
///
/// Frame layout (big-endian):
/// - Byte 0: RSSI
/// - Byte 1: SNR
/// - Byte 2: Signal RSSI
/// - Bytes 3-14: Raw sensor identifier
/// - Bytes 15-18: Temperature (f32)
/// - Bytes 19-22: Humidity (f32)
/// - Bytes 23-26: Auxiliary channel (f32, airflow Hz or motion flag)
/// - Bytes 27-28: Battery millivolts (u16)
/// - Byte 29: Checksum, sum of bytes 3-28 mod 256
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryFrame {
    pub rssi: u8,
    pub snr: u8,
    pub signal_rssi: u8,
    pub raw_id: [u8; 12],
    pub payload: Payload,
    pub checksum: u8,
}

/// Measurement fields shared by every sensor type
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Payload {
    pub temperature: f32,
    pub humidity: f32,
    pub auxiliary: f32,
    pub battery_mv: u16,
}

pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Encode a raw identifier to its stable text form
pub fn encode_sensor_id(raw_id: &[u8]) -> String {
    BASE32.encode(raw_id).replace('=', &ID_PAD_SENTINEL.to_string())
}

fn read_f32(bytes: &[u8], at: usize) -> f32 {
    f32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

impl BinaryFrame {
    /// Validate length and checksum, then split the frame into its fields
    pub fn parse(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() != FRAME_LEN {
            return Err(FrameError::BadLength {
                len: data.len(),
                expected: FRAME_LEN,
            });
        }

        let computed = checksum(&data[CHECKSUM_START..CHECKSUM_INDEX]);
        let received = data[CHECKSUM_INDEX];
        if computed != received {
            return Err(FrameError::ChecksumMismatch { received, computed });
        }

        let mut raw_id = [0u8; 12];
        raw_id.copy_from_slice(&data[3..15]);

        let payload = Payload {
            temperature: read_f32(data, 15),
            humidity: read_f32(data, 19),
            auxiliary: read_f32(data, 23),
            battery_mv: u16::from_be_bytes([data[27], data[28]]),
        };
        // The additive checksum lets some corrupted floats through
        for (field, value) in [
            ("temperature", payload.temperature),
            ("humidity", payload.humidity),
            ("auxiliary", payload.auxiliary),
        ] {
            if !value.is_finite() {
                return Err(FrameError::NonFinite(field));
            }
        }

        Ok(BinaryFrame {
            rssi: data[0],
            snr: data[1],
            signal_rssi: data[2],
            raw_id,
            payload,
            checksum: received,
        })
    }

    pub fn sensor_id(&self) -> String {
        encode_sensor_id(&self.raw_id)
    }

    /// Serialize back to the 30-byte wire layout, recomputing the checksum
    #[cfg(test)]
    pub fn to_bytes(&self) -> [u8; FRAME_LEN] {
        let mut out = [0u8; FRAME_LEN];
        out[0] = self.rssi;
        out[1] = self.snr;
        out[2] = self.signal_rssi;
        out[3..15].copy_from_slice(&self.raw_id);
        out[15..19].copy_from_slice(&self.payload.temperature.to_be_bytes());
        out[19..23].copy_from_slice(&self.payload.humidity.to_be_bytes());
        out[23..27].copy_from_slice(&self.payload.auxiliary.to_be_bytes());
        out[27..29].copy_from_slice(&self.payload.battery_mv.to_be_bytes());
        out[CHECKSUM_INDEX] = checksum(&out[CHECKSUM_START..CHECKSUM_INDEX]);
        out
    }
}

#[cfg(test)]
pub(crate) fn sample_frame(raw_id: [u8; 12], payload: Payload) -> BinaryFrame {
    BinaryFrame {
        rssi: 0x9C,
        snr: 0x0A,
        signal_rssi: 0x98,
        raw_id,
        payload,
        checksum: 0,
    }
}
