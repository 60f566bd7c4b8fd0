//! Error types for frame handling, the remote directory and the config store

use thiserror::Error;

/// Reasons a candidate frame is rejected before any reading is produced
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Invalid hex digit 0x{0:02X} in frame")]
    InvalidHex(u8),

    #[error("Odd number of hex digits ({0}) in frame")]
    OddDigitCount(usize),

    #[error("Assembly buffer overflow: {0} bytes without terminator")]
    Overflow(usize),

    #[error("Bad frame length: {len} bytes (expected {expected})")]
    BadLength { len: usize, expected: usize },

    #[error("Checksum mismatch: frame carries 0x{received:02X}, computed 0x{computed:02X}")]
    ChecksumMismatch { received: u8, computed: u8 },

    #[error("Non-finite {0} value in frame")]
    NonFinite(&'static str),
}

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response status {0}")]
    Status(u16),

    #[error("Sensor registration rejected with status {0}")]
    RegistrationRejected(u16),

    #[error("Malformed response body: {0}")]
    Body(#[from] serde_json::Error),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        RemoteError::Transport(e.to_string())
    }
}

impl RemoteError {
    /// Whether the remote could not be reached at all, as opposed to answering badly
    pub fn is_transport(&self) -> bool {
        matches!(self, RemoteError::Transport(_))
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Config store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}
