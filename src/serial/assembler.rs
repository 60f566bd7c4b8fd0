/// Resynchronizing ASCII-hex frame assembler
///
/// The receiver forwards every LoRa packet as ASCII hex digit pairs followed by
/// CR LF. Bytes accumulate until the terminator shows up; the digits before it
/// are then decoded as one candidate frame and the buffer starts over.
use crate::error::FrameError;

const CR: u8 = 0x0D;
const LF: u8 = 0x0A;

/// Longest run of bytes kept without seeing a terminator
pub const MAX_BUFFER_LEN: usize = 256;

#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_BUFFER_LEN),
        }
    }

    /// Feed one byte from the transport
    ///
    /// Returns `None` while a frame is still being collected. Once CR LF is seen,
    /// returns the decoded octets or the reason the candidate was discarded. The
    /// buffer is cleared in both cases.
    pub fn push(&mut self, byte: u8) -> Option<Result<Vec<u8>, FrameError>> {
        self.buffer.push(byte);

        if self.buffer.ends_with(&[CR, LF]) {
            let digits = &self.buffer[..self.buffer.len() - 2];
            let result = decode_hex(digits);
            self.buffer.clear();
            return Some(result);
        }

        if self.buffer.len() > MAX_BUFFER_LEN {
            let len = self.buffer.len();
            self.buffer.clear();
            return Some(Err(FrameError::Overflow(len)));
        }

        None
    }

    #[cfg(test)]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

fn nibble(digit: u8) -> Result<u8, FrameError> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        _ => Err(FrameError::InvalidHex(digit)),
    }
}

/// Decode ASCII hex digit pairs (high nibble first) into octets
pub fn decode_hex(digits: &[u8]) -> Result<Vec<u8>, FrameError> {
    if digits.len() % 2 != 0 {
        return Err(FrameError::OddDigitCount(digits.len()));
    }
    digits
        .chunks_exact(2)
        .map(|pair| Ok(nibble(pair[0])? << 4 | nibble(pair[1])?))
        .collect()
}

/// Wire form of a frame: uppercase hex digits terminated by CR LF
#[cfg(test)]
pub fn encode_wire(frame: &[u8]) -> Vec<u8> {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = Vec::with_capacity(frame.len() * 2 + 2);
    for octet in frame {
        out.push(DIGITS[(octet >> 4) as usize]);
        out.push(DIGITS[(octet & 0x0F) as usize]);
    }
    out.extend_from_slice(&[CR, LF]);
    out
}
