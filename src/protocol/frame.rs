//! Length-prefixed framing for byte-stream transports.
//!
//! Each frame is a 4-byte big-endian payload length followed by the payload
//! (a MessagePack-encoded [`RawMessage`](super::RawMessage)).
//!
//! ```text
//! ┌────────────────┬──────────────────────────┐
//! │ length (u32 BE)│ payload (length bytes)   │
//! └────────────────┴──────────────────────────┘
//! ```
//!
//! [`FrameBuffer`] accumulates partial reads with a two-state machine:
//! - `WaitingForLength`: need at least 4 bytes
//! - `WaitingForPayload`: length parsed, need N more bytes

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{BridgeError, Result};

/// Size of the length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum accepted payload size (1 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 1024 * 1024;

/// Build a complete frame from a payload.
pub fn build_frame(payload: &[u8]) -> Result<Bytes> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        BridgeError::TransmissionFailed(format!("payload of {} bytes too large", payload.len()))
    })?;

    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.put_u32(len);
    frame.extend_from_slice(payload);
    Ok(frame.freeze())
}

#[derive(Debug, Clone, Copy)]
enum State {
    WaitingForLength,
    WaitingForPayload { remaining: usize },
}

/// Buffer for accumulating incoming bytes and extracting complete payloads.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
    max_frame_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with the default size limit.
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a new frame buffer with a custom size limit.
    pub fn with_max_frame_size(max_frame_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            state: State::WaitingForLength,
            max_frame_size,
        }
    }

    /// Push data into the buffer and extract all complete payloads.
    ///
    /// Partial data is kept for the next push.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if a frame announces a payload larger than the
    /// configured limit. The stream cannot be resynchronized after that.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Bytes>> {
        self.buffer.extend_from_slice(data);

        let mut payloads = Vec::new();
        while let Some(payload) = self.try_extract_one()? {
            payloads.push(payload);
        }
        Ok(payloads)
    }

    fn try_extract_one(&mut self) -> Result<Option<Bytes>> {
        loop {
            match self.state {
                State::WaitingForLength => {
                    if self.buffer.len() < LENGTH_PREFIX_SIZE {
                        return Ok(None);
                    }

                    let prefix = self.buffer.split_to(LENGTH_PREFIX_SIZE);
                    let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
                    if len > self.max_frame_size {
                        return Err(BridgeError::DecodeError(format!(
                            "frame size {} exceeds maximum {}",
                            len, self.max_frame_size
                        )));
                    }

                    self.state = State::WaitingForPayload {
                        remaining: len as usize,
                    };
                }
                State::WaitingForPayload { remaining } => {
                    if self.buffer.len() < remaining {
                        return Ok(None);
                    }

                    let payload = self.buffer.split_to(remaining).freeze();
                    self.state = State::WaitingForLength;
                    return Ok(Some(payload));
                }
            }
        }
    }

    /// Number of buffered bytes not yet returned as a payload.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
