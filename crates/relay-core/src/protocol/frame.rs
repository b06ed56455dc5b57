//! Fixed-size frame codec.
//!
//! Wire format:
//! ```text
//! [payload:N][0x00][padding:FRAME_SIZE-N-1]
//! ```
//! Every logical message travels as exactly [`FRAME_SIZE`] bytes.  The payload
//! is a C-style NUL-terminated string; whatever follows the terminator is
//! padding and is ignored by the receiver.
//!
//! # Why fixed frames? (for beginners)
//!
//! TCP is a byte stream with no message boundaries.  Instead of a length
//! prefix, both sides agree that every message is exactly 128 bytes long, so
//! the reader always knows where one message ends and the next begins: it
//! simply reads 128 bytes at a time.

use std::borrow::Cow;

use thiserror::Error;
use tracing::trace;

/// Size in bytes of every frame on the wire.
pub const FRAME_SIZE: usize = 128;

/// Largest payload that still leaves room for the NUL terminator.
pub const MAX_PAYLOAD: usize = FRAME_SIZE - 1;

/// Errors that can occur while building or decoding a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The byte slice handed to [`Frame::from_bytes`] is not one frame long.
    #[error("invalid frame length: expected {expected} bytes, got {actual}")]
    InvalidFrameLength { expected: usize, actual: usize },

    /// Strict encoding was requested and the text does not fit in one frame.
    #[error("payload too long: {len} bytes, maximum is {max}")]
    PayloadTooLong { len: usize, max: usize },
}

/// One fixed-size protocol message unit.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: [u8; FRAME_SIZE],
}

impl Frame {
    /// Encodes `text`, truncating it at a UTF-8 character boundary so that the
    /// terminator always fits.
    ///
    /// Truncation is never an error: oversized chat lines are shortened
    /// locally instead of being rejected.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use relay_core::protocol::frame::{Frame, MAX_PAYLOAD};
    ///
    /// let frame = Frame::from_text(&"x".repeat(500));
    /// assert_eq!(frame.text().len(), MAX_PAYLOAD);
    /// ```
    pub fn from_text(text: &str) -> Self {
        let end = floor_char_boundary(text, MAX_PAYLOAD);
        if end < text.len() {
            trace!("frame payload truncated from {} to {end} bytes", text.len());
        }
        Self::from_payload(&text.as_bytes()[..end])
    }

    /// Encodes `text` without truncation.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLong`] if `text` is longer than
    /// [`MAX_PAYLOAD`] bytes.
    pub fn try_from_text(text: &str) -> Result<Self, ProtocolError> {
        if text.len() > MAX_PAYLOAD {
            return Err(ProtocolError::PayloadTooLong {
                len: text.len(),
                max: MAX_PAYLOAD,
            });
        }
        Ok(Self::from_payload(text.as_bytes()))
    }

    /// Wraps one frame's worth of raw bytes received from the wire.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidFrameLength`] unless `bytes` is exactly
    /// [`FRAME_SIZE`] long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let bytes: [u8; FRAME_SIZE] =
            bytes
                .try_into()
                .map_err(|_| ProtocolError::InvalidFrameLength {
                    expected: FRAME_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(Self { bytes })
    }

    /// Returns the payload: everything before the first NUL byte, or the whole
    /// frame if the sender forgot the terminator.  Invalid UTF-8 is replaced
    /// rather than rejected.
    pub fn text(&self) -> Cow<'_, str> {
        let end = self
            .bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(FRAME_SIZE);
        String::from_utf8_lossy(&self.bytes[..end])
    }

    /// Raw bytes to put on the wire.
    pub fn as_bytes(&self) -> &[u8; FRAME_SIZE] {
        &self.bytes
    }

    fn from_payload(payload: &[u8]) -> Self {
        let mut bytes = [0u8; FRAME_SIZE];
        bytes[..payload.len()].copy_from_slice(payload);
        Self { bytes }
    }
}

impl From<[u8; FRAME_SIZE]> for Frame {
    fn from(bytes: [u8; FRAME_SIZE]) -> Self {
        Self { bytes }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Frame").field(&self.text()).finish()
    }
}

/// Largest index `<= max` that lies on a char boundary of `text`.
pub(crate) fn floor_char_boundary(text: &str, max: usize) -> usize {
    if text.len() <= max {
        return text.len();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    end
}

// ── Tests ─────────────────────────────────────────────────────────────────────
