//! Wire format encoding and decoding.
//!
//! Implements the 14-byte frame header:
//! ```text
//! ┌─────────┬────────┬────────────┬────────────┐
//! │ Version │ Kind   │ Request ID │ Length     │
//! │ 1 byte  │ 1 byte │ 8 bytes    │ 4 bytes    │
//! │         │        │ uint64 BE  │ uint32 BE  │
//! └─────────┴────────┴────────────┴────────────┘
//! ```
//!
//! All multi-byte integers are Big Endian. The payload that follows is a
//! MessagePack document; its length is `payload_length`, so a stream reader
//! can decode frame N+1 immediately after frame N with no other bookkeeping.

use crate::error::{Result, RpcError};

/// Header size in bytes (fixed, exactly 14).
pub const HEADER_SIZE: usize = 14;

/// Protocol version written into every frame.
pub const PROTOCOL_VERSION: u8 = 1;

/// Default maximum payload size (64 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

/// Whether a frame carries a request or a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Request = 1,
    Response = 2,
}

impl FrameKind {
    /// Decode a kind byte. Unknown values are a protocol violation.
    pub fn from_byte(b: u8) -> Result<Self> {
        match b {
            1 => Ok(FrameKind::Request),
            2 => Ok(FrameKind::Response),
            other => Err(RpcError::ProtocolDecodeError(format!(
                "unknown frame kind {other:#04x}"
            ))),
        }
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Protocol version (must equal [`PROTOCOL_VERSION`]).
    pub version: u8,
    /// Request or response.
    pub kind: FrameKind,
    /// Correlation id, unique and strictly increasing per connection.
    pub request_id: u64,
    /// Payload length in bytes.
    pub payload_length: u32,
}

impl Header {
    /// Create a header for the current protocol version.
    pub fn new(kind: FrameKind, request_id: u64, payload_length: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            kind,
            request_id,
            payload_length,
        }
    }

    /// Encode the header to bytes (Big Endian).
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.version;
        buf[1] = self.kind as u8;
        buf[2..10].copy_from_slice(&self.request_id.to_be_bytes());
        buf[10..14].copy_from_slice(&self.payload_length.to_be_bytes());
        buf
    }

    /// Decode a header from bytes.
    ///
    /// Returns `Ok(None)` if the buffer is too short; version and kind
    /// violations are protocol errors.
    pub fn decode(buf: &[u8]) -> Result<Option<Self>> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }
        let version = buf[0];
        if version != PROTOCOL_VERSION {
            return Err(RpcError::ProtocolDecodeError(format!(
                "unsupported protocol version {version}"
            )));
        }
        let kind = FrameKind::from_byte(buf[1])?;
        let request_id = u64::from_be_bytes([
            buf[2], buf[3], buf[4], buf[5], buf[6], buf[7], buf[8], buf[9],
        ]);
        let payload_length = u32::from_be_bytes([buf[10], buf[11], buf[12], buf[13]]);
        Ok(Some(Self {
            version,
            kind,
            request_id,
            payload_length,
        }))
    }

    /// Validate the payload length against the configured cap.
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_length > max_payload_size {
            return Err(RpcError::ProtocolDecodeError(format!(
                "payload size {} exceeds maximum {}",
                self.payload_length, max_payload_size
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn is_request(&self) -> bool {
        self.kind == FrameKind::Request
    }

    #[inline]
    pub fn is_response(&self) -> bool {
        self.kind == FrameKind::Response
    }
}
