//! Frame type: one complete request or response on the wire.
//!
//! Uses `bytes::Bytes` for the payload so a frame split out of the read
//! buffer shares storage with it instead of copying.

use bytes::Bytes;

use super::wire_format::{FrameKind, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use crate::error::{Result, RpcError};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    #[inline]
    pub fn request_id(&self) -> u64 {
        self.header.request_id
    }

    #[inline]
    pub fn is_request(&self) -> bool {
        self.header.is_request()
    }

    #[inline]
    pub fn is_response(&self) -> bool {
        self.header.is_response()
    }
}

/// Build a complete frame as a single contiguous byte vector.
///
/// A payload that cannot fit the length prefix or exceeds
/// [`DEFAULT_MAX_PAYLOAD_SIZE`] is rejected here, before anything reaches
/// the wire — the peer would only sever the connection over it.
pub fn build_frame(kind: FrameKind, request_id: u64, payload: &[u8]) -> Result<Vec<u8>> {
    let payload_length = u32::try_from(payload.len())
        .ok()
        .filter(|&len| len <= DEFAULT_MAX_PAYLOAD_SIZE)
        .ok_or_else(|| {
            RpcError::ProtocolDecodeError(format!(
                "outbound payload size {} exceeds maximum {}",
                payload.len(),
                DEFAULT_MAX_PAYLOAD_SIZE
            ))
        })?;

    let header = Header::new(kind, request_id, payload_length);
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    Ok(buf)
}
