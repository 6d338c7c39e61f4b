//! Frame buffer for accumulating partial reads.
//!
//! Socket reads deliver arbitrary byte chunks; this buffer reassembles them
//! into complete frames with a two-state machine:
//! - `WaitingForHeader`: need at least [`HEADER_SIZE`] bytes
//! - `WaitingForPayload`: header parsed, need `payload_length` more bytes
//!
//! All data lives in one `BytesMut`; extracted payloads are frozen slices of
//! it, not copies.

use bytes::{Bytes, BytesMut};

use super::wire_format::{Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use super::Frame;
use crate::error::Result;

#[derive(Debug, Clone)]
enum State {
    WaitingForHeader,
    WaitingForPayload { header: Header },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Create a frame buffer with the default payload cap.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a frame buffer with a custom payload cap.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(16 * 1024),
            state: State::WaitingForHeader,
            max_payload_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Fragmented data is kept internally for the next push. A protocol
    /// violation (bad version, unknown kind, oversized payload) is returned
    /// as an error and must be treated as connection-fatal: the stream
    /// cannot be trusted to resynchronize.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        loop {
            match &self.state {
                State::WaitingForHeader => {
                    let header = match Header::decode(&self.buffer)? {
                        Some(h) => h,
                        None => return Ok(None),
                    };
                    header.validate(self.max_payload_size)?;

                    let _ = self.buffer.split_to(HEADER_SIZE);

                    if header.payload_length == 0 {
                        return Ok(Some(Frame::new(header, Bytes::new())));
                    }
                    self.state = State::WaitingForPayload { header };
                }
                State::WaitingForPayload { header } => {
                    let needed = header.payload_length as usize;
                    if self.buffer.len() < needed {
                        return Ok(None);
                    }
                    let header = *header;
                    let payload = self.buffer.split_to(needed).freeze();
                    self.state = State::WaitingForHeader;
                    return Ok(Some(Frame::new(header, payload)));
                }
            }
        }
    }

    /// Number of buffered bytes not yet part of a complete frame.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RpcError;
    use crate::protocol::wire_format::FrameKind;
    use crate::protocol::build_frame;

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let bytes = build_frame(FrameKind::Request, 42, b"hello").unwrap();

        let frames = buffer.push(&bytes).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].request_id(), 42);
        assert_eq!(&frames[0].payload[..], b"hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multiple_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();
        let mut combined = Vec::new();
        combined.extend(build_frame(FrameKind::Request, 1, b"first").unwrap());
        combined.extend(build_frame(FrameKind::Request, 2, b"second").unwrap());
        combined.extend(build_frame(FrameKind::Response, 3, b"third").unwrap());

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].request_id(), 1);
        assert_eq!(frames[1].request_id(), 2);
        assert_eq!(frames[2].request_id(), 3);
        assert!(frames[2].is_response());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_header() {
        let mut buffer = FrameBuffer::new();
        let bytes = build_frame(FrameKind::Request, 42, b"test").unwrap();

        let frames = buffer.push(&bytes[..5]).unwrap();
        assert!(frames.is_empty());

        let frames = buffer.push(&bytes[5..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].request_id(), 42);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fragmented_payload() {
        let mut buffer = FrameBuffer::new();
        let payload = b"a longer payload that will arrive in two chunks";
        let bytes = build_frame(FrameKind::Request, 42, payload).unwrap();

        let split = HEADER_SIZE + 10;
        let frames = buffer.push(&bytes[..split]).unwrap();
        assert!(frames.is_empty());

        let frames = buffer.push(&bytes[split..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].payload[..], payload);
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let bytes = build_frame(FrameKind::Response, 9, b"hi").unwrap();

        let mut all = Vec::new();
        for b in &bytes {
            all.extend(buffer.push(&[*b]).unwrap());
        }

        assert_eq!(all.len(), 1);
        assert_eq!(&all[0].payload[..], b"hi");
    }

    #[test]
    fn test_empty_payload_frame() {
        let mut buffer = FrameBuffer::new();
        let bytes = build_frame(FrameKind::Response, 1, b"").unwrap();

        let frames = buffer.push(&bytes).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].payload.is_empty());
    }

    #[test]
    fn test_oversized_payload_is_fatal() {
        let mut buffer = FrameBuffer::with_max_payload(100);
        let header = Header::new(FrameKind::Request, 1, 1000);

        let result = buffer.push(&header.encode());
        assert!(matches!(result, Err(RpcError::ProtocolDecodeError(_))));
    }

    #[test]
    fn test_mixed_complete_and_partial() {
        let mut buffer = FrameBuffer::new();
        let frame1 = build_frame(FrameKind::Request, 1, b"first").unwrap();
        let frame2 = build_frame(FrameKind::Request, 2, b"second").unwrap();

        let mut data = frame1.clone();
        data.extend_from_slice(&frame2[..5]);

        let frames = buffer.push(&data).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].request_id(), 1);

        let frames = buffer.push(&frame2[5..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].request_id(), 2);
    }
}
