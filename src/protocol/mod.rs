//! Wire protocol: versioned framing, incremental frame extraction, and the
//! payload schema for requests and responses.

mod frame;
mod frame_buffer;
mod message;
mod wire_format;

pub use frame::{build_frame, Frame};
pub use frame_buffer::FrameBuffer;
pub use message::{Request, ResponseBody, WireError};
pub use wire_format::{
    FrameKind, Header, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE, PROTOCOL_VERSION,
};
