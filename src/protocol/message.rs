//! Payload schema for request and response frames.
//!
//! The correlation id lives in the frame header; these types are the
//! MessagePack documents carried as frame payloads.

use serde::{Deserialize, Serialize};

use crate::codec::MsgPackCodec;
use crate::error::{ErrorKind, Result, RpcError};
use crate::value::{Outcome, Value};

use super::frame::{build_frame, Frame};
use super::wire_format::FrameKind;

/// A named call: service, method, and its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub service: String,
    pub method: String,
    pub args: Vec<Value>,
}

impl Request {
    pub fn new(
        service: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            args,
        }
    }

    /// Encode this request as a complete frame for the given id.
    pub fn encode_frame(&self, request_id: u64) -> Result<Vec<u8>> {
        let payload = MsgPackCodec::encode(self)?;
        build_frame(FrameKind::Request, request_id, &payload)
    }

    /// Decode a request body from a frame's payload.
    pub fn decode(frame: &Frame) -> Result<Self> {
        MsgPackCodec::decode(&frame.payload)
    }
}

/// An error reported inside a response frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&RpcError> for WireError {
    fn from(err: &RpcError) -> Self {
        Self {
            kind: err.kind(),
            message: err.message().to_string(),
        }
    }
}

impl From<WireError> for RpcError {
    fn from(err: WireError) -> Self {
        RpcError::from_parts(err.kind, err.message)
    }
}

/// The body of a response frame. Exactly one arm is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseBody {
    /// The call produced a value.
    Result(Value),
    /// The call succeeded without producing a value.
    Void,
    /// The call failed with a per-request error.
    Error(WireError),
}

impl ResponseBody {
    /// Build a response body from a dispatch result.
    pub fn from_outcome(result: std::result::Result<Outcome, RpcError>) -> Self {
        match result {
            Ok(Outcome::Value(v)) => ResponseBody::Result(v),
            Ok(Outcome::Void) => ResponseBody::Void,
            Err(e) => ResponseBody::Error(WireError::from(&e)),
        }
    }

    /// Convert back into the result a caller sees.
    pub fn into_outcome(self) -> std::result::Result<Outcome, RpcError> {
        match self {
            ResponseBody::Result(v) => Ok(Outcome::Value(v)),
            ResponseBody::Void => Ok(Outcome::Void),
            ResponseBody::Error(e) => Err(e.into()),
        }
    }

    /// Encode this response as a complete frame for the given id.
    pub fn encode_frame(&self, request_id: u64) -> Result<Vec<u8>> {
        let payload = MsgPackCodec::encode(self)?;
        build_frame(FrameKind::Response, request_id, &payload)
    }

    /// Decode a response body from a frame's payload.
    pub fn decode(frame: &Frame) -> Result<Self> {
        MsgPackCodec::decode(&frame.payload)
    }
}
