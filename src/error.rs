//! Error taxonomy for wirecall.
//!
//! Errors fall into two classes:
//!
//! - **Per-request**: [`NoSuchService`](RpcError::NoSuchService),
//!   [`NoSuchMethodOrInvalidArguments`](RpcError::NoSuchMethodOrInvalidArguments)
//!   and [`InvocationFailure`](RpcError::InvocationFailure). These are produced
//!   by the dispatcher, shipped back as ordinary response frames, and leave the
//!   connection alive.
//! - **Connection-fatal**: [`ProtocolDecodeError`](RpcError::ProtocolDecodeError)
//!   and [`ConnectionLost`](RpcError::ConnectionLost). These terminate the
//!   read/write loops and are fanned out to every caller still waiting on that
//!   connection.
//!
//! [`DeadlineExceeded`](RpcError::DeadlineExceeded) is client-local: it is
//! returned by [`call_with_deadline`](crate::client::RpcClient::call_with_deadline)
//! and never crosses the wire.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire-level error kind identifier.
///
/// Serialized as a kebab-case string inside error response frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Requested service name absent from the registry.
    NoSuchService,
    /// Method name unresolved or argument shape mismatch.
    NoSuchMethodOrInvalidArguments,
    /// The resolved method ran but raised a business-level error.
    InvocationFailure,
    /// A frame could not be decoded; the connection cannot resynchronize.
    ProtocolDecodeError,
    /// I/O failure on read or write.
    ConnectionLost,
    /// The caller's deadline expired before a response arrived.
    DeadlineExceeded,
}

/// Main error type for all wirecall operations.
///
/// `Clone` so that a connection-fatal error can be delivered to every
/// pending caller on the same connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    /// Requested service name absent from the registry.
    #[error("no such service: {0}")]
    NoSuchService(String),

    /// Method name unresolved, or argument count/types do not match.
    #[error("no such method or invalid arguments: {0}")]
    NoSuchMethodOrInvalidArguments(String),

    /// The resolved method executed but raised a business-level error.
    /// The message is propagated verbatim.
    #[error("invocation failed: {0}")]
    InvocationFailure(String),

    /// A frame could not be decoded. Connection-fatal.
    #[error("protocol decode error: {0}")]
    ProtocolDecodeError(String),

    /// I/O failure on the connection. Connection-fatal.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// Client-local deadline expiry; never serialized.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),
}

impl RpcError {
    /// The wire-level kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RpcError::NoSuchService(_) => ErrorKind::NoSuchService,
            RpcError::NoSuchMethodOrInvalidArguments(_) => {
                ErrorKind::NoSuchMethodOrInvalidArguments
            }
            RpcError::InvocationFailure(_) => ErrorKind::InvocationFailure,
            RpcError::ProtocolDecodeError(_) => ErrorKind::ProtocolDecodeError,
            RpcError::ConnectionLost(_) => ErrorKind::ConnectionLost,
            RpcError::DeadlineExceeded(_) => ErrorKind::DeadlineExceeded,
        }
    }

    /// The human-readable message carried by this error.
    pub fn message(&self) -> &str {
        match self {
            RpcError::NoSuchService(m)
            | RpcError::NoSuchMethodOrInvalidArguments(m)
            | RpcError::InvocationFailure(m)
            | RpcError::ProtocolDecodeError(m)
            | RpcError::ConnectionLost(m)
            | RpcError::DeadlineExceeded(m) => m,
        }
    }

    /// Whether this error terminates the connection it occurred on.
    ///
    /// Per-request errors leave the connection serving subsequent requests;
    /// connection-fatal errors are fanned out to every pending caller.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            RpcError::ProtocolDecodeError(_) | RpcError::ConnectionLost(_)
        )
    }

    /// Rebuild an error from its wire kind and message.
    pub fn from_parts(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::NoSuchService => RpcError::NoSuchService(message),
            ErrorKind::NoSuchMethodOrInvalidArguments => {
                RpcError::NoSuchMethodOrInvalidArguments(message)
            }
            ErrorKind::InvocationFailure => RpcError::InvocationFailure(message),
            ErrorKind::ProtocolDecodeError => RpcError::ProtocolDecodeError(message),
            ErrorKind::ConnectionLost => RpcError::ConnectionLost(message),
            ErrorKind::DeadlineExceeded => RpcError::DeadlineExceeded(message),
        }
    }
}

impl From<std::io::Error> for RpcError {
    fn from(e: std::io::Error) -> Self {
        RpcError::ConnectionLost(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for RpcError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        RpcError::ProtocolDecodeError(format!("encode: {e}"))
    }
}

impl From<rmp_serde::decode::Error> for RpcError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        RpcError::ProtocolDecodeError(format!("decode: {e}"))
    }
}

/// Result type alias using RpcError.
pub type Result<T> = std::result::Result<T, RpcError>;
