//! Request dispatcher: resolve the named service and method, invoke it,
//! and map every failure mode into the error taxonomy.
//!
//! The dispatcher is a pure request → response function over an immutable
//! registry; all connection state lives in the server's connection handler
//! and the client multiplexer.

use std::sync::Arc;

use crate::error::RpcError;
use crate::protocol::{Request, ResponseBody};
use crate::service::ServiceRegistry;
use crate::value::{shapes_of, Outcome};

/// Resolves and invokes requests against a shared, read-only registry.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ServiceRegistry>,
}

impl Dispatcher {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    /// Dispatch one request and produce its response body.
    ///
    /// Never returns a connection-fatal error: service misses, resolution
    /// misses, business failures, and panics inside the invocation all
    /// become per-request error bodies. One failing request cannot take
    /// down the worker that ran it.
    pub async fn dispatch(&self, request: Request) -> ResponseBody {
        ResponseBody::from_outcome(self.invoke(request).await)
    }

    async fn invoke(&self, request: Request) -> Result<Outcome, RpcError> {
        let service = self.registry.lookup(&request.service).ok_or_else(|| {
            RpcError::NoSuchService(format!("service {:?} is not registered", request.service))
        })?;

        let shapes = shapes_of(&request.args);
        let method = service.resolve(&request.method, &shapes).ok_or_else(|| {
            let detail = if service.has_method_named(&request.method) {
                format!(
                    "method {:?} on service {:?} does not accept arguments {:?}",
                    request.method, request.service, shapes
                )
            } else {
                format!(
                    "service {:?} has no method {:?}",
                    request.service, request.method
                )
            };
            RpcError::NoSuchMethodOrInvalidArguments(detail)
        })?;

        // The handler future runs in its own task so that a panicking
        // invocation is contained and reported instead of unwinding the
        // dispatch worker.
        let fut = method.invoke(request.args);
        match tokio::spawn(fut).await {
            Ok(Ok(outcome)) => Ok(outcome),
            Ok(Err(business)) => Err(RpcError::InvocationFailure(business)),
            Err(join_err) => Err(RpcError::InvocationFailure(format!(
                "invocation aborted: {join_err}"
            ))),
        }
    }
}
