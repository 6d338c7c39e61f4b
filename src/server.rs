//! RPC server: listener, per-connection handlers, shared dispatch pool.
//!
//! One task per accepted connection runs the read loop; decoded requests are
//! handed to dispatch tasks gated by a bounded semaphore shared across all
//! connections (the worker pool). Each connection owns an exclusive writer
//! task, so whichever dispatch finishes first writes first — responses may
//! leave in a different order than their requests arrived, and the client
//! correlates them by request id.
//!
//! Faults are isolated per connection: a read or decode failure stops that
//! connection's loop, outstanding dispatches finish on their own, and every
//! other connection keeps running.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::Semaphore;

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::protocol::{FrameBuffer, Request, DEFAULT_MAX_PAYLOAD_SIZE};
use crate::service::ServiceRegistry;
use crate::writer::{spawn_writer_task, WriterHandle, DEFAULT_CHANNEL_CAPACITY};

/// Default number of concurrent dispatch workers shared by all connections.
pub const DEFAULT_WORKER_POOL_SIZE: usize = 10;

/// Tuning knobs for a [`Server`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum dispatch invocations running at once, across connections.
    pub worker_pool_size: usize,
    /// Per-frame payload cap; larger frames are a protocol violation.
    pub max_payload_size: u32,
    /// Capacity of each connection's outbound frame queue.
    pub writer_channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            writer_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// A bound RPC server, ready to accept connections.
pub struct Server {
    listener: TcpListener,
    dispatcher: Dispatcher,
    workers: Arc<Semaphore>,
    config: ServerConfig,
}

impl Server {
    /// Bind to `addr` with default configuration.
    pub async fn bind(addr: impl ToSocketAddrs, registry: Arc<ServiceRegistry>) -> Result<Self> {
        Self::bind_with_config(addr, registry, ServerConfig::default()).await
    }

    /// Bind to `addr` with explicit configuration.
    pub async fn bind_with_config(
        addr: impl ToSocketAddrs,
        registry: Arc<ServiceRegistry>,
        config: ServerConfig,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            dispatcher: Dispatcher::new(registry),
            workers: Arc::new(Semaphore::new(config.worker_pool_size)),
            config,
        })
    }

    /// The address the server is listening on (useful with port 0).
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever, one handler task per connection.
    pub async fn run(self) -> Result<()> {
        tracing::info!(addr = %self.local_addr()?, "server listening");
        loop {
            let (stream, peer) = self.listener.accept().await?;
            tracing::info!(%peer, "client connected");

            let dispatcher = self.dispatcher.clone();
            let workers = self.workers.clone();
            let config = self.config.clone();
            tokio::spawn(async move {
                handle_connection(stream, dispatcher, workers, config).await;
                tracing::info!(%peer, "client disconnected");
            });
        }
    }
}

/// Serve one connection end-to-end.
///
/// Generic over the stream so in-memory transports can stand in for TCP
/// in tests.
pub(crate) async fn handle_connection<S>(
    stream: S,
    dispatcher: Dispatcher,
    workers: Arc<Semaphore>,
    config: ServerConfig,
) where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, write_half) = tokio::io::split(stream);
    let (writer, _writer_task) = spawn_writer_task(write_half, config.writer_channel_capacity);

    let mut frame_buffer = FrameBuffer::with_max_payload(config.max_payload_size);
    let mut buf = vec![0u8; 16 * 1024];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break, // peer closed
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "read failed, closing connection");
                break;
            }
        };

        let frames = match frame_buffer.push(&buf[..n]) {
            Ok(frames) => frames,
            Err(e) => {
                // The stream cannot be trusted to resynchronize.
                tracing::warn!(error = %e, "undecodable frame, closing connection");
                break;
            }
        };

        let mut fatal = false;
        for frame in frames {
            if !frame.is_request() {
                tracing::warn!(
                    request_id = frame.request_id(),
                    "unexpected response frame from client, closing connection"
                );
                fatal = true;
                break;
            }

            let request_id = frame.request_id();
            let request = match Request::decode(&frame) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(request_id, error = %e, "undecodable request body, closing connection");
                    fatal = true;
                    break;
                }
            };

            tracing::info!(
                request_id,
                service = %request.service,
                method = %request.method,
                "received request"
            );

            spawn_dispatch(request_id, request, &dispatcher, &workers, &writer);
        }
        if fatal {
            break;
        }
    }

    // Dropping our writer handle lets the writer task drain and exit once
    // the outstanding dispatch tasks (which hold clones) are done.
}

fn spawn_dispatch(
    request_id: u64,
    request: Request,
    dispatcher: &Dispatcher,
    workers: &Arc<Semaphore>,
    writer: &WriterHandle,
) {
    let dispatcher = dispatcher.clone();
    let workers = workers.clone();
    let writer = writer.clone();

    tokio::spawn(async move {
        // The pool bound applies to the dispatch work, not to reading:
        // the read loop has already moved on to the next frame.
        let _permit = match workers.acquire_owned().await {
            Ok(p) => p,
            Err(_) => return, // semaphore closed: server shutting down
        };

        let body = dispatcher.dispatch(request).await;
        tracing::info!(request_id, "sending response");

        match body.encode_frame(request_id) {
            Ok(bytes) => {
                if let Err(e) = writer.send(Bytes::from(bytes)).await {
                    tracing::debug!(request_id, error = %e, "response dropped, connection gone");
                }
            }
            Err(e) => {
                tracing::error!(request_id, error = %e, "failed to encode response");
            }
        }
    });
}
