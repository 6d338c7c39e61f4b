//! Client multiplexer: many concurrent callers, one connection.
//!
//! Every caller shares one socket. Request ids come from a single atomic
//! counter, writes funnel through the connection's exclusive writer task,
//! and a dedicated background reader routes each inbound response to the
//! caller that issued the matching id via a pending-response table of
//! oneshot channels:
//!
//! ```text
//! caller A ── call() ──┐                       ┌─► oneshot ─► caller A
//! caller B ── call() ──┼─► writer task ─► socket ─► reader task ─┤
//! caller C ── call() ──┘                       └─► oneshot ─► caller C
//! ```
//!
//! Responses may arrive in any order; the table guarantees each one is
//! claimed by exactly the caller whose id it carries. A response nobody is
//! waiting for (a caller gave up at its deadline, or an unknown id) is
//! dropped, never queued. When the connection dies, the terminal error is
//! fanned out to every caller still in the table — nobody blocks forever
//! on a dead connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::oneshot;

use crate::error::{Result, RpcError};
use crate::protocol::{FrameBuffer, Request, ResponseBody, DEFAULT_MAX_PAYLOAD_SIZE};
use crate::value::{Outcome, Value};
use crate::writer::{spawn_writer_task, WriterHandle, DEFAULT_CHANNEL_CAPACITY};

/// Tuning knobs for an [`RpcClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Per-frame payload cap; larger inbound frames are a protocol violation.
    pub max_payload_size: u32,
    /// Capacity of the outbound frame queue.
    pub writer_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            writer_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Pending-response table plus the connection's terminal state.
///
/// One entry per in-flight id; entries are removed the instant they are
/// claimed. Once `terminal` is set the connection is dead: new calls fail
/// immediately with the stored error, under the same lock that guards the
/// table, so a caller can never register after the fan-out has happened.
#[derive(Default)]
struct PendingTable {
    waiters: HashMap<u64, oneshot::Sender<Result<Outcome>>>,
    terminal: Option<RpcError>,
}

/// A connected RPC client, safe to share and call from any number of tasks.
pub struct RpcClient {
    next_id: AtomicU64,
    writer: WriterHandle,
    pending: Arc<Mutex<PendingTable>>,
}

impl RpcClient {
    /// Connect to a server with default configuration.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        Self::connect_with_config(addr, ClientConfig::default()).await
    }

    /// Connect to a server with explicit configuration.
    pub async fn connect_with_config(
        addr: impl ToSocketAddrs,
        config: ClientConfig,
    ) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::from_stream(stream, config))
    }

    /// Build a client over an already-established byte stream.
    ///
    /// The protocol assumes nothing beyond ordered, reliable, bidirectional
    /// byte delivery, so any such stream works (in-memory duplex pipes
    /// included).
    pub fn from_stream<S>(stream: S, config: ClientConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, write_half) = tokio::io::split(stream);
        let (writer, _writer_task) = spawn_writer_task(write_half, config.writer_channel_capacity);

        let pending: Arc<Mutex<PendingTable>> = Arc::default();
        tokio::spawn(reader_task(reader, pending.clone(), config.max_payload_size));

        Self {
            next_id: AtomicU64::new(1),
            writer,
            pending,
        }
    }

    /// Invoke `service.method(args)` and wait for its response.
    ///
    /// Blocks until the response arrives or the connection dies; ids are
    /// never reused, so the answer is always exactly this call's own.
    pub async fn call(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Outcome> {
        let (_request_id, rx) = self.send_request(service, method, args).await?;

        match rx.await {
            Ok(result) => result,
            // The sender can only disappear if the reader task died between
            // fan-out and delivery; surface the terminal error if we have it.
            Err(_) => Err(self.terminal_error()),
        }
    }

    /// Like [`call`](Self::call), but give up after `deadline`.
    ///
    /// On expiry the pending entry is removed, so a response that arrives
    /// later is dropped by the reader rather than queued indefinitely.
    pub async fn call_with_deadline(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
        deadline: Duration,
    ) -> Result<Outcome> {
        let (request_id, rx) = self.send_request(service, method, args).await?;

        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(self.terminal_error()),
            Err(_elapsed) => {
                self.forget(request_id);
                Err(RpcError::DeadlineExceeded(format!(
                    "no response to request {request_id} within {deadline:?}"
                )))
            }
        }
    }

    /// Number of calls currently awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().expect("pending table lock poisoned").waiters.len()
    }

    async fn send_request(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<(u64, oneshot::Receiver<Result<Outcome>>)> {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);

        // Register before writing: the response cannot outrun its waiter.
        let (tx, rx) = oneshot::channel();
        {
            let mut table = self.pending.lock().expect("pending table lock poisoned");
            if let Some(err) = &table.terminal {
                return Err(err.clone());
            }
            table.waiters.insert(request_id, tx);
        }

        let request = Request::new(service, method, args);
        tracing::info!(request_id, service, method, "sending request");

        let frame = match request.encode_frame(request_id) {
            Ok(f) => f,
            Err(e) => {
                self.forget(request_id);
                return Err(e);
            }
        };
        if let Err(e) = self.writer.send(Bytes::from(frame)).await {
            self.forget(request_id);
            return Err(e);
        }

        Ok((request_id, rx))
    }

    fn forget(&self, request_id: u64) {
        let mut table = self.pending.lock().expect("pending table lock poisoned");
        table.waiters.remove(&request_id);
    }

    fn terminal_error(&self) -> RpcError {
        let table = self.pending.lock().expect("pending table lock poisoned");
        table
            .terminal
            .clone()
            .unwrap_or_else(|| RpcError::ConnectionLost("reader task stopped".into()))
    }
}

/// Background reader: decodes response frames and routes each to the waiter
/// registered under its id. On any read or decode failure, marks the
/// connection dead and fans the terminal error out to every pending caller.
async fn reader_task<R>(
    mut reader: R,
    pending: Arc<Mutex<PendingTable>>,
    max_payload_size: u32,
) where
    R: AsyncRead + Unpin,
{
    let mut frame_buffer = FrameBuffer::with_max_payload(max_payload_size);
    let mut buf = vec![0u8; 16 * 1024];

    let terminal = loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break RpcError::ConnectionLost("server closed the connection".into()),
            Ok(n) => n,
            Err(e) => break RpcError::ConnectionLost(e.to_string()),
        };

        let frames = match frame_buffer.push(&buf[..n]) {
            Ok(frames) => frames,
            Err(e) => break e,
        };

        let mut fatal = None;
        for frame in frames {
            if !frame.is_response() {
                fatal = Some(RpcError::ProtocolDecodeError(
                    "request frame received from server".into(),
                ));
                break;
            }
            let outcome = match ResponseBody::decode(&frame) {
                Ok(body) => body.into_outcome(),
                Err(e) => {
                    fatal = Some(e);
                    break;
                }
            };
            route_response(&pending, frame.request_id(), outcome);
        }
        if let Some(e) = fatal {
            break e;
        }
    };

    fan_out(&pending, terminal);
}

fn route_response(
    pending: &Mutex<PendingTable>,
    request_id: u64,
    outcome: Result<Outcome>,
) {
    let waiter = {
        let mut table = pending.lock().expect("pending table lock poisoned");
        table.waiters.remove(&request_id)
    };
    match waiter {
        Some(tx) => {
            tracing::info!(request_id, "response received");
            // A dropped receiver means the caller just gave up; the
            // response is discarded either way.
            let _ = tx.send(outcome);
        }
        None => {
            tracing::debug!(request_id, "dropping response with no pending caller");
        }
    }
}

fn fan_out(pending: &Mutex<PendingTable>, terminal: RpcError) {
    tracing::warn!(error = %terminal, "connection dead, failing all pending calls");
    let waiters = {
        let mut table = pending.lock().expect("pending table lock poisoned");
        table.terminal = Some(terminal.clone());
        std::mem::take(&mut table.waiters)
    };
    for (_, tx) in waiters {
        let _ = tx.send(Err(terminal.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Frame;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};

    /// A hand-driven fake server over an in-memory duplex pipe.
    struct FakeServer {
        stream: DuplexStream,
        frames: FrameBuffer,
        queue: std::collections::VecDeque<Frame>,
    }

    impl FakeServer {
        fn start() -> (RpcClient, Self) {
            let (client_side, server_side) = duplex(64 * 1024);
            let client = RpcClient::from_stream(client_side, ClientConfig::default());
            (
                client,
                Self {
                    stream: server_side,
                    frames: FrameBuffer::new(),
                    queue: std::collections::VecDeque::new(),
                },
            )
        }

        async fn next_request(&mut self) -> Frame {
            let mut buf = vec![0u8; 4096];
            loop {
                if let Some(frame) = self.queue.pop_front() {
                    return frame;
                }
                let n = self.stream.read(&mut buf).await.unwrap();
                assert!(n > 0, "client closed unexpectedly");
                self.queue.extend(self.frames.push(&buf[..n]).unwrap());
            }
        }

        async fn respond(&mut self, request_id: u64, body: ResponseBody) {
            let bytes = body.encode_frame(request_id).unwrap();
            self.stream.write_all(&bytes).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_call_roundtrip() {
        let (client, mut server) = FakeServer::start();

        let call = tokio::spawn(async move {
            let outcome = client
                .call("service2", "multiply", vec![Value::I32(10), Value::I32(15)])
                .await
                .unwrap();
            assert_eq!(outcome, Outcome::Value(Value::I32(150)));
        });

        let frame = server.next_request().await;
        let req = Request::decode(&frame).unwrap();
        assert_eq!(req.service, "service2");
        assert_eq!(req.method, "multiply");
        server
            .respond(frame.request_id(), ResponseBody::Result(Value::I32(150)))
            .await;

        call.await.unwrap();
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_increasing() {
        let (client, mut server) = FakeServer::start();
        let client = Arc::new(client);

        let mut calls = Vec::new();
        for _ in 0..5 {
            let c = client.clone();
            calls.push(tokio::spawn(async move {
                c.call("s", "m", vec![]).await.unwrap();
            }));
        }

        let mut ids = Vec::new();
        for _ in 0..5 {
            let frame = server.next_request().await;
            ids.push(frame.request_id());
            server.respond(frame.request_id(), ResponseBody::Void).await;
        }
        for call in calls {
            call.await.unwrap();
        }

        let mut sorted = ids.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 5, "ids must be distinct: {ids:?}");
        assert_eq!(*sorted.first().unwrap(), 1, "ids start at 1");
    }

    #[tokio::test]
    async fn test_sequential_calls_use_strictly_increasing_ids() {
        let (client, mut server) = FakeServer::start();
        let client = Arc::new(client);

        for expected in 1..=4u64 {
            let c = client.clone();
            let call = tokio::spawn(async move { c.call("s", "m", vec![]).await });
            let frame = server.next_request().await;
            assert_eq!(frame.request_id(), expected);
            server.respond(frame.request_id(), ResponseBody::Void).await;
            call.await.unwrap().unwrap();
        }
    }

    #[tokio::test]
    async fn test_out_of_order_responses_reach_their_callers() {
        let (client, mut server) = FakeServer::start();
        let client = Arc::new(client);

        let c1 = client.clone();
        let first = tokio::spawn(async move { c1.call("s", "m", vec![Value::I32(1)]).await });
        let f1 = server.next_request().await;

        let c2 = client.clone();
        let second = tokio::spawn(async move { c2.call("s", "m", vec![Value::I32(2)]).await });
        let f2 = server.next_request().await;

        // Answer the second request first.
        server
            .respond(f2.request_id(), ResponseBody::Result(Value::Str("two".into())))
            .await;
        server
            .respond(f1.request_id(), ResponseBody::Result(Value::Str("one".into())))
            .await;

        assert_eq!(
            second.await.unwrap().unwrap(),
            Outcome::Value(Value::Str("two".into()))
        );
        assert_eq!(
            first.await.unwrap().unwrap(),
            Outcome::Value(Value::Str("one".into()))
        );
        assert_eq!(client.in_flight(), 0, "table empty after both claims");
    }

    #[tokio::test]
    async fn test_error_body_surfaces_as_rpc_error() {
        let (client, mut server) = FakeServer::start();

        let call = tokio::spawn(async move {
            client.call("wrongService", "multiply", vec![]).await
        });

        let frame = server.next_request().await;
        let err = RpcError::NoSuchService("service \"wrongService\" is not registered".into());
        server
            .respond(
                frame.request_id(),
                ResponseBody::from_outcome(Err(err.clone())),
            )
            .await;

        assert_eq!(call.await.unwrap().unwrap_err(), err);
    }

    #[tokio::test]
    async fn test_connection_loss_fans_out_to_all_pending() {
        let (client, mut server) = FakeServer::start();
        let client = Arc::new(client);

        let mut calls = Vec::new();
        for _ in 0..4 {
            let c = client.clone();
            calls.push(tokio::spawn(async move { c.call("s", "m", vec![]).await }));
        }
        for _ in 0..4 {
            server.next_request().await;
        }

        drop(server); // sever the connection

        for call in calls {
            let err = call.await.unwrap().unwrap_err();
            assert!(matches!(err, RpcError::ConnectionLost(_)), "got {err:?}");
        }

        // Later calls fail fast with the same terminal error.
        let err = client.call("s", "m", vec![]).await.unwrap_err();
        assert!(matches!(err, RpcError::ConnectionLost(_)));
    }

    #[tokio::test]
    async fn test_deadline_removes_entry_and_drops_late_response() {
        let (client, mut server) = FakeServer::start();
        let client = Arc::new(client);

        let c = client.clone();
        let call = tokio::spawn(async move {
            c.call_with_deadline("s", "slow", vec![], Duration::from_millis(20))
                .await
        });

        let frame = server.next_request().await;
        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, RpcError::DeadlineExceeded(_)));
        assert_eq!(client.in_flight(), 0, "expired entry removed from the middle");

        // The late response must be dropped, and the connection stays usable.
        server.respond(frame.request_id(), ResponseBody::Void).await;

        let c = client.clone();
        let next = tokio::spawn(async move { c.call("s", "m", vec![]).await });
        let frame = server.next_request().await;
        server
            .respond(frame.request_id(), ResponseBody::Result(Value::Bool(true)))
            .await;
        assert_eq!(
            next.await.unwrap().unwrap(),
            Outcome::Value(Value::Bool(true))
        );
    }

    #[tokio::test]
    async fn test_oversized_argument_fails_locally() {
        let (client, mut server) = FakeServer::start();
        let client = Arc::new(client);

        // An argument too large for a frame must fail before it is sent,
        // not by provoking the peer into severing the connection.
        let huge = vec![0u8; DEFAULT_MAX_PAYLOAD_SIZE as usize + 1];
        let err = client
            .call("s", "store", vec![Value::Bytes(huge)])
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::ProtocolDecodeError(_)), "got {err:?}");
        assert_eq!(client.in_flight(), 0, "failed call must not leak its entry");

        // The connection is untouched and keeps serving.
        let c = client.clone();
        let next = tokio::spawn(async move { c.call("s", "m", vec![]).await });
        let frame = server.next_request().await;
        server.respond(frame.request_id(), ResponseBody::Void).await;
        assert!(next.await.unwrap().unwrap().is_void());
    }

    #[tokio::test]
    async fn test_request_frame_from_server_is_protocol_error() {
        let (client, mut server) = FakeServer::start();

        let call = tokio::spawn(async move { client.call("s", "m", vec![]).await });
        let frame = server.next_request().await;

        // Servers never send request frames; this is a protocol violation.
        let bogus = Request::new("x", "y", vec![])
            .encode_frame(frame.request_id())
            .unwrap();
        server.stream.write_all(&bogus).await.unwrap();

        let err = call.await.unwrap().unwrap_err();
        assert!(matches!(err, RpcError::ProtocolDecodeError(_)), "got {err:?}");
    }
}
