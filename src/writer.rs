//! Dedicated writer task: the exclusive write path for one connection.
//!
//! Any number of tasks may hold a [`WriterHandle`]; frames funnel through an
//! mpsc channel into a single task that owns the socket's write half. The
//! channel serializes writers, so a frame is always emitted whole — the wire
//! never carries an interleaved partial frame.
//!
//! ```text
//! caller 1 ─┐
//! caller 2 ─┼─► mpsc::Sender<Bytes> ─► writer task ─► socket
//! caller N ─┘
//! ```
//!
//! The task batches frames that are already queued into one vectored write,
//! and exits cleanly once every handle is dropped.

use std::io::IoSlice;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, RpcError};

/// Default channel capacity for queued outbound frames.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Maximum frames folded into a single vectored write.
const MAX_BATCH_SIZE: usize = 32;

/// Handle for submitting complete frames to the writer task.
///
/// Cheaply cloneable; every dispatch task for a connection holds one.
#[derive(Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Bytes>,
}

impl WriterHandle {
    /// Queue one complete frame for writing.
    ///
    /// Fails with [`RpcError::ConnectionLost`] once the writer task has
    /// stopped (socket closed or write failure).
    pub async fn send(&self, frame: Bytes) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| RpcError::ConnectionLost("writer task stopped".into()))
    }
}

/// Spawn the writer task owning `writer`; returns the shared handle and the
/// task's join handle.
pub fn spawn_writer_task<W>(writer: W, channel_capacity: usize) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(channel_capacity);
    let task = tokio::spawn(writer_loop(rx, writer));
    (WriterHandle { tx }, task)
}

async fn writer_loop<W>(mut rx: mpsc::Receiver<Bytes>, mut writer: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = match rx.recv().await {
            Some(f) => f,
            // All handles dropped: clean shutdown.
            None => return Ok(()),
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match rx.try_recv() {
                Ok(frame) => batch.push(frame),
                Err(_) => break,
            }
        }

        write_batch(&mut writer, &batch).await?;
    }
}

/// Write a batch of frames with as few syscalls as the kernel allows.
async fn write_batch<W>(writer: &mut W, batch: &[Bytes]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total: usize = batch.iter().map(Bytes::len).sum();
    let mut written = 0usize;

    while written < total {
        let slices = remaining_slices(batch, written);
        let n = writer.write_vectored(&slices).await?;
        if n == 0 {
            return Err(RpcError::ConnectionLost("write returned 0 bytes".into()));
        }
        written += n;
    }

    writer.flush().await?;
    Ok(())
}

/// IoSlice views over the batch, skipping the bytes already written.
fn remaining_slices(batch: &[Bytes], skip: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len());
    let mut offset = 0usize;
    for frame in batch {
        let end = offset + frame.len();
        if skip < end {
            let start = skip.saturating_sub(offset);
            slices.push(IoSlice::new(&frame[start..]));
        }
        offset = end;
    }
    slices
}
