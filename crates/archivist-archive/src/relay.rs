//! Chunked relay from the archiver's stdout to a response writer.
//!
//! # Design
//! - Each read returns what the archiver has produced so far, capped at `chunk_size`.
//! - Exactly one chunk is held at a time; it is handed to the writer and then dropped.
//! - Every suspension point races against consumer closure and server abort.
//! - No retries: the first IO error ends the relay and the caller cleans up.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::error::{ArchiveError, ArchiveResult, CancelReason};
use crate::shutdown::ShutdownWatch;

/// Chunk size used when none is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 512_000;

/// Relay tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySettings {
    /// Upper bound for a single forwarded chunk.
    pub chunk_size: usize,
    /// Pause between a chunk write and the next read (delay mode).
    pub delay: Option<Duration>,
}

impl RelaySettings {
    /// Settings with the given chunk size and no delay. A zero size is treated as one byte.
    #[must_use]
    pub const fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: if chunk_size == 0 { 1 } else { chunk_size },
            delay: None,
        }
    }

    /// Enable or disable the inter-chunk delay. A zero duration disables it.
    #[must_use]
    pub const fn with_delay(mut self, delay: Option<Duration>) -> Self {
        self.delay = match delay {
            Some(delay) if !delay.is_zero() => Some(delay),
            _ => None,
        };
        self
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

/// Totals for a relay run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    /// Chunks forwarded.
    pub chunks: u64,
    /// Bytes forwarded.
    pub bytes: u64,
}

/// Destination for archive chunks.
#[async_trait]
pub trait ChunkWriter: Send + Sync {
    /// Forward one chunk, waiting for the consumer to accept it.
    async fn write_chunk(&mut self, chunk: Bytes) -> ArchiveResult<()>;

    /// Resolves once the consumer has gone away.
    async fn closed(&self);
}

/// Item type carried by [`ChannelWriter`]: a chunk, or an error that aborts the body.
pub type BodyItem = Result<Bytes, io::Error>;

/// [`ChunkWriter`] over a bounded channel that feeds an HTTP body.
#[derive(Debug, Clone)]
pub struct ChannelWriter {
    sender: mpsc::Sender<BodyItem>,
}

impl ChannelWriter {
    /// Capacity of the body channel: one chunk may wait while the next is read.
    pub const CAPACITY: usize = 1;

    /// Create a writer and the receiver the response body reads from.
    #[must_use]
    pub fn channel() -> (Self, mpsc::Receiver<BodyItem>) {
        let (sender, receiver) = mpsc::channel(Self::CAPACITY);
        (Self { sender }, receiver)
    }

    /// How long [`Self::abort`] waits for a slot in a full channel.
    pub const ABORT_DELIVERY: Duration = Duration::from_secs(1);

    /// Push an error so the consumer terminates the body abruptly. Best effort.
    pub async fn abort(&self, error: io::Error) {
        match timeout(Self::ABORT_DELIVERY, self.sender.send(Err(error))).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => debug!("body consumer already gone; abort not delivered"),
            Err(_) => warn!("body consumer stalled; abort not delivered"),
        }
    }
}

#[async_trait]
impl ChunkWriter for ChannelWriter {
    async fn write_chunk(&mut self, chunk: Bytes) -> ArchiveResult<()> {
        self.sender
            .send(Ok(chunk))
            .await
            .map_err(|_| ArchiveError::cancelled(CancelReason::ClientDisconnected))
    }

    async fn closed(&self) {
        self.sender.closed().await;
    }
}

/// Pump `reader` into `writer` until end-of-stream.
///
/// # Errors
///
/// Returns [`ArchiveError::Cancelled`] when the consumer closes or the server aborts streams,
/// and [`ArchiveError::StreamIo`] when reading fails. Neither is retried.
pub async fn relay<R, W>(
    reader: &mut R,
    writer: &mut W,
    settings: &RelaySettings,
    shutdown: &mut ShutdownWatch,
) -> ArchiveResult<RelayStats>
where
    R: AsyncRead + Unpin + Send + ?Sized,
    W: ChunkWriter + ?Sized,
{
    let mut stats = RelayStats::default();
    loop {
        let mut buffer = BytesMut::with_capacity(settings.chunk_size);
        let read = tokio::select! {
            biased;
            () = shutdown.aborted() => {
                return Err(ArchiveError::cancelled(CancelReason::ServerShutdown));
            }
            () = writer.closed() => {
                return Err(ArchiveError::cancelled(CancelReason::ClientDisconnected));
            }
            result = reader.read_buf(&mut buffer) => {
                result.map_err(|source| ArchiveError::stream_io("archiver.read", source))?
            }
        };
        if read == 0 {
            debug!(chunks = stats.chunks, bytes = stats.bytes, "archive stream complete");
            return Ok(stats);
        }

        debug!(chunk = stats.chunks, bytes = read, "sending archive chunk");
        tokio::select! {
            biased;
            () = shutdown.aborted() => {
                return Err(ArchiveError::cancelled(CancelReason::ServerShutdown));
            }
            result = writer.write_chunk(buffer.freeze()) => result?,
        }
        stats.chunks += 1;
        stats.bytes += u64::try_from(read).unwrap_or(u64::MAX);

        if let Some(delay) = settings.delay {
            tokio::select! {
                biased;
                () = shutdown.aborted() => {
                    return Err(ArchiveError::cancelled(CancelReason::ServerShutdown));
                }
                () = writer.closed() => {
                    return Err(ArchiveError::cancelled(CancelReason::ClientDisconnected));
                }
                () = sleep(delay) => {}
            }
        }
    }
}
