//! A single client's message stream.

use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{BoxError, ConnectionClosed};
use crate::frame::Frame;

/// Outbound half of a transport.
pub type FrameSink = Pin<Box<dyn Sink<Frame, Error = BoxError> + Send>>;

/// Inbound half of a transport. The stream ending means the peer closed.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<Frame, BoxError>> + Send>>;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique, monotonically assigned connection identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next id.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn_{}", self.0)
    }
}

/// One established client stream plus its identity.
///
/// Receiving and sending are independent directions and may run from
/// different tasks at once. Sends are serialized so frames never interleave.
/// The first failure in either direction marks the connection dead for good.
pub struct Connection {
    id: ConnectionId,
    remote_addr: SocketAddr,
    sink: Mutex<FrameSink>,
    stream: Mutex<FrameStream>,
    alive: AtomicBool,
    closed: AtomicBool,
    /// Wakes a pending `receive` once the connection is closed locally.
    closing: CancellationToken,
    connected_at: Instant,
}

impl Connection {
    /// Wrap an established transport.
    pub fn new(remote_addr: SocketAddr, sink: FrameSink, stream: FrameStream) -> Self {
        Self {
            id: ConnectionId::next(),
            remote_addr,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
            alive: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            closing: CancellationToken::new(),
            connected_at: Instant::now(),
        }
    }

    /// Connection identity.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote address, for logging only.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Whether no send or receive has failed and the connection is not closed.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Wait for the next message from the peer.
    ///
    /// Fails with [`ConnectionClosed`] when the peer closes, the transport
    /// errors, or the connection is closed locally while waiting.
    pub async fn receive(&self) -> Result<Frame, ConnectionClosed> {
        if !self.is_alive() {
            return Err(ConnectionClosed);
        }
        let mut stream = self.stream.lock().await;
        let item = tokio::select! {
            () = self.closing.cancelled() => return Err(ConnectionClosed),
            item = stream.next() => item,
        };
        match item {
            Some(Ok(frame)) => Ok(frame),
            Some(Err(error)) => {
                debug!(conn_id = %self.id, error = %error, "receive failed");
                self.mark_dead();
                Err(ConnectionClosed)
            }
            None => {
                debug!(conn_id = %self.id, "peer closed stream");
                self.mark_dead();
                Err(ConnectionClosed)
            }
        }
    }

    /// Hand a message to the transport and wait until it is flushed.
    ///
    /// Concurrent callers are serialized; only one writer touches the sink at
    /// a time.
    pub async fn send(&self, frame: Frame) -> Result<(), ConnectionClosed> {
        if !self.is_alive() {
            return Err(ConnectionClosed);
        }
        let mut sink = self.sink.lock().await;
        // Another writer may have failed while we waited for the lock.
        if !self.is_alive() {
            return Err(ConnectionClosed);
        }
        if let Err(error) = sink.send(frame).await {
            debug!(conn_id = %self.id, error = %error, "send failed");
            self.mark_dead();
            return Err(ConnectionClosed);
        }
        Ok(())
    }

    /// Close the transport. Only the first call does any work.
    pub async fn close(&self) {
        self.mark_dead();
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.closing.cancel();
        let mut sink = self.sink.lock().await;
        if let Err(error) = sink.close().await {
            debug!(conn_id = %self.id, error = %error, "close failed");
        }
        debug!(conn_id = %self.id, remote = %self.remote_addr, "connection closed");
    }

    fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("remote_addr", &self.remote_addr)
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

impl std::hash::Hash for Connection {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
