//! In-process transport.
//!
//! Builds a [`Connection`] whose far end is a [`MemoryPeer`] held by the
//! caller. The peer plays the client: it pushes inbound frames, reads what
//! the server delivered, and can break either direction to simulate a dead
//! socket.

use std::net::SocketAddr;

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::{FutureExt, SinkExt, StreamExt};

use crate::connection::{Connection, FrameSink, FrameStream};
use crate::error::BoxError;
use crate::frame::Frame;

/// Client end of an in-process transport.
pub struct MemoryPeer {
    to_server: UnboundedSender<Frame>,
    from_server: UnboundedReceiver<Frame>,
}

impl MemoryPeer {
    /// Push a frame toward the server. Returns `false` once hung up.
    pub fn send(&self, frame: Frame) -> bool {
        self.to_server.unbounded_send(frame).is_ok()
    }

    /// Wait for the next frame delivered by the server.
    ///
    /// Returns `None` once the server side closed and everything queued has
    /// been read.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.from_server.next().await
    }

    /// Take a delivered frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.from_server.next().now_or_never().flatten()
    }

    /// Stop accepting deliveries; later server sends fail.
    pub fn break_delivery(&mut self) {
        self.from_server.close();
    }

    /// End the inbound stream, as a client disconnect would.
    pub fn hang_up(&self) {
        self.to_server.close_channel();
    }
}

/// Create a transport pair: server-side halves plus the client peer.
pub fn pair() -> (FrameSink, FrameStream, MemoryPeer) {
    let (to_server, inbound) = mpsc::unbounded::<Frame>();
    let (outbound, from_server) = mpsc::unbounded::<Frame>();
    let sink: FrameSink = Box::pin(outbound.sink_map_err(BoxError::from));
    let stream: FrameStream = Box::pin(inbound.map(Ok::<Frame, BoxError>));
    let peer = MemoryPeer {
        to_server,
        from_server,
    };
    (sink, stream, peer)
}

/// Create a [`Connection`] backed by an in-process transport.
pub fn connection(remote_addr: SocketAddr) -> (Connection, MemoryPeer) {
    let (sink, stream, peer) = pair();
    (Connection::new(remote_addr, sink, stream), peer)
}
