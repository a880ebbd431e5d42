//! # chorus-hub
//!
//! Connection registry and broadcast core.
//!
//! - [`Connection`]: one client's message stream, with serialized sends and a
//!   uniform [`ConnectionClosed`] failure
//! - [`Hub`]: the registry of live connections; join, leave, and broadcast
//!   with deferred eviction of members whose send failed
//! - [`worker::serve_connection`]: the per-connection receive → broadcast
//!   loop with guaranteed cleanup
//! - `memory` (with the `test-util` feature): an in-process transport for
//!   driving connections without a socket

#![deny(unsafe_code)]

pub mod connection;
pub mod error;
pub mod frame;
pub mod hub;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod metrics;
pub mod worker;

pub use connection::{Connection, ConnectionId, FrameSink, FrameStream};
pub use error::{BoxError, ConnectionClosed};
pub use frame::{Frame, FrameKind, TextPayload};
pub use hub::{BroadcastReport, EchoPolicy, Hub};
pub use worker::{WorkerExit, serve_connection};
