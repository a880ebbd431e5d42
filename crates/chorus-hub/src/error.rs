//! Connection error types.

use thiserror::Error;

/// Boxed transport error carried by [`FrameSink`](crate::FrameSink) and
/// [`FrameStream`](crate::FrameStream).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The single terminal failure of a [`Connection`](crate::Connection).
///
/// Returned by every receive or send failure regardless of cause: peer
/// closed, transport error, or the connection already being dead. Callers
/// only need to know the connection is no longer usable.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("connection closed")]
pub struct ConnectionClosed;

/// An echo policy name that does not parse.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown echo policy: {0} (expected include_sender or exclude_sender)")]
pub struct UnknownEchoPolicy(pub String);
