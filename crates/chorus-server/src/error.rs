//! Server error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The request is not a valid WebSocket upgrade. Never reaches the hub.
    #[error("not a websocket handshake: {0}")]
    HandshakeRejected(String),
    /// The hub is full.
    #[error("connection limit reached ({limit})")]
    AtCapacity {
        /// Configured maximum.
        limit: usize,
    },
    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        match self {
            Self::HandshakeRejected(_) => {
                (StatusCode::BAD_REQUEST, "Not a websocket handshake").into_response()
            }
            Self::AtCapacity { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response()
            }
            Self::Bind { .. } => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}
