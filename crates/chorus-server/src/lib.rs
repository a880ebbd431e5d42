//! # chorus-server
//!
//! Axum HTTP + `WebSocket` gateway around the broadcast hub.
//!
//! - `GET /`: the chat page
//! - `GET /sock` (configurable): `WebSocket` upgrade, one relay worker per
//!   client
//! - `GET /health`, `GET /metrics`: liveness and Prometheus exposition
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod page;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::ChorusServer;
