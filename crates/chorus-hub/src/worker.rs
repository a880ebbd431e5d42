//! Per-connection relay worker: joins the hub, relays every inbound frame,
//! and always cleans up on the way out.

use std::sync::Arc;

use metrics::{counter, gauge, histogram};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, instrument};

use crate::connection::Connection;
use crate::error::ConnectionClosed;
use crate::hub::{EchoPolicy, Hub};
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// How a worker's relay loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerExit {
    /// The connection failed to receive (peer closed, transport error, or
    /// evicted by a broadcast).
    Disconnected,
    /// Server shutdown was requested.
    Shutdown,
    /// The relay loop panicked or was aborted.
    Panicked,
}

/// Serve one connection until it dies or the server shuts down.
///
/// 1. Joins `conn` into `hub`
/// 2. Runs the receive → broadcast loop in its own task
/// 3. Whatever ended the loop, leaves the hub and closes the connection
#[instrument(skip_all, fields(conn_id = %conn.id(), remote = %conn.remote_addr()))]
pub async fn serve_connection(
    hub: Arc<Hub>,
    conn: Arc<Connection>,
    policy: EchoPolicy,
    shutdown: CancellationToken,
) -> WorkerExit {
    hub.join(Arc::clone(&conn)).await;
    info!(members = hub.len(), "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let relay = tokio::spawn(
        relay_loop(Arc::clone(&hub), Arc::clone(&conn), policy, shutdown).in_current_span(),
    );
    let exit = match relay.await {
        Ok(exit) => exit,
        Err(e) => {
            error!(error = %e, "relay loop ended abnormally");
            WorkerExit::Panicked
        }
    };

    let _ = hub.leave(conn.id()).await;
    conn.close().await;

    info!(?exit, members = hub.len(), "client disconnected");
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(conn.age().as_secs_f64());
    exit
}

async fn relay_loop(
    hub: Arc<Hub>,
    conn: Arc<Connection>,
    policy: EchoPolicy,
    shutdown: CancellationToken,
) -> WorkerExit {
    let excluding = policy.excluding(conn.id());
    loop {
        let frame = tokio::select! {
            () = shutdown.cancelled() => return WorkerExit::Shutdown,
            received = conn.receive() => match received {
                Ok(frame) => frame,
                Err(ConnectionClosed) => return WorkerExit::Disconnected,
            },
        };
        let _ = hub.broadcast(&frame, excluding).await;
    }
}
