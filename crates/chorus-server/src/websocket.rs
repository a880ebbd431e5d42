//! WebSocket upgrade handling and the axum socket ↔ frame adapters.

use std::future;
use std::net::SocketAddr;
use std::sync::Arc;

use ::metrics::counter;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::body::Bytes;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::{IntoResponse, Response};
use chorus_hub::{
    BoxError, Connection, Frame, FrameSink, FrameStream, TextPayload, serve_connection,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use crate::error::ServerError;
use crate::metrics::WS_HANDSHAKE_REJECTIONS_TOTAL;
use crate::server::AppState;

/// Convert an outbound frame to a WebSocket message of the same kind.
pub fn message_from_frame(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => {
            let bytes = text.into_bytes();
            match Utf8Bytes::try_from(bytes.clone()) {
                Ok(text) => Message::Text(text),
                Err(_) => Message::Binary(bytes),
            }
        }
        Frame::Binary(data) => Message::Binary(data),
    }
}

/// Convert an inbound WebSocket message to a frame.
///
/// Control messages yield `None`; axum answers pings itself.
pub fn frame_from_message(message: Message) -> Option<Frame> {
    match message {
        Message::Text(text) => TextPayload::from_utf8(Bytes::from(text)).ok().map(Frame::Text),
        Message::Binary(data) => Some(Frame::Binary(data)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) => None,
    }
}

/// Split an upgraded socket into the sink/stream pair a [`Connection`] owns.
///
/// The stream ends at the peer's close frame.
pub fn split_socket(socket: WebSocket) -> (FrameSink, FrameStream) {
    let (tx, rx) = socket.split();

    let sink = tx
        .sink_map_err(BoxError::from)
        .with(|frame: Frame| future::ready(Ok::<Message, BoxError>(message_from_frame(frame))));

    let stream = rx
        .take_while(|item| future::ready(!matches!(item, Ok(Message::Close(_)))))
        .filter_map(|item| {
            future::ready(match item {
                Ok(message) => frame_from_message(message).map(Ok::<Frame, BoxError>),
                Err(e) => Some(Err(BoxError::from(e))),
            })
        });

    (Box::pin(sink), Box::pin(stream))
}

/// GET `<ws_path>`
pub(crate) async fn ws_handler(
    State(state): State<AppState>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ServerError> {
    let upgrade = upgrade.map_err(|rejection| {
        counter!(WS_HANDSHAKE_REJECTIONS_TOTAL, "reason" => "not_upgrade").increment(1);
        warn!(remote = %remote_addr, reason = %rejection.body_text(), "websocket handshake rejected");
        ServerError::HandshakeRejected(rejection.body_text())
    })?;

    let limit = state.config.max_connections;
    if state.hub.len() >= limit {
        counter!(WS_HANDSHAKE_REJECTIONS_TOTAL, "reason" => "at_capacity").increment(1);
        warn!(remote = %remote_addr, limit, "connection limit reached, refusing upgrade");
        return Err(ServerError::AtCapacity { limit });
    }

    // Held until the worker has cleaned up, or dropped with the callback if
    // the upgrade never completes.
    let in_flight = state.shutdown.track_connection();
    Ok(upgrade
        .max_message_size(state.config.max_message_size)
        .on_failed_upgrade(move |e| {
            warn!(remote = %remote_addr, error = %e, "websocket upgrade failed");
        })
        .on_upgrade(move |socket| async move {
            run_socket(socket, remote_addr, state).await;
            drop(in_flight);
        })
        .into_response())
}

async fn run_socket(socket: WebSocket, remote_addr: SocketAddr, state: AppState) {
    let (sink, stream) = split_socket(socket);
    let conn = Arc::new(Connection::new(remote_addr, sink, stream));
    debug!(conn_id = %conn.id(), remote = %remote_addr, "websocket upgraded");

    let _ = serve_connection(
        state.hub,
        conn,
        state.config.echo,
        state.shutdown.token(),
    )
    .await;
}
