//! Handle the full lifecycle of a participant WebSocket connection.

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    error::RequestError,
    services::room_service,
    state::{ConnectionId, SharedState},
};

/// Consecutive probe intervals without any inbound frame before a connection
/// is considered hung and dropped.
const MISSED_PROBE_LIMIT: u8 = 2;

/// Handle one connection end to end: attach, route messages, detach.
///
/// A dedicated writer task keeps outbound messages flowing even while we
/// await inbound frames, so a slow reader never stalls the room. Closing the
/// transport, a receive error, or a failed liveness probe all funnel into the
/// same implicit-leave cleanup.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let conn_id: ConnectionId = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    info!(%conn_id, "client connected");

    let mut probe = tokio::time::interval(state.config().probe_interval());
    probe.tick().await; // the first tick completes immediately
    let mut idle_probes: u8 = 0;

    loop {
        tokio::select! {
            message = receiver.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        idle_probes = 0;
                        handle_text(&state, conn_id, &outbound_tx, &text).await;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        idle_probes = 0;
                        let _ = outbound_tx.send(Message::Pong(payload));
                    }
                    Some(Ok(Message::Pong(_))) => {
                        idle_probes = 0;
                    }
                    Some(Ok(Message::Binary(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        warn!(%conn_id, error = %err, "websocket error");
                        break;
                    }
                }
            }
            _ = probe.tick() => {
                if idle_probes >= MISSED_PROBE_LIMIT {
                    warn!(%conn_id, "liveness probe failed; dropping connection");
                    break;
                }
                idle_probes += 1;
                if outbound_tx.send(Message::Ping(Bytes::new())).is_err() {
                    break;
                }
            }
        }
    }

    room_service::handle_disconnect(&state, conn_id).await;
    info!(%conn_id, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Decode one text frame and route it; failures become a single `error`
/// frame to this connection only.
async fn handle_text(
    state: &SharedState,
    conn_id: ConnectionId,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    text: &str,
) {
    let result = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => route(state, conn_id, outbound_tx, message).await,
        Err(err) => {
            warn!(%conn_id, error = %err, "failed to decode client message");
            Err(RequestError::InvalidPayload)
        }
    };

    if let Err(err) = result {
        send_message_to_websocket(
            outbound_tx,
            &ServerMessage::Error {
                message: err.to_string(),
            },
        );
    }
}

/// Dispatch a decoded request to the matching handler.
async fn route(
    state: &SharedState,
    conn_id: ConnectionId,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    message: ClientMessage,
) -> Result<(), RequestError> {
    match message {
        ClientMessage::Create {
            room,
            duration,
            username,
        } => room_service::handle_create(state, conn_id, outbound_tx, room, duration, username).await,
        ClientMessage::Join { room, username } => {
            room_service::handle_join(state, conn_id, outbound_tx, room, username).await
        }
        ClientMessage::Vote { option } => room_service::handle_vote(state, conn_id, &option).await,
        ClientMessage::Leave => room_service::handle_leave(state, conn_id).await,
        ClientMessage::GetState { room } => {
            room_service::handle_get_state(state, outbound_tx, room).await
        }
        ClientMessage::Unknown => Err(RequestError::UnknownRequestType),
    }
}

/// Serialize a payload and push it onto the provided writer channel.
///
/// Delivery is best-effort: a closed writer means the connection is going
/// away and its cleanup path will run shortly.
pub fn send_message_to_websocket<T>(tx: &mpsc::UnboundedSender<Message>, value: &T)
where
    T: ?Sized + serde::Serialize,
{
    match serde_json::to_string(value) {
        Ok(payload) => {
            let _ = tx.send(Message::Text(payload.into()));
        }
        Err(err) => {
            warn!(error = %err, "failed to serialize outbound message");
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
