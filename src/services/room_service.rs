//! Message router: validates client requests against room and identity state,
//! mutates rooms, and triggers broadcasts.
//!
//! Every failure is reported to the requesting connection only and leaves all
//! shared state untouched; validation runs to completion before any mutation.

use std::time::Duration;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::info;

use crate::{
    dto::ws::ServerMessage,
    error::RequestError,
    services::{countdown, websocket_service::send_message_to_websocket},
    state::{ConnectionId, SharedState, VoteOption, normalize_code},
};

/// Handle a `create` request: register the room, start its countdown, and
/// optionally auto-join the sender as a second, independently validated step.
pub async fn handle_create(
    state: &SharedState,
    conn_id: ConnectionId,
    tx: &mpsc::UnboundedSender<Message>,
    room_code: Option<String>,
    duration_secs: Option<u64>,
    username: Option<String>,
) -> Result<(), RequestError> {
    let requested = room_code
        .map(|raw| normalize_code(&raw))
        .filter(|code| !code.is_empty());
    let duration = duration_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| state.config().default_duration());

    let room = state.create_room(requested, duration)?;
    countdown::spawn(state.clone(), room.clone());
    info!(room = %room.code(), duration_secs = duration.as_secs(), "room created");

    let payload = {
        let inner = room.lock().await;
        room.state_payload(&inner)
    };
    send_message_to_websocket(
        tx,
        &ServerMessage::Created {
            room: room.code().to_string(),
            state: payload,
        },
    );

    let username = username
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    if let Some(username) = username {
        handle_join(state, conn_id, tx, room.code().to_string(), username).await?;
    }
    Ok(())
}

/// Handle a `join` request: bind the connection to an identity in the room
/// and announce the newcomer.
///
/// A connection that is already bound elsewhere is moved only after the new
/// bind succeeds, so a rejected join leaves the prior binding untouched.
pub async fn handle_join(
    state: &SharedState,
    conn_id: ConnectionId,
    tx: &mpsc::UnboundedSender<Message>,
    room_code: String,
    username: String,
) -> Result<(), RequestError> {
    let code = normalize_code(&room_code);
    let username = username.trim().to_string();
    if code.is_empty() || username.is_empty() {
        return Err(RequestError::MissingField);
    }

    let room = state.room(&code)?;

    let prior = state.hub().who_is(conn_id);
    state.hub().bind(conn_id, tx.clone(), &username, &room).await?;
    if let Some((old_username, old_code)) = prior {
        if old_code != code || old_username != username {
            announce_departure(state, conn_id, &old_username, &old_code).await;
        }
    }
    info!(room = %code, %username, "participant joined");

    let inner = room.lock().await;
    let payload = room.state_payload(&inner);
    send_message_to_websocket(
        tx,
        &ServerMessage::Joined {
            room: code,
            state: payload.clone(),
        },
    );
    state.hub().broadcast_locked(
        &inner,
        &ServerMessage::UserJoined {
            username,
            voters_count: inner.voters().len(),
        },
    );
    state
        .hub()
        .broadcast_locked(&inner, &ServerMessage::State(payload));
    Ok(())
}

/// Handle a `vote` request: admit at most one vote per identity while the
/// room is open, then broadcast the attributed vote and the new state.
pub async fn handle_vote(
    state: &SharedState,
    conn_id: ConnectionId,
    option_raw: &str,
) -> Result<(), RequestError> {
    let (username, code) = state.hub().who_is(conn_id).ok_or(RequestError::NotJoined)?;
    let room = state.room(&code)?;

    // Admission runs entirely inside the room's critical section: two racing
    // votes by the same identity serialize here, and exactly one is recorded.
    let mut inner = room.lock().await;
    if !inner.voting_open() {
        return Err(RequestError::VotingClosed);
    }
    let option = VoteOption::from_wire(option_raw).ok_or(RequestError::InvalidOption)?;
    inner.record_vote(&username, option)?;
    info!(room = %code, %username, ?option, "vote recorded");

    state.hub().broadcast_locked(
        &inner,
        &ServerMessage::VoteReceived {
            username,
            option,
        },
    );
    state
        .hub()
        .broadcast_locked(&inner, &ServerMessage::State(room.state_payload(&inner)));
    Ok(())
}

/// Handle a `leave` request. No-op when the connection is not bound.
pub async fn handle_leave(
    state: &SharedState,
    conn_id: ConnectionId,
) -> Result<(), RequestError> {
    detach_and_announce(state, conn_id).await;
    Ok(())
}

/// Implicit leave performed when a transport closes without a `leave` request.
pub async fn handle_disconnect(state: &SharedState, conn_id: ConnectionId) {
    detach_and_announce(state, conn_id).await;
}

/// Handle a `get_state` request: reply with a snapshot to the requester only.
pub async fn handle_get_state(
    state: &SharedState,
    tx: &mpsc::UnboundedSender<Message>,
    room_code: String,
) -> Result<(), RequestError> {
    let room = state.room(&room_code)?;
    let inner = room.lock().await;
    send_message_to_websocket(tx, &ServerMessage::State(room.state_payload(&inner)));
    Ok(())
}

/// Unbind a connection and, if it was attached, announce the departure to the
/// room. Vote records stay untouched.
async fn detach_and_announce(state: &SharedState, conn_id: ConnectionId) {
    let Some(entry) = state.hub().unbind(conn_id) else {
        return;
    };
    info!(room = %entry.room_code, username = %entry.username, "participant left");
    announce_departure(state, conn_id, &entry.username, &entry.room_code).await;
}

/// Release `username` in the room it was active in and broadcast the
/// departure. A no-op when the room was already disposed.
async fn announce_departure(
    state: &SharedState,
    conn_id: ConnectionId,
    username: &str,
    code: &str,
) {
    let Ok(room) = state.room(code) else {
        return;
    };
    let mut inner = room.lock().await;
    inner.detach(conn_id, username);
    state.hub().broadcast_locked(
        &inner,
        &ServerMessage::UserLeft {
            username: username.to_string(),
            voters_count: inner.voters().len(),
        },
    );
    state
        .hub()
        .broadcast_locked(&inner, &ServerMessage::State(room.state_payload(&inner)));
}
