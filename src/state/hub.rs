//! Connection hub binding live sockets to identities and fanning out broadcasts.

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::warn;

use crate::dto::ws::ServerMessage;
use crate::error::RequestError;
use crate::state::room::{ConnectionId, Room, RoomInner};

#[derive(Clone)]
/// Association of one live connection with its identity and room.
pub struct ConnectionEntry {
    /// Display name claimed by the participant.
    pub username: String,
    /// Code of the room the connection is attached to.
    pub room_code: String,
    /// Channel feeding the connection's dedicated writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Tracks live transport connections and their (username, room) bindings.
///
/// The hub only touches its own association table and the rooms' membership
/// sets; voters and tallies are out of its reach.
#[derive(Default)]
pub struct ConnectionHub {
    connections: DashMap<ConnectionId, ConnectionEntry>,
}

impl ConnectionHub {
    /// Bind a connection to `username` within `room`.
    ///
    /// Fails with [`RequestError::UsernameTaken`] when the name is already
    /// active in the room on another connection.
    pub async fn bind(
        &self,
        conn_id: ConnectionId,
        tx: mpsc::UnboundedSender<Message>,
        username: &str,
        room: &Room,
    ) -> Result<(), RequestError> {
        let mut inner = room.lock().await;
        if !inner.attach(conn_id, username) {
            return Err(RequestError::UsernameTaken);
        }
        self.connections.insert(
            conn_id,
            ConnectionEntry {
                username: username.to_string(),
                room_code: room.code().to_string(),
                tx,
            },
        );
        Ok(())
    }

    /// Remove a connection's binding, returning it. Idempotent: `None` when
    /// the connection was never bound or already unbound.
    ///
    /// Room membership is released separately by the caller, under the room
    /// lock it announces the departure with.
    pub fn unbind(&self, conn_id: ConnectionId) -> Option<ConnectionEntry> {
        self.connections.remove(&conn_id).map(|(_, entry)| entry)
    }

    /// Identity a connection is currently bound to, if any.
    pub fn who_is(&self, conn_id: ConnectionId) -> Option<(String, String)> {
        self.connections
            .get(&conn_id)
            .map(|entry| (entry.username.clone(), entry.room_code.clone()))
    }

    /// Deliver `message` to every connection attached to the room guarded by
    /// `inner`, serializing it once.
    ///
    /// Callers hold the room lock, so the recipient set is exactly the
    /// membership at one linearized point. Delivery to a connection that is
    /// mid-close is best-effort and never surfaces to the caller.
    pub fn broadcast_locked(&self, inner: &RoomInner, message: &ServerMessage) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "failed to serialize broadcast message");
                return;
            }
        };

        for conn_id in inner.connection_ids() {
            if let Some(entry) = self.connections.get(conn_id) {
                let _ = entry.tx.send(Message::Text(payload.clone().into()));
            }
        }
    }

    /// Lock `room` and deliver `message` to its current membership.
    pub async fn broadcast(&self, room: &Room, message: &ServerMessage) {
        let inner = room.lock().await;
        self.broadcast_locked(&inner, message);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uuid::Uuid;

    use super::*;

    fn test_room() -> Room {
        Room::new(
            "ABC234".into(),
            "Cats vs Dogs?".into(),
            Duration::from_secs(60),
        )
    }

    fn connection() -> (
        mpsc::UnboundedSender<Message>,
        mpsc::UnboundedReceiver<Message>,
    ) {
        mpsc::unbounded_channel()
    }

    #[tokio::test]
    async fn bind_rejects_active_username() {
        let hub = ConnectionHub::default();
        let room = test_room();
        let (tx_a, _rx_a) = connection();
        let (tx_b, _rx_b) = connection();

        hub.bind(Uuid::new_v4(), tx_a, "ansh", &room).await.unwrap();
        let err = hub
            .bind(Uuid::new_v4(), tx_b, "ansh", &room)
            .await
            .unwrap_err();
        assert_eq!(err, RequestError::UsernameTaken);
    }

    #[tokio::test]
    async fn username_can_rejoin_after_release() {
        let hub = ConnectionHub::default();
        let room = test_room();
        let first = Uuid::new_v4();
        let (tx_a, _rx_a) = connection();
        let (tx_b, _rx_b) = connection();

        hub.bind(first, tx_a, "ansh", &room).await.unwrap();
        let entry = hub.unbind(first).unwrap();
        assert_eq!(entry.username, "ansh");
        room.lock().await.detach(first, &entry.username);

        hub.bind(Uuid::new_v4(), tx_b, "ansh", &room).await.unwrap();
    }

    #[tokio::test]
    async fn unbind_is_idempotent() {
        let hub = ConnectionHub::default();
        let room = test_room();
        let conn = Uuid::new_v4();
        let (tx, _rx) = connection();

        assert!(hub.unbind(conn).is_none());

        hub.bind(conn, tx, "ansh", &room).await.unwrap();
        assert!(hub.unbind(conn).is_some());
        assert!(hub.unbind(conn).is_none());
        assert!(hub.who_is(conn).is_none());
    }

    #[tokio::test]
    async fn broadcast_reaches_every_member() {
        let hub = ConnectionHub::default();
        let room = test_room();
        let (tx_a, mut rx_a) = connection();
        let (tx_b, mut rx_b) = connection();

        hub.bind(Uuid::new_v4(), tx_a, "ansh", &room).await.unwrap();
        hub.bind(Uuid::new_v4(), tx_b, "mira", &room).await.unwrap();

        hub.broadcast(&room, &ServerMessage::Ended).await;

        for rx in [&mut rx_a, &mut rx_b] {
            let Some(Message::Text(text)) = rx.recv().await else {
                panic!("expected a text frame");
            };
            assert_eq!(text.as_str(), r#"{"type":"ended"}"#);
        }
    }
}
