//! Per-room countdown: ticks once a second, closes the room at the deadline,
//! and disposes of it after a grace period.

use std::{sync::Arc, time::Duration};

use tokio::time::{interval, sleep};
use tracing::{debug, info};

use crate::{
    dto::ws::ServerMessage,
    state::{Room, SharedState},
};

/// Spawn the countdown task driving `room` from open to closed.
///
/// Started once per room at creation; the deadline is never extended or
/// restarted for this room instance.
pub fn spawn(state: SharedState, room: Arc<Room>) {
    tokio::spawn(run(state, room));
}

async fn run(state: SharedState, room: Arc<Room>) {
    // Announce the initial state so early joiners see the clock immediately.
    {
        let inner = room.lock().await;
        state
            .hub()
            .broadcast_locked(&inner, &ServerMessage::State(room.state_payload(&inner)));
    }

    let mut ticker = interval(Duration::from_secs(1));
    ticker.tick().await; // the first tick completes immediately

    loop {
        ticker.tick().await;
        let time_left = room.time_left_secs();

        let mut inner = room.lock().await;
        state
            .hub()
            .broadcast_locked(&inner, &ServerMessage::Timer { time_left });

        if time_left == 0 {
            // close() makes the transition idempotent against repeated ticks
            if inner.close() {
                state.hub().broadcast_locked(&inner, &ServerMessage::Ended);
                state
                    .hub()
                    .broadcast_locked(&inner, &ServerMessage::State(room.state_payload(&inner)));
                info!(room = %room.code(), "voting ended");
            }
            break;
        }
    }

    // Explicit disposal policy: a closed room stays queryable for a grace
    // period, then leaves the registry for good.
    sleep(state.config().closed_room_ttl()).await;
    state.remove_room(room.code());
    debug!(room = %room.code(), "room disposed");
}

#[cfg(test)]
mod tests {
    use axum::extract::ws::Message;
    use serde_json::Value;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::*;
    use crate::{config::AppConfig, error::RequestError, state::AppState};

    async fn next_json(rx: &mut mpsc::UnboundedReceiver<Message>) -> Value {
        let Some(Message::Text(text)) = rx.recv().await else {
            panic!("expected a text frame");
        };
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_closes_the_room_exactly_once_and_announces_it() {
        let state = AppState::new(AppConfig::default());
        let room = state
            .create_room(Some("ABC234".into()), Duration::from_secs(2))
            .unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        state
            .hub()
            .bind(Uuid::new_v4(), tx, "ansh", &room)
            .await
            .unwrap();

        spawn(state.clone(), room.clone());

        let initial = next_json(&mut rx).await;
        assert_eq!(initial["type"], "state");
        assert_eq!(initial["votingOpen"], true);
        assert!(initial["timeLeft"].as_u64().unwrap() <= 2);

        let mut timer_values = Vec::new();
        loop {
            let message = next_json(&mut rx).await;
            match message["type"].as_str().unwrap() {
                "timer" => timer_values.push(message["timeLeft"].as_u64().unwrap()),
                "ended" => break,
                other => panic!("unexpected message type {other}"),
            }
        }
        assert_eq!(timer_values.last(), Some(&0));
        assert!(timer_values.windows(2).all(|pair| pair[0] >= pair[1]));

        let final_state = next_json(&mut rx).await;
        assert_eq!(final_state["type"], "state");
        assert_eq!(final_state["votingOpen"], false);
        assert_eq!(final_state["timeLeft"], 0);

        assert!(!room.lock().await.voting_open());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_room_is_disposed_after_the_grace_period() {
        let state = AppState::new(AppConfig::default());
        let room = state
            .create_room(Some("ABC234".into()), Duration::from_secs(1))
            .unwrap();

        spawn(state.clone(), room.clone());

        // run past the deadline and the disposal grace period
        let ttl = state.config().closed_room_ttl();
        tokio::time::sleep(Duration::from_secs(2) + ttl).await;

        assert_eq!(
            state.room("ABC234").unwrap_err(),
            RequestError::RoomNotFound
        );
    }
}
