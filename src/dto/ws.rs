//! WebSocket wire shapes for client requests and server notifications.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::room::{VoteOption, VoteTallies};

#[derive(Debug, Deserialize, ToSchema)]
/// Messages accepted from poll WebSocket clients.
///
/// Fields the original protocol treats as optional default to empty strings;
/// the router turns those into the precise taxonomy error (`MissingField`,
/// `InvalidOption`) instead of a blanket decode failure.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a room, optionally auto-joining the sender.
    Create {
        /// Requested room code; generated when absent or empty.
        #[serde(default)]
        room: Option<String>,
        /// Countdown duration in seconds; server default when absent.
        #[serde(default)]
        duration: Option<u64>,
        /// When present, the sender is joined right after creation.
        #[serde(default)]
        username: Option<String>,
    },
    /// Join an existing room under a display name.
    Join {
        /// Code of the room to join.
        #[serde(default)]
        room: String,
        /// Display name, unique among the room's active participants.
        #[serde(default)]
        username: String,
    },
    /// Cast the sender's one vote.
    Vote {
        /// Wire spelling of the chosen option (`optionA` or `optionB`).
        #[serde(default)]
        option: String,
    },
    /// Detach from the current room.
    Leave,
    /// Request a one-off state snapshot for a room.
    GetState {
        /// Code of the room to inspect.
        #[serde(default)]
        room: String,
    },
    /// Catch-all for request kinds this server does not know.
    #[serde(other)]
    Unknown,
}

/// Full room snapshot sent as the `state` message and by the HTTP query.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatePayload {
    /// Room code.
    pub room: String,
    /// Question being voted on.
    pub question: String,
    /// Per-option tallies.
    pub votes: VoteTallies,
    /// Sum of both tallies.
    pub total_votes: u32,
    /// Whether votes are still admitted.
    pub voting_open: bool,
    /// Whole seconds until the countdown expires, zero once closed.
    pub time_left: u64,
    /// Number of identities that have voted.
    pub voters_count: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Messages pushed to poll WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full room snapshot.
    State(RoomStatePayload),
    /// Acknowledgement of a successful create, sent to the requester only.
    Created {
        /// Code of the new room.
        room: String,
        /// Snapshot taken right after creation.
        state: RoomStatePayload,
    },
    /// Acknowledgement of a successful join, sent to the requester only.
    Joined {
        /// Code of the joined room.
        room: String,
        /// Snapshot taken at join time.
        state: RoomStatePayload,
    },
    /// A participant attached to the room.
    UserJoined {
        /// Display name of the participant.
        username: String,
        /// Voter count at the time of the join.
        #[serde(rename = "votersCount")]
        voters_count: usize,
    },
    /// A participant detached from the room.
    UserLeft {
        /// Display name of the participant.
        username: String,
        /// Voter count at the time of the leave.
        #[serde(rename = "votersCount")]
        voters_count: usize,
    },
    /// A vote was accepted; attributed to its voter.
    VoteReceived {
        /// Identity that cast the vote.
        username: String,
        /// Option the vote went to.
        option: VoteOption,
    },
    /// Periodic countdown tick.
    Timer {
        /// Whole seconds remaining.
        #[serde(rename = "timeLeft")]
        time_left: u64,
    },
    /// Terminal notice that voting closed.
    Ended,
    /// Request failure, sent to the offending connection only.
    Error {
        /// Wire taxonomy token naming the failure.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn state_message_uses_camel_case_field_names() {
        let message = ServerMessage::State(RoomStatePayload {
            room: "ABC234".into(),
            question: "Cats vs Dogs?".into(),
            votes: VoteTallies {
                option_a: 2,
                option_b: 1,
            },
            total_votes: 3,
            voting_open: true,
            time_left: 42,
            voters_count: 3,
        });

        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "state",
                "room": "ABC234",
                "question": "Cats vs Dogs?",
                "votes": {"optionA": 2, "optionB": 1},
                "totalVotes": 3,
                "votingOpen": true,
                "timeLeft": 42,
                "votersCount": 3,
            })
        );
    }

    #[test]
    fn notification_shapes_match_the_wire_contract() {
        let timer = serde_json::to_value(&ServerMessage::Timer { time_left: 5 }).unwrap();
        assert_eq!(timer, json!({"type": "timer", "timeLeft": 5}));

        let ended = serde_json::to_value(&ServerMessage::Ended).unwrap();
        assert_eq!(ended, json!({"type": "ended"}));

        let vote = serde_json::to_value(&ServerMessage::VoteReceived {
            username: "ansh".into(),
            option: VoteOption::OptionB,
        })
        .unwrap();
        assert_eq!(
            vote,
            json!({"type": "vote_received", "username": "ansh", "option": "optionB"})
        );
    }

    #[test]
    fn unknown_request_kinds_decode_to_the_catch_all_variant() {
        let message: ClientMessage = serde_json::from_str(r#"{"type":"shout"}"#).unwrap();
        assert!(matches!(message, ClientMessage::Unknown));
    }

    #[test]
    fn absent_optional_fields_decode_to_defaults() {
        let message: ClientMessage = serde_json::from_str(r#"{"type":"create"}"#).unwrap();
        let ClientMessage::Create {
            room,
            duration,
            username,
        } = message
        else {
            panic!("expected a create request");
        };
        assert_eq!(room, None);
        assert_eq!(duration, None);
        assert_eq!(username, None);

        let message: ClientMessage = serde_json::from_str(r#"{"type":"join"}"#).unwrap();
        let ClientMessage::Join { room, username } = message else {
            panic!("expected a join request");
        };
        assert!(room.is_empty());
        assert!(username.is_empty());
    }
}
