//! Room aggregate: tallies, voters, membership sets, and the voting flag.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::ws::RoomStatePayload;

/// Identifier assigned to each WebSocket connection for its lifetime.
pub type ConnectionId = Uuid;

/// One of the two fixed options a participant can vote for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum VoteOption {
    /// First option, serialized as `optionA`.
    #[serde(rename = "optionA")]
    OptionA,
    /// Second option, serialized as `optionB`.
    #[serde(rename = "optionB")]
    OptionB,
}

impl VoteOption {
    /// Parse the wire spelling of an option, `None` for anything else.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "optionA" => Some(Self::OptionA),
            "optionB" => Some(Self::OptionB),
            _ => None,
        }
    }
}

/// Running vote counts for both options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct VoteTallies {
    /// Votes cast for [`VoteOption::OptionA`].
    #[serde(rename = "optionA")]
    pub option_a: u32,
    /// Votes cast for [`VoteOption::OptionB`].
    #[serde(rename = "optionB")]
    pub option_b: u32,
}

impl VoteTallies {
    /// Sum of both counters.
    pub fn total(&self) -> u32 {
        self.option_a + self.option_b
    }

    fn increment(&mut self, option: VoteOption) {
        match option {
            VoteOption::OptionA => self.option_a += 1,
            VoteOption::OptionB => self.option_b += 1,
        }
    }
}

/// A single poll session identified by a short code.
///
/// The immutable parts (`code`, `question`, `deadline`) are plain fields;
/// everything mutable lives behind one [`Mutex`] so that votes, membership
/// changes, and countdown ticks for a room are linearized, and every
/// broadcast reflects a single consistent snapshot.
#[derive(Debug)]
pub struct Room {
    code: String,
    question: String,
    deadline: Instant,
    inner: Mutex<RoomInner>,
}

impl Room {
    /// Create a room whose countdown deadline is `duration` from now.
    pub fn new(code: String, question: String, duration: Duration) -> Self {
        Self {
            code,
            question,
            deadline: Instant::now() + duration,
            inner: Mutex::new(RoomInner::new()),
        }
    }

    /// Short shareable identifier, always uppercase.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Question displayed for this room.
    pub fn question(&self) -> &str {
        &self.question
    }

    /// Acquire the room's serialized critical section.
    pub async fn lock(&self) -> MutexGuard<'_, RoomInner> {
        self.inner.lock().await
    }

    /// Seconds until the deadline, rounded up, saturating at zero.
    pub fn time_left_secs(&self) -> u64 {
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
    }

    /// Build the full `state` payload from a held guard.
    pub fn state_payload(&self, inner: &RoomInner) -> RoomStatePayload {
        RoomStatePayload {
            room: self.code.clone(),
            question: self.question.clone(),
            votes: inner.tallies,
            total_votes: inner.tallies.total(),
            voting_open: inner.voting_open,
            time_left: self.time_left_secs(),
            voters_count: inner.voters.len(),
        }
    }
}

/// Mutable half of a [`Room`], only reachable through its lock.
#[derive(Debug)]
pub struct RoomInner {
    tallies: VoteTallies,
    voters: HashMap<String, VoteOption>,
    connections: HashSet<ConnectionId>,
    active_usernames: HashMap<String, ConnectionId>,
    voting_open: bool,
}

impl RoomInner {
    fn new() -> Self {
        Self {
            tallies: VoteTallies::default(),
            voters: HashMap::new(),
            connections: HashSet::new(),
            active_usernames: HashMap::new(),
            voting_open: true,
        }
    }

    /// Whether votes are currently admitted.
    pub fn voting_open(&self) -> bool {
        self.voting_open
    }

    /// Current tallies snapshot.
    pub fn tallies(&self) -> VoteTallies {
        self.tallies
    }

    /// Identity-to-option record; a key's presence means "has voted".
    pub fn voters(&self) -> &HashMap<String, VoteOption> {
        &self.voters
    }

    /// Connections currently attached to the room.
    pub fn connection_ids(&self) -> impl Iterator<Item = &ConnectionId> {
        self.connections.iter()
    }

    /// Record a vote for `username`, or fail if that identity already voted.
    ///
    /// Keeps the tallies sum equal to the voter count: both structures are
    /// updated in the same step or not at all.
    pub fn record_vote(
        &mut self,
        username: &str,
        option: VoteOption,
    ) -> Result<(), crate::error::RequestError> {
        if self.voters.contains_key(username) {
            return Err(crate::error::RequestError::AlreadyVoted);
        }
        self.voters.insert(username.to_string(), option);
        self.tallies.increment(option);
        Ok(())
    }

    /// Flip the room to closed. Returns true only for the transition that
    /// actually closed it, so repeated ticks stay idempotent.
    pub fn close(&mut self) -> bool {
        if self.voting_open {
            self.voting_open = false;
            true
        } else {
            false
        }
    }

    /// Attach a connection under `username`; false if that name is already
    /// owned by another connection in the room.
    pub(crate) fn attach(&mut self, conn_id: ConnectionId, username: &str) -> bool {
        match self.active_usernames.get(username) {
            Some(owner) if *owner != conn_id => false,
            _ => {
                self.connections.insert(conn_id);
                self.active_usernames.insert(username.to_string(), conn_id);
                true
            }
        }
    }

    /// Free `username` if this connection owns it, and drop the connection
    /// from the membership set once it owns no name in the room. Vote records
    /// are kept; votes are final for the round.
    pub(crate) fn detach(&mut self, conn_id: ConnectionId, username: &str) {
        if self.active_usernames.get(username) == Some(&conn_id) {
            self.active_usernames.remove(username);
        }
        if !self.active_usernames.values().any(|owner| *owner == conn_id) {
            self.connections.remove(&conn_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestError;

    fn open_room() -> Room {
        Room::new(
            "ABC234".into(),
            "Cats vs Dogs?".into(),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn tally_sum_matches_voter_count_after_each_vote() {
        let room = open_room();
        let mut inner = room.lock().await;

        inner.record_vote("ansh", VoteOption::OptionA).unwrap();
        assert_eq!(inner.tallies().total() as usize, inner.voters().len());

        inner.record_vote("mira", VoteOption::OptionB).unwrap();
        assert_eq!(inner.tallies().total() as usize, inner.voters().len());
        assert_eq!(inner.tallies().option_a, 1);
        assert_eq!(inner.tallies().option_b, 1);
    }

    #[tokio::test]
    async fn second_vote_by_same_identity_is_rejected_without_mutation() {
        let room = open_room();
        let mut inner = room.lock().await;

        inner.record_vote("ansh", VoteOption::OptionA).unwrap();
        let before = inner.tallies();

        let err = inner.record_vote("ansh", VoteOption::OptionB).unwrap_err();
        assert_eq!(err, RequestError::AlreadyVoted);
        assert_eq!(inner.tallies(), before);
        assert_eq!(inner.voters().get("ansh"), Some(&VoteOption::OptionA));
    }

    #[tokio::test]
    async fn close_transitions_exactly_once() {
        let room = open_room();
        let mut inner = room.lock().await;

        assert!(inner.voting_open());
        assert!(inner.close());
        assert!(!inner.close());
        assert!(!inner.voting_open());
    }

    #[tokio::test]
    async fn username_slot_is_freed_on_detach() {
        let room = open_room();
        let mut inner = room.lock().await;
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert!(inner.attach(first, "ansh"));
        assert!(!inner.attach(second, "ansh"));

        inner.detach(first, "ansh");
        assert!(inner.attach(second, "ansh"));
    }

    #[tokio::test]
    async fn detach_keeps_a_connection_that_still_owns_a_name() {
        let room = open_room();
        let mut inner = room.lock().await;
        let conn = Uuid::new_v4();

        assert!(inner.attach(conn, "ansh"));
        assert!(inner.attach(conn, "mira"));

        inner.detach(conn, "ansh");
        assert!(inner.connection_ids().any(|id| *id == conn));

        inner.detach(conn, "mira");
        assert!(inner.connection_ids().all(|id| *id != conn));
    }

    #[tokio::test(start_paused = true)]
    async fn time_left_rounds_up_to_whole_seconds() {
        let room = open_room();
        assert_eq!(room.time_left_secs(), 60);

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(room.time_left_secs(), 59);

        tokio::time::advance(Duration::from_secs(70)).await;
        assert_eq!(room.time_left_secs(), 0);
    }

    #[test]
    fn vote_option_wire_spellings() {
        assert_eq!(VoteOption::from_wire("optionA"), Some(VoteOption::OptionA));
        assert_eq!(VoteOption::from_wire("optionB"), Some(VoteOption::OptionB));
        assert_eq!(VoteOption::from_wire("optionC"), None);
        assert_eq!(VoteOption::from_wire(""), None);
    }
}
