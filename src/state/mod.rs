//! Shared application state: the room registry and the connection hub.

pub mod hub;
pub mod room;

use std::{sync::Arc, time::Duration};

use dashmap::{DashMap, mapref::entry::Entry};
use rand::Rng;

pub use self::hub::{ConnectionEntry, ConnectionHub};
pub use self::room::{ConnectionId, Room, VoteOption, VoteTallies};
use crate::{config::AppConfig, error::RequestError};

/// Cheaply clonable handle to [`AppState`].
pub type SharedState = Arc<AppState>;

/// Alphabet for generated room codes, excluding visually confusable
/// characters (I, L, O, 0, 1).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
/// Fixed length of generated room codes.
const CODE_LENGTH: usize = 6;

/// Central application state owning every room and the connection hub.
///
/// All room mutation goes through the per-room lock; the registry itself is
/// only touched on create and disposal.
pub struct AppState {
    config: AppConfig,
    rooms: DashMap<String, Arc<Room>>,
    hub: ConnectionHub,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self {
            config,
            rooms: DashMap::new(),
            hub: ConnectionHub::default(),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Hub tracking live connections and their identities.
    pub fn hub(&self) -> &ConnectionHub {
        &self.hub
    }

    /// Register a new room under `code`, or under a freshly generated code
    /// when none is given.
    ///
    /// The caller is responsible for starting the room's countdown task; the
    /// registry itself stays runtime-agnostic so it can be exercised in
    /// plain unit tests.
    pub fn create_room(
        &self,
        code: Option<String>,
        duration: Duration,
    ) -> Result<Arc<Room>, RequestError> {
        match code {
            Some(raw) => self.insert_room(normalize_code(&raw), duration),
            None => loop {
                // regenerate on the (unlikely) collision with a concurrent create
                if let Ok(room) = self.insert_room(self.generate_code(), duration) {
                    break Ok(room);
                }
            },
        }
    }

    /// Look up a room by its (case-insensitive) code.
    pub fn room(&self, code: &str) -> Result<Arc<Room>, RequestError> {
        self.rooms
            .get(&normalize_code(code))
            .map(|entry| entry.value().clone())
            .ok_or(RequestError::RoomNotFound)
    }

    /// Drop a room from the registry. Used by the disposal policy once a
    /// closed room's grace period has elapsed.
    pub fn remove_room(&self, code: &str) {
        self.rooms.remove(&normalize_code(code));
    }

    /// Number of rooms currently registered.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn insert_room(&self, code: String, duration: Duration) -> Result<Arc<Room>, RequestError> {
        match self.rooms.entry(code) {
            Entry::Occupied(_) => Err(RequestError::RoomAlreadyExists),
            Entry::Vacant(slot) => {
                let room = Arc::new(Room::new(
                    slot.key().clone(),
                    self.config.question().to_string(),
                    duration,
                ));
                slot.insert(room.clone());
                Ok(room)
            }
        }
    }

    fn generate_code(&self) -> String {
        let mut rng = rand::rng();
        (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
            .collect()
    }
}

/// Normalize a room code for lookup: trimmed and uppercased.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}
