//! Error taxonomy for client requests plus the HTTP-facing error mapping.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

/// Errors produced while validating or applying a client request.
///
/// The `Display` form is the wire taxonomy token itself: it is sent verbatim
/// as the `message` of an `error` frame to the requesting connection, and
/// never broadcast to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestError {
    /// A room with the requested code is already registered.
    #[error("RoomAlreadyExists")]
    RoomAlreadyExists,
    /// No room with the requested code exists.
    #[error("RoomNotFound")]
    RoomNotFound,
    /// The username is already active in the room on another connection.
    #[error("UsernameTaken")]
    UsernameTaken,
    /// The action requires the connection to have joined a room first.
    #[error("NotJoined")]
    NotJoined,
    /// The room's countdown has expired and voting is closed.
    #[error("VotingClosed")]
    VotingClosed,
    /// The vote option is not one of the two valid values.
    #[error("InvalidOption")]
    InvalidOption,
    /// The username has already cast its one vote in this room.
    #[error("AlreadyVoted")]
    AlreadyVoted,
    /// A required field is absent or empty.
    #[error("MissingField")]
    MissingField,
    /// The message could not be decoded at all.
    #[error("InvalidPayload")]
    InvalidPayload,
    /// The message decoded but its `type` is not a known request kind.
    #[error("UnknownRequestType")]
    UnknownRequestType,
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<RequestError> for AppError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::RoomNotFound => AppError::NotFound(err.to_string()),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_wire_taxonomy_token() {
        assert_eq!(RequestError::AlreadyVoted.to_string(), "AlreadyVoted");
        assert_eq!(RequestError::RoomNotFound.to_string(), "RoomNotFound");
        assert_eq!(RequestError::UsernameTaken.to_string(), "UsernameTaken");
        assert_eq!(
            RequestError::UnknownRequestType.to_string(),
            "UnknownRequestType"
        );
    }

    #[test]
    fn room_not_found_maps_to_http_not_found() {
        let err: AppError = RequestError::RoomNotFound.into();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
