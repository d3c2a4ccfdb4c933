use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{dto::ws::RoomStatePayload, error::AppError, state::SharedState};

/// Routes exposing room state to plain HTTP clients.
pub fn router() -> Router<SharedState> {
    Router::new().route("/rooms/{code}", get(get_room_state))
}

/// Return a snapshot of a room without joining it.
#[utoipa::path(
    get,
    path = "/rooms/{code}",
    tag = "room",
    params(("code" = String, Path, description = "Room code, matched case-insensitively")),
    responses(
        (status = 200, description = "Current room state", body = RoomStatePayload),
        (status = 404, description = "No room with this code")
    )
)]
pub async fn get_room_state(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RoomStatePayload>, AppError> {
    let room = state.room(&code)?;
    let inner = room.lock().await;
    Ok(Json(room.state_payload(&inner)))
}
