use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Poll Battle Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::room::get_room_state,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::ServerMessage,
            crate::dto::ws::RoomStatePayload,
            crate::state::room::VoteOption,
            crate::state::room::VoteTallies,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "room", description = "Stateless room state queries"),
        (name = "poll", description = "WebSocket operations for poll participants"),
    )
)]
pub struct ApiDoc;
