//! Business logic layered between the routes and the shared state.

/// Per-room countdown task and closed-room disposal.
pub mod countdown;
/// OpenAPI documentation generation.
pub mod documentation;
/// Request validation, room mutation, and broadcasts.
pub mod room_service;
/// WebSocket connection and message handling service.
pub mod websocket_service;
