use axum::{
    Json, Router,
    extract::State,
    routing::{delete, get, post},
};
use serde_json::{Value, json};

use crate::{
    dto::rooms::{CreateRoomRequest, RoomSummary},
    error::AppError,
    services::directory,
    state::SharedState,
};

/// Routes for the room directory.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms", get(list_rooms))
        .route("/rooms", delete(clear_rooms))
}

/// Register a room, spawning its actor if needed.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room registered", body = RoomSummary),
        (status = 400, description = "Invalid room code")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Json(payload): Json<CreateRoomRequest>,
) -> Result<Json<RoomSummary>, AppError> {
    let summary = directory::register(&state, payload).await?;
    Ok(Json(summary))
}

/// List every live room.
#[utoipa::path(
    get,
    path = "/rooms",
    tag = "rooms",
    responses((status = 200, description = "Live rooms", body = [RoomSummary]))
)]
pub async fn list_rooms(State(state): State<SharedState>) -> Json<Vec<RoomSummary>> {
    Json(directory::list(&state))
}

/// Remove finished and empty rooms from the registry.
#[utoipa::path(
    delete,
    path = "/rooms",
    tag = "rooms",
    responses((status = 200, description = "Idle rooms cleared"))
)]
pub async fn clear_rooms(State(state): State<SharedState>) -> Json<Value> {
    let removed = directory::clear_idle(&state);
    Json(json!({ "removed": removed }))
}
