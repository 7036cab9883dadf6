//! The room directory: a thin registry view over the live room actors,
//! decoupled from room logic.

use validator::Validate;

use crate::{
    dto::rooms::{CreateRoomRequest, RoomSummary},
    error::AppError,
    room::RoomHandle,
    state::SharedState,
};

fn summarize(handle: &RoomHandle) -> RoomSummary {
    let state = handle.latest();
    RoomSummary {
        code: handle.code().to_owned(),
        players: state.players.len(),
        phase: state.phase,
        round: state.round,
    }
}

/// Register a room, spawning its actor if it does not exist yet.
pub async fn register(state: &SharedState, request: CreateRoomRequest) -> Result<RoomSummary, AppError> {
    request.validate()?;
    let handle = state.ensure_room(&request.code, request.max_rounds).await;
    Ok(summarize(&handle))
}

/// List every live room.
pub fn list(state: &SharedState) -> Vec<RoomSummary> {
    state
        .rooms()
        .iter()
        .map(|entry| summarize(entry.value()))
        .collect()
}

/// Drop rooms that are finished or never got a player. Returns how many were
/// removed; their actors wind down once the last handle is dropped.
pub fn clear_idle(state: &SharedState) -> usize {
    let before = state.rooms().len();
    state.rooms().retain(|_, handle| {
        let room = handle.latest();
        !room.phase.is_terminal() && !room.players.is_empty()
    });
    before - state.rooms().len()
}
