use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::game::GameState;

/// Messages pushed to room WebSocket clients.
///
/// The server only ever sends full state snapshots: one on connect and one
/// after every applied action. There are no partial diffs.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Full authoritative state, replacing whatever the client holds.
    #[serde(rename = "STATE_SYNC")]
    StateSync {
        /// The room state after the latest applied action.
        state: GameState,
    },
}
