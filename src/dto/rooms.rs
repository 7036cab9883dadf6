use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::{dto::validation::validate_room_code, state::phase::GamePhase};

/// Payload used to register a room in the directory.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoomRequest {
    /// Four-character room code (A-Z, 0-9).
    pub code: String,
    /// Optional round budget override; the configured default applies when
    /// omitted.
    #[serde(default)]
    pub max_rounds: Option<u32>,
}

impl Validate for CreateRoomRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(e) = validate_room_code(&self.code) {
            errors.add("code", e);
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Directory listing entry for one active room.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoomSummary {
    /// Room code.
    pub code: String,
    /// Players currently on the roster.
    pub players: usize,
    /// Current game phase.
    pub phase: GamePhase,
    /// Current round number.
    pub round: u32,
}
