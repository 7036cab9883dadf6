use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

use crate::{dao::snapshot::SnapshotEntity, state::game::GameState};

/// On-disk layout of a snapshot, keyed by room code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSnapshotDocument {
    #[serde(rename = "_id")]
    room: String,
    #[serde(default)]
    schema_version: u32,
    state: GameState,
    updated_at: DateTime,
}

impl From<SnapshotEntity> for MongoSnapshotDocument {
    fn from(value: SnapshotEntity) -> Self {
        Self {
            room: value.room,
            schema_version: value.schema_version,
            state: value.state,
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoSnapshotDocument> for SnapshotEntity {
    fn from(value: MongoSnapshotDocument) -> Self {
        Self {
            schema_version: value.schema_version,
            room: value.room,
            state: value.state,
            updated_at: value.updated_at.to_system_time(),
        }
    }
}
