//! The persisted room snapshot and its schema versioning.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{
    dao::storage::{StorageError, StorageResult},
    state::game::GameState,
};

/// Version written into every new snapshot.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Full room state as written after every applied action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SnapshotEntity {
    /// Schema version of `state`; snapshots written before versioning was
    /// introduced deserialize to 0 and are treated as version 1.
    #[serde(default)]
    pub schema_version: u32,
    /// Room code the snapshot belongs to.
    pub room: String,
    /// The authoritative state at the time of the write.
    pub state: GameState,
    /// When the snapshot was written.
    pub updated_at: SystemTime,
}

/// Bring a loaded snapshot up to the current schema version.
///
/// Rejects snapshots written by a newer build instead of guessing at their
/// layout; the room then starts fresh.
pub fn migrate(mut snapshot: SnapshotEntity) -> StorageResult<SnapshotEntity> {
    match snapshot.schema_version {
        // 0 is the pre-versioning era, identical to version 1 in layout.
        0 | SNAPSHOT_SCHEMA_VERSION => {
            snapshot.schema_version = SNAPSHOT_SCHEMA_VERSION;
            Ok(snapshot)
        }
        newer => Err(StorageError::corrupt(
            snapshot.room,
            format!("snapshot schema version {newer} is newer than this build supports"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(version: u32) -> SnapshotEntity {
        SnapshotEntity {
            schema_version: version,
            room: "ABCD".into(),
            state: GameState::new(6),
            updated_at: SystemTime::now(),
        }
    }

    #[test]
    fn unversioned_snapshots_migrate_to_current() {
        let migrated = migrate(snapshot(0)).unwrap();
        assert_eq!(migrated.schema_version, SNAPSHOT_SCHEMA_VERSION);
    }

    #[test]
    fn current_version_passes_through() {
        let migrated = migrate(snapshot(SNAPSHOT_SCHEMA_VERSION)).unwrap();
        assert_eq!(migrated.schema_version, SNAPSHOT_SCHEMA_VERSION);
    }

    #[test]
    fn future_versions_are_rejected() {
        let err = migrate(snapshot(SNAPSHOT_SCHEMA_VERSION + 1)).unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[test]
    fn missing_version_field_deserializes_to_zero() {
        let json = serde_json::to_value(snapshot(1)).unwrap();
        let mut stripped = json.clone();
        stripped.as_object_mut().unwrap().remove("schema_version");
        let parsed: SnapshotEntity = serde_json::from_value(stripped).unwrap();
        assert_eq!(parsed.schema_version, 0);
    }
}
