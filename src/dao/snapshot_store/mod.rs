//! Abstraction over snapshot persistence, with an in-memory implementation
//! for tests and degraded operation.

#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use futures::future::BoxFuture;

use crate::dao::{
    snapshot::{SnapshotEntity, migrate},
    storage::StorageResult,
};

/// Persistence backend for room snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Upsert the snapshot for its room.
    fn save(&self, snapshot: SnapshotEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load and migrate the snapshot for a room, if one exists.
    fn load(&self, room: &str) -> BoxFuture<'static, StorageResult<Option<SnapshotEntity>>>;
    /// Remove the snapshot for a room; returns whether one existed.
    fn delete(&self, room: &str) -> BoxFuture<'static, StorageResult<bool>>;
    /// Cheap liveness probe against the backend.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Rebuild the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Snapshot store backed by a process-local map. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemorySnapshotStore {
    rooms: Arc<Mutex<HashMap<String, SnapshotEntity>>>,
}

impl MemorySnapshotStore {
    /// Fresh, empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&self, snapshot: SnapshotEntity) -> BoxFuture<'static, StorageResult<()>> {
        let rooms = self.rooms.clone();
        Box::pin(async move {
            rooms
                .lock()
                .expect("snapshot map poisoned")
                .insert(snapshot.room.clone(), snapshot);
            Ok(())
        })
    }

    fn load(&self, room: &str) -> BoxFuture<'static, StorageResult<Option<SnapshotEntity>>> {
        let rooms = self.rooms.clone();
        let room = room.to_owned();
        Box::pin(async move {
            let found = rooms
                .lock()
                .expect("snapshot map poisoned")
                .get(&room)
                .cloned();
            found.map(migrate).transpose()
        })
    }

    fn delete(&self, room: &str) -> BoxFuture<'static, StorageResult<bool>> {
        let rooms = self.rooms.clone();
        let room = room.to_owned();
        Box::pin(async move {
            Ok(rooms
                .lock()
                .expect("snapshot map poisoned")
                .remove(&room)
                .is_some())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
