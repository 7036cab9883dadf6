//! Shared application state and the domain state types.

pub mod game;
pub mod phase;

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::{RwLock, watch};

use crate::{config::AppConfig, dao::snapshot_store::SnapshotStore, room, room::RoomHandle};

pub type SharedState = Arc<AppState>;

/// Central application state: the room registry and the storage handle.
pub struct AppState {
    config: AppConfig,
    rooms: DashMap<String, RoomHandle>,
    snapshot_store: RwLock<Option<Arc<dyn SnapshotStore>>>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            rooms: DashMap::new(),
            snapshot_store: RwLock::new(None),
            degraded: degraded_tx,
        })
    }

    /// Runtime configuration shared across the application.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current snapshot store, if one is installed.
    pub async fn snapshot_store(&self) -> Option<Arc<dyn SnapshotStore>> {
        let guard = self.snapshot_store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new snapshot store implementation and leave degraded mode.
    pub async fn install_snapshot_store(&self, store: Arc<dyn SnapshotStore>) {
        {
            let mut guard = self.snapshot_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current snapshot store and enter degraded mode.
    pub async fn clear_snapshot_store(&self) {
        {
            let mut guard = self.snapshot_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.snapshot_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    fn update_degraded(&self, value: bool) {
        let _ = self.degraded.send(value);
    }

    /// Registry of live room actors keyed by room code.
    pub fn rooms(&self) -> &DashMap<String, RoomHandle> {
        &self.rooms
    }

    /// Get the actor for a room code, spawning it if necessary.
    ///
    /// A concurrent call for the same code can spawn a second actor; the loser
    /// of the registry race drops its handle and the orphan actor winds down
    /// with it.
    pub async fn ensure_room(&self, code: &str, max_rounds: Option<u32>) -> RoomHandle {
        if let Some(existing) = self.rooms.get(code) {
            return existing.clone();
        }

        let store = self.snapshot_store().await;
        let handle = room::spawn(
            code.to_owned(),
            max_rounds.unwrap_or(self.config.max_rounds),
            store,
        )
        .await;

        match self.rooms.entry(code.to_owned()) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                slot.insert(handle.clone());
                handle
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::snapshot_store::MemorySnapshotStore;

    #[tokio::test]
    async fn ensure_room_reuses_the_existing_actor() {
        let state = AppState::new(AppConfig::default());
        let first = state.ensure_room("ABCD", None).await;
        let second = state.ensure_room("ABCD", Some(3)).await;

        // Same actor: the second call's budget override is ignored.
        assert_eq!(first.code(), second.code());
        assert_eq!(second.latest().max_rounds, AppConfig::default().max_rounds);
        assert_eq!(state.rooms().len(), 1);
    }

    #[tokio::test]
    async fn degraded_follows_store_installation() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded().await);

        state
            .install_snapshot_store(Arc::new(MemorySnapshotStore::new()))
            .await;
        assert!(!state.is_degraded().await);

        state.clear_snapshot_store().await;
        assert!(state.is_degraded().await);
    }
}
