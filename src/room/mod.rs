//! One actor task per room: the single writer of the authoritative state.
//!
//! Clients attach a transport sender and push actions; the actor applies the
//! reducer, persists a snapshot best-effort, and broadcasts the full resulting
//! state to every attached connection.

pub mod reducer;

use std::{collections::HashMap, sync::Arc, time::SystemTime};

use axum::extract::ws::Message;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        snapshot::{SNAPSHOT_SCHEMA_VERSION, SnapshotEntity},
        snapshot_store::SnapshotStore,
    },
    dto::ws::ServerMessage,
    room::reducer::{Action, Outcome, apply},
    state::game::GameState,
};

/// Commands accepted by a room actor.
enum RoomCommand {
    /// Register a connection and immediately send it the current state.
    Attach {
        conn_id: Uuid,
        tx: mpsc::UnboundedSender<Message>,
    },
    /// Remove a connection from the broadcast set.
    Detach { conn_id: Uuid },
    /// Apply an action originating from the given connection.
    Act { origin: Uuid, action: Action },
}

#[derive(Clone)]
/// Cheaply clonable handle to a running room actor.
pub struct RoomHandle {
    code: String,
    tx: mpsc::UnboundedSender<RoomCommand>,
    state_rx: watch::Receiver<GameState>,
}

impl RoomHandle {
    /// Room code this handle points at.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Register a connection; it receives a full state snapshot right away.
    pub fn attach(&self, conn_id: Uuid, tx: mpsc::UnboundedSender<Message>) {
        let _ = self.tx.send(RoomCommand::Attach { conn_id, tx });
    }

    /// Remove a connection from the broadcast set.
    pub fn detach(&self, conn_id: Uuid) {
        let _ = self.tx.send(RoomCommand::Detach { conn_id });
    }

    /// Submit an action on behalf of a connection.
    pub fn act(&self, origin: Uuid, action: Action) {
        let _ = self.tx.send(RoomCommand::Act { origin, action });
    }

    /// Watch the authoritative state as it evolves.
    pub fn subscribe(&self) -> watch::Receiver<GameState> {
        self.state_rx.clone()
    }

    /// Borrow the latest authoritative state.
    pub fn latest(&self) -> GameState {
        self.state_rx.borrow().clone()
    }
}

/// Spawn the actor for a room, restoring the last persisted snapshot when one
/// exists.
pub async fn spawn(
    code: String,
    max_rounds: u32,
    store: Option<Arc<dyn SnapshotStore>>,
) -> RoomHandle {
    let state = restore_or_fresh(&code, max_rounds, store.as_deref()).await;

    let (tx, rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(state.clone());

    let actor = RoomActor {
        code: code.clone(),
        state,
        connections: HashMap::new(),
        store,
        state_tx,
    };
    tokio::spawn(actor.run(rx));

    RoomHandle {
        code,
        tx,
        state_rx,
    }
}

async fn restore_or_fresh(
    code: &str,
    max_rounds: u32,
    store: Option<&dyn SnapshotStore>,
) -> GameState {
    if let Some(store) = store {
        match store.load(code).await {
            Ok(Some(snapshot)) => {
                info!(room = %code, "restored room from snapshot");
                return snapshot.state;
            }
            Ok(None) => {}
            Err(err) => {
                warn!(room = %code, error = %err, "failed to load snapshot; starting fresh");
            }
        }
    }
    GameState::new(max_rounds)
}

struct RoomActor {
    code: String,
    state: GameState,
    connections: HashMap<Uuid, mpsc::UnboundedSender<Message>>,
    store: Option<Arc<dyn SnapshotStore>>,
    state_tx: watch::Sender<GameState>,
}

impl RoomActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RoomCommand>) {
        info!(room = %self.code, "room actor started");

        while let Some(command) = rx.recv().await {
            match command {
                RoomCommand::Attach { conn_id, tx } => {
                    // Snapshot-on-join: full state right away, no replay.
                    if send_sync(&tx, &self.state).is_ok() {
                        self.connections.insert(conn_id, tx);
                    }
                }
                RoomCommand::Detach { conn_id } => {
                    self.connections.remove(&conn_id);
                }
                RoomCommand::Act { origin, action } => match apply(&mut self.state, action, origin)
                {
                    Outcome::Applied => {
                        self.persist().await;
                        self.broadcast();
                    }
                    Outcome::Ignored(reason) => {
                        debug!(room = %self.code, %origin, reason, "action ignored");
                    }
                },
            }
        }

        info!(room = %self.code, "room actor stopped");
    }

    /// Best-effort snapshot write; a failing store never blocks the room.
    async fn persist(&self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let snapshot = SnapshotEntity {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            room: self.code.clone(),
            state: self.state.clone(),
            updated_at: SystemTime::now(),
        };
        if let Err(err) = store.save(snapshot).await {
            warn!(room = %self.code, error = %err, "failed to persist snapshot");
        }
    }

    fn broadcast(&mut self) {
        let _ = self.state_tx.send(self.state.clone());

        let payload = match sync_payload(&self.state) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(room = %self.code, error = %err, "failed to serialize state sync");
                return;
            }
        };

        // Drop connections whose writer task is gone.
        self.connections
            .retain(|_, tx| tx.send(Message::Text(payload.clone().into())).is_ok());
    }
}

fn sync_payload(state: &GameState) -> serde_json::Result<String> {
    serde_json::to_string(&ServerMessage::StateSync {
        state: state.clone(),
    })
}

fn send_sync(tx: &mpsc::UnboundedSender<Message>, state: &GameState) -> Result<(), ()> {
    let payload = sync_payload(state).map_err(|err| {
        warn!(error = %err, "failed to serialize state sync");
    })?;
    tx.send(Message::Text(payload.into())).map_err(|_| ())
}
