//! Per-connection WebSocket plumbing for room clients.
//!
//! Each connection gets a dedicated writer task so broadcasts keep flowing
//! while we await inbound frames. The first message must be a `JOIN` action;
//! after that every parsed action is forwarded to the room actor, which is
//! free to ignore it.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::validation::{validate_player_name, validate_room_code},
    room::reducer::Action,
    state::SharedState,
};

const JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle for an individual room WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket, room_code: String) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we
    // await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    if let Err(err) = validate_room_code(&room_code) {
        warn!(room = %room_code, error = %err, "rejecting connection to invalid room code");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }

    let initial_message = match tokio::time::timeout(JOIN_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!(room = %room_code, "websocket join timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let join = match serde_json::from_str::<Action>(&initial_message) {
        Ok(action @ Action::Join { .. }) => action,
        Ok(_) => {
            warn!(room = %room_code, "first message was not a join");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(err) => {
            warn!(room = %room_code, error = %err, "failed to parse join message");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    if let Action::Join { name, .. } = &join {
        if let Err(err) = validate_player_name(name) {
            warn!(room = %room_code, error = %err, "rejecting join with invalid name");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    }

    let conn_id = Uuid::new_v4();
    let handle = state.ensure_room(&room_code, None).await;

    // Attach first: the snapshot must be on the wire before the join's
    // broadcast so the client never observes state it has no baseline for.
    handle.attach(conn_id, outbound_tx.clone());
    handle.act(conn_id, join);
    info!(room = %room_code, %conn_id, "client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<Action>(&text) {
                Ok(action) => handle.act(conn_id, action),
                Err(err) => {
                    warn!(room = %room_code, %conn_id, error = %err, "failed to parse client action");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(room = %room_code, %conn_id, error = %err, "websocket error");
                break;
            }
        }
    }

    // Disconnect is not a leave: the player keeps their roster slot and can
    // rejoin with the same id on a fresh connection.
    handle.detach(conn_id);
    info!(room = %room_code, %conn_id, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
