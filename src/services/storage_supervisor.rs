//! Keeps the snapshot store connected, flipping the application in and out of
//! degraded mode as the backend comes and goes.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{snapshot_store::SnapshotStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend, watch its health, and reconnect with
/// backoff when it fails. Runs until the process exits.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn SnapshotStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_snapshot_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                watch_health(store.as_ref()).await;

                warn!("storage lost; entering degraded mode");
                state.clear_snapshot_store().await;
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Poll the store until it is deemed lost (health check failing and every
/// reconnect attempt exhausted).
async fn watch_health(store: &dyn SnapshotStore) {
    loop {
        match store.health_check().await {
            Ok(()) => sleep(HEALTH_POLL_INTERVAL).await,
            Err(err) => {
                warn!(error = %err, "storage health check failed; attempting reconnect");

                let mut attempt = 0;
                let mut reconnect_delay = INITIAL_DELAY;
                while attempt < MAX_RECONNECT_ATTEMPTS {
                    match store.try_reconnect().await {
                        Ok(()) => {
                            info!("storage reconnection succeeded after health check failure");
                            break;
                        }
                        Err(reconnect_err) => {
                            warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                            attempt += 1;
                            sleep(reconnect_delay).await;
                            reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                        }
                    }
                }

                if attempt >= MAX_RECONNECT_ATTEMPTS {
                    warn!("exhausted storage reconnect attempts");
                    return;
                }
            }
        }
    }
}
