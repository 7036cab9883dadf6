use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Build the current health payload while logging connectivity issues.
///
/// An installed store that fails its ping counts as degraded; the storage
/// supervisor will notice the same failure and clear it shortly after.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let storage_connected = match state.snapshot_store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                false
            }
        },
        None => {
            warn!("storage unavailable (degraded mode)");
            false
        }
    };

    HealthResponse::report(storage_connected, state.rooms().len())
}
