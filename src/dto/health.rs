use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Overall status ("ok" or "degraded").
    pub status: String,
    /// Whether a snapshot store is installed and answering pings.
    pub storage: bool,
    /// Number of live rooms in the registry.
    pub rooms: usize,
}

impl HealthResponse {
    /// Build the health payload; the service is degraded whenever snapshots
    /// have nowhere to go.
    pub fn report(storage_connected: bool, rooms: usize) -> Self {
        let status = if storage_connected { "ok" } else { "degraded" };
        Self {
            status: status.to_owned(),
            storage: storage_connected,
            rooms,
        }
    }
}
