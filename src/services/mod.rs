/// Room registry operations behind the REST surface.
pub mod directory;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Storage connection supervision and reconnection.
pub mod storage_supervisor;
/// WebSocket session lifecycle for room clients.
pub mod websocket_service;
