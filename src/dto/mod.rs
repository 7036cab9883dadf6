/// Health check payloads.
pub mod health;
/// Room directory payloads.
pub mod rooms;
/// Field validators shared by the DTOs.
pub mod validation;
/// Messages pushed over the WebSocket.
pub mod ws;
