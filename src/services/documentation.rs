use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Date Night Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::create_room,
        crate::routes::rooms::list_rooms,
        crate::routes::rooms::clear_rooms,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::rooms::CreateRoomRequest,
            crate::dto::rooms::RoomSummary,
            crate::dto::ws::ServerMessage,
            crate::room::reducer::Action,
            crate::state::game::GameState,
            crate::state::phase::GamePhase,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room directory operations"),
        (name = "ws", description = "WebSocket operations for room clients"),
    )
)]
pub struct ApiDoc;
