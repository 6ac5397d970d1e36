use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Speedround Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::game::create_game,
        crate::routes::game::list_active_games,
        crate::routes::game::delete_game,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::game::QuestionMode,
            crate::dto::game::CreateGameRequest,
            crate::dto::game::CreatedGameResponse,
            crate::dto::game::GameSummary,
            crate::dto::game::LeaderboardEntry,
            crate::dto::ws::ClientCommand,
            crate::dto::ws::PlayerInfo,
            crate::dto::ws::CardPrompt,
            crate::dto::ws::GameBroadcast,
            crate::state::game::GameStatus,
            crate::state::game::GameDifficulty,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "game", description = "Game lifecycle operations"),
        (name = "ws", description = "WebSocket operations for game rooms"),
    )
)]
pub struct ApiDoc;

/// Registers the bearer-token security scheme referenced by the game routes.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}
