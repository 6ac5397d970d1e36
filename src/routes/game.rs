use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::game::{CreateGameRequest, CreatedGameResponse, GameSummary},
    error::AppError,
    services::{game_service, platform::authenticate_bearer},
    state::SharedState,
};

/// Routes handling game lifecycle operations outside the round loop.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/games/groups/{group_id}", post(create_game))
        .route("/games/groups/{group_id}/active", get(list_active_games))
        .route("/games/{game_id}", delete(delete_game))
}

/// Create a new game for a study group, acquiring its deck up front.
#[utoipa::path(
    post,
    path = "/games/groups/{group_id}",
    tag = "game",
    params(("group_id" = Uuid, Path, description = "Study group to create the game in")),
    request_body = CreateGameRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Game created", body = CreatedGameResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is not a member of the group"),
        (status = 500, description = "Content acquisition failed"),
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Path(group_id): Path<Uuid>,
    headers: HeaderMap,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<Json<CreatedGameResponse>, AppError> {
    let caller = authenticate_bearer(&state, &headers).await?;
    let created = game_service::create_game(&state, group_id, caller, payload).await?;
    Ok(Json(created))
}

/// List the non-archived games of a study group.
#[utoipa::path(
    get,
    path = "/games/groups/{group_id}/active",
    tag = "game",
    params(("group_id" = Uuid, Path, description = "Study group to list games for")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Active games of the group", body = [GameSummary]),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is not a member of the group"),
    )
)]
pub async fn list_active_games(
    State(state): State<SharedState>,
    Path(group_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Vec<GameSummary>>, AppError> {
    let caller = authenticate_bearer(&state, &headers).await?;
    let games = game_service::list_active_games(&state, group_id, &caller).await?;
    Ok(Json(games))
}

/// Delete a game. Allowed for the host and for group admins.
#[utoipa::path(
    delete,
    path = "/games/{game_id}",
    tag = "game",
    params(("game_id" = Uuid, Path, description = "Identifier of the game to delete")),
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Game deleted"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller may not delete this game"),
        (status = 404, description = "No such game"),
    )
)]
pub async fn delete_game(
    State(state): State<SharedState>,
    Path(game_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let caller = authenticate_bearer(&state, &headers).await?;
    game_service::delete_game(&state, game_id, &caller).await?;
    Ok(StatusCode::NO_CONTENT)
}
