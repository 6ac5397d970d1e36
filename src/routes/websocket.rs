use axum::{
    Router,
    extract::{Path, Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    dao::game_store::GameStore,
    error::{AppError, ServiceError},
    services::{platform::Directory, websocket_service},
    state::SharedState,
};

/// Query parameters of the WebSocket upgrade request. Browsers cannot set
/// headers on WebSocket handshakes, so the access token rides in the query.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: String,
}

#[utoipa::path(
    get,
    path = "/games/{game_id}/ws",
    tag = "ws",
    params(
        ("game_id" = Uuid, Path, description = "Game room to join"),
        ("token" = String, Query, description = "Platform access token"),
    ),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is not a member of the game's group"),
        (status = 404, description = "No such game"),
    )
)]
/// Authenticate the caller and upgrade the connection into a game room session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path(game_id): Path<Uuid>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let profile = state
        .directory()
        .authenticate(query.token)
        .await
        .ok_or_else(|| AppError::Unauthorized("invalid token".into()))?;

    let session = state
        .store()
        .find_session(game_id)
        .await
        .map_err(ServiceError::from)?
        .ok_or_else(|| AppError::NotFound(format!("game `{game_id}`")))?;

    state
        .directory()
        .membership(session.group_id, profile.id)
        .await
        .ok_or_else(|| AppError::Forbidden("not a member of this group".into()))?;

    let shared_state = state.clone();
    Ok(ws.on_upgrade(move |socket| {
        websocket_service::handle_socket(shared_state, socket, game_id, profile)
    }))
}

/// Configure the game-room WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/games/{game_id}/ws", get(ws_handler))
}
