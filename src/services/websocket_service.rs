//! Per-connection WebSocket handling: writer task, inbound command loop,
//! and the dispatcher turning client commands into game actions.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::game_store::GameStore,
    dto::ws::ClientCommand,
    error::ServiceError,
    services::{game_host, platform::UserProfile},
    state::{SharedState, rooms::RoomMember},
};

/// Drive one authenticated game-room connection until it closes.
///
/// The participant row is created (or refreshed) before the connection joins
/// the room, so a player is never visible in the roster without a row to
/// grade. Disconnecting removes only the connection; the row and its score
/// survive for reconnects.
pub async fn handle_socket(
    state: SharedState,
    socket: WebSocket,
    game_id: Uuid,
    profile: UserProfile,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Writer task: everything the room fans out funnels through this channel
    // so broadcast never blocks on a slow socket.
    let writer_task: JoinHandle<()> = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if ws_tx.send(message).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    if let Err(err) = state
        .store()
        .get_or_create_participant(game_id, profile.id, profile.username.clone())
        .await
    {
        warn!(%game_id, user_id = %profile.id, error = %err, "failed to join game");
        finalize(writer_task, outbound_tx);
        return;
    }

    let conn_id = Uuid::new_v4();
    state.rooms().connect(
        game_id,
        RoomMember {
            conn_id,
            user_id: profile.id,
            username: profile.username.clone(),
            tx: outbound_tx.clone(),
        },
    );
    info!(%game_id, user_id = %profile.id, %conn_id, "player connected");

    while let Some(received) = ws_rx.next().await {
        match received {
            Ok(Message::Text(text)) => {
                let command = match serde_json::from_str::<ClientCommand>(text.as_str()) {
                    Ok(command) => command,
                    Err(err) => {
                        debug!(%game_id, error = %err, "ignoring malformed command");
                        continue;
                    }
                };
                if let Err(err) = dispatch_command(&state, game_id, &profile, command).await {
                    // Command failures are per-caller; report on this
                    // connection only and keep the session running.
                    debug!(%game_id, user_id = %profile.id, error = %err, "command rejected");
                    let payload =
                        serde_json::json!({ "type": "error", "message": err.to_string() });
                    let _ = outbound_tx.send(Message::Text(payload.to_string().into()));
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(%game_id, %conn_id, error = %err, "websocket receive error");
                break;
            }
        }
    }

    state.rooms().disconnect(game_id, conn_id);
    info!(%game_id, user_id = %profile.id, %conn_id, "player disconnected");
    finalize(writer_task, outbound_tx);
}

/// Shut the writer task down by closing its inbound channel. The task drains
/// whatever is still queued and exits on its own.
fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    drop(writer_task);
}

/// Apply one client command to the game on behalf of `profile`.
async fn dispatch_command(
    state: &SharedState,
    game_id: Uuid,
    profile: &UserProfile,
    command: ClientCommand,
) -> Result<(), ServiceError> {
    match command {
        ClientCommand::StartGame => {
            let session = state
                .store()
                .find_session(game_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}`")))?;
            if session.host_id != profile.id {
                return Err(ServiceError::Forbidden(
                    "only the host can start the game".into(),
                ));
            }

            // The store arbitrates the lobby-to-in-progress transition, so two
            // racing starts spawn exactly one loop.
            if state.store().begin_round_loop(game_id).await? {
                info!(%game_id, host_id = %profile.id, "game started");
                tokio::spawn(game_host::run_game_loop(state.clone(), game_id));
                Ok(())
            } else {
                Err(ServiceError::InvalidState("game is already running".into()))
            }
        }
        ClientCommand::Answer { value } => {
            let session = state
                .store()
                .find_session(game_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}`")))?;
            // The index is stamped at submission time; grading later ignores
            // answers whose index no longer matches the round being graded.
            state
                .store()
                .record_answer(game_id, profile.id, value, session.current_card_index)
                .await?;
            Ok(())
        }
        ClientCommand::Unknown => {
            debug!(%game_id, user_id = %profile.id, "ignoring unknown command");
            Ok(())
        }
    }
}
