//! Connection registry fanning game events out to every viewer of a room.

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::{
        game::LeaderboardEntry,
        ws::{CardPrompt, GameBroadcast, PlayerInfo},
    },
    state::game::Card,
};

/// Handle used to push messages to one connected game client.
#[derive(Clone)]
pub struct RoomMember {
    /// Identifier of this connection (a user may hold several).
    pub conn_id: Uuid,
    /// User behind the connection.
    pub user_id: Uuid,
    /// Display name cached at connect time.
    pub username: String,
    /// Writer-task channel of the connection.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Registry of live WebSocket connections keyed by game id.
///
/// Delivery is best effort: a send failure means the connection's writer task
/// is gone, so the member is pruned and fan-out continues for everyone else.
#[derive(Default)]
pub struct RoomManager {
    rooms: DashMap<Uuid, Vec<RoomMember>>,
}

impl RoomManager {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and announce the updated roster to the room.
    pub fn connect(&self, game_id: Uuid, member: RoomMember) {
        self.rooms.entry(game_id).or_default().push(member);
        self.broadcast_player_list(game_id);
    }

    /// Deregister a connection. Announces the new roster unless the room is
    /// now empty, in which case the room itself is dropped.
    pub fn disconnect(&self, game_id: Uuid, conn_id: Uuid) {
        let now_empty = match self.rooms.get_mut(&game_id) {
            Some(mut members) => {
                members.retain(|member| member.conn_id != conn_id);
                members.is_empty()
            }
            None => return,
        };

        if now_empty {
            self.rooms.remove_if(&game_id, |_, members| members.is_empty());
        } else {
            self.broadcast_player_list(game_id);
        }
    }

    /// Current roster of a room.
    pub fn players(&self, game_id: Uuid) -> Vec<PlayerInfo> {
        self.rooms
            .get(&game_id)
            .map(|members| {
                members
                    .iter()
                    .map(|member| PlayerInfo {
                        username: member.username.clone(),
                        user_id: member.user_id,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of rooms with at least one live connection.
    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    /// Fan an event out to every connection of a room, pruning dead senders.
    pub fn broadcast(&self, game_id: Uuid, event: &GameBroadcast) {
        let payload = match serde_json::to_string(event) {
            Ok(payload) => payload,
            Err(err) => {
                // Serialization failure is a bug in the payload type, not a
                // delivery problem; skip the broadcast rather than crash.
                warn!(%game_id, error = %err, "failed to serialize broadcast");
                return;
            }
        };

        let Some(mut members) = self.rooms.get_mut(&game_id) else {
            return;
        };
        let before = members.len();
        members.retain(|member| {
            member
                .tx
                .send(Message::Text(payload.clone().into()))
                .is_ok()
        });
        let pruned = before - members.len();
        drop(members);

        if pruned > 0 {
            warn!(%game_id, pruned, "pruned dead connections during broadcast");
            self.rooms.remove_if(&game_id, |_, members| members.is_empty());
        }
    }

    /// Broadcast the roster of a room as a `player_update` event.
    pub fn broadcast_player_list(&self, game_id: Uuid) {
        let players = self.players(game_id);
        self.broadcast(game_id, &GameBroadcast::PlayerUpdate { players });
    }

    /// Broadcast the opening of a round. The card back stays server-side.
    pub fn send_next_card(&self, game_id: Uuid, card: &Card, time_limit: u64) {
        self.broadcast(
            game_id,
            &GameBroadcast::NewCard {
                card: CardPrompt::from(card),
                time_limit,
            },
        );
    }

    /// Broadcast the result of a graded round.
    pub fn send_round_result(
        &self,
        game_id: Uuid,
        correct_answer: String,
        leaderboard: Vec<LeaderboardEntry>,
    ) {
        self.broadcast(
            game_id,
            &GameBroadcast::RoundEnd {
                correct_answer,
                leaderboard,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str) -> (RoomMember, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            RoomMember {
                conn_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                username: name.into(),
                tx,
            },
            rx,
        )
    }

    fn payload_of(message: Message) -> serde_json::Value {
        match message {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connect_broadcasts_the_roster() {
        let rooms = RoomManager::new();
        let game = Uuid::new_v4();
        let (ada, mut ada_rx) = member("ada");
        rooms.connect(game, ada);

        let update = payload_of(ada_rx.recv().await.unwrap());
        assert_eq!(update["type"], "player_update");
        assert_eq!(update["players"][0]["username"], "ada");
    }

    #[tokio::test]
    async fn dead_connection_is_pruned_and_others_still_receive() {
        let rooms = RoomManager::new();
        let game = Uuid::new_v4();
        let (ada, mut ada_rx) = member("ada");
        let (bob, bob_rx) = member("bob");
        rooms.connect(game, ada);
        rooms.connect(game, bob);
        // Bob's writer task is gone.
        drop(bob_rx);

        rooms.broadcast(
            game,
            &GameBroadcast::GameOver {
                leaderboard: vec![],
            },
        );

        // Ada got her join update, bob's join update, and the game-over.
        let mut seen_game_over = false;
        while let Ok(message) = ada_rx.try_recv() {
            if payload_of(message)["type"] == "game_over" {
                seen_game_over = true;
            }
        }
        assert!(seen_game_over);
        assert_eq!(rooms.players(game).len(), 1);
        assert_eq!(rooms.players(game)[0].username, "ada");
    }

    #[tokio::test]
    async fn last_disconnect_removes_the_room() {
        let rooms = RoomManager::new();
        let game = Uuid::new_v4();
        let (ada, _ada_rx) = member("ada");
        let conn_id = ada.conn_id;
        rooms.connect(game, ada);
        assert_eq!(rooms.active_rooms(), 1);

        rooms.disconnect(game, conn_id);
        assert_eq!(rooms.active_rooms(), 0);
    }

    #[tokio::test]
    async fn disconnect_announces_remaining_roster() {
        let rooms = RoomManager::new();
        let game = Uuid::new_v4();
        let (ada, mut ada_rx) = member("ada");
        let (bob, _bob_rx) = member("bob");
        let bob_conn = bob.conn_id;
        rooms.connect(game, ada);
        rooms.connect(game, bob);
        rooms.disconnect(game, bob_conn);

        let mut last_roster = None;
        while let Ok(message) = ada_rx.try_recv() {
            let payload = payload_of(message);
            if payload["type"] == "player_update" {
                last_roster = Some(payload["players"].clone());
            }
        }
        let roster = last_roster.unwrap();
        assert_eq!(roster.as_array().unwrap().len(), 1);
        assert_eq!(roster[0]["username"], "ada");
    }
}
