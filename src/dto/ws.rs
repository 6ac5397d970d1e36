use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dto::game::LeaderboardEntry, state::game::Card};

/// Messages accepted from game WebSocket clients.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Host asks to start the round loop.
    StartGame,
    /// Participant submits an answer for the currently open round.
    Answer {
        /// The submitted answer string, matched exactly against the card back.
        value: String,
    },
    /// Forward-compatible catch-all for unrecognized actions.
    #[serde(other)]
    Unknown,
}

/// Player metadata broadcast in room roster updates.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerInfo {
    /// Display name of the connected player.
    pub username: String,
    /// Identifier of the connected player.
    pub user_id: Uuid,
}

/// Projection of a card that is safe to show while the round is open.
///
/// Deliberately omits the card back so the correct answer can never ride along
/// in a `new_card` broadcast.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CardPrompt {
    /// Question or term shown to players.
    pub front: String,
    /// The four answer options, in deck order.
    pub options: Vec<String>,
}

impl From<&Card> for CardPrompt {
    fn from(card: &Card) -> Self {
        Self {
            front: card.front.clone(),
            options: card.options.clone(),
        }
    }
}

/// Events fanned out to every connection of a game room.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameBroadcast {
    /// Roster changed: somebody joined or left the room.
    PlayerUpdate {
        /// Current connections of the room.
        players: Vec<PlayerInfo>,
    },
    /// A round opened: show the card and start the countdown.
    NewCard {
        /// The card front and its options. Never includes the answer.
        card: CardPrompt,
        /// Answer window in seconds.
        time_limit: u64,
    },
    /// A round closed: reveal the answer and the standings.
    RoundEnd {
        /// The exact correct answer of the graded round.
        correct_answer: String,
        /// Standings ranked by descending score.
        leaderboard: Vec<LeaderboardEntry>,
    },
    /// The deck is exhausted; final standings.
    GameOver {
        /// Final standings ranked by descending score.
        leaderboard: Vec<LeaderboardEntry>,
    },
}
