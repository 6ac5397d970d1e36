use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::format_system_time,
    state::game::{GameDifficulty, GameParticipant, GameSession, GameStatus},
};

/// Where the deck's questions come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QuestionMode {
    /// Generate flashcards with the LLM, optionally grounded in documents.
    #[default]
    Llm,
    /// Fetch multiple-choice questions from the external trivia provider.
    Trivia,
}

/// Payload used to create a new game for a study group.
#[skip_serializing_none]
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGameRequest {
    /// Topic the deck should focus on.
    #[validate(length(min = 1, max = 200))]
    pub topic: String,
    /// Number of cards to acquire for the deck.
    #[serde(default = "default_num_cards")]
    #[validate(range(min = 1, max = 30))]
    pub num_cards: u8,
    /// Group documents to ground LLM generation in.
    #[serde(default)]
    pub document_ids: Vec<Uuid>,
    /// Requested difficulty.
    #[serde(default)]
    pub difficulty: GameDifficulty,
    /// Answer window per card, in seconds.
    #[serde(default = "default_time_limit")]
    #[validate(range(min = 5, max = 120))]
    pub time_limit: u64,
    /// Question source for the deck.
    #[serde(default)]
    pub source: QuestionMode,
    /// Provider category identifier, trivia mode only.
    #[serde(default)]
    pub trivia_category: Option<u32>,
}

fn default_num_cards() -> u8 {
    10
}

fn default_time_limit() -> u64 {
    15
}

/// Response returned once a game has been created.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedGameResponse {
    /// Identifier of the freshly created session.
    pub game_id: Uuid,
}

/// Summary of a session as shown in group listings.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameSummary {
    /// Session identifier.
    pub id: Uuid,
    /// Display topic of the deck.
    pub topic: String,
    /// Current lifecycle status.
    pub status: GameStatus,
    /// Difficulty the deck was built for.
    pub difficulty: GameDifficulty,
    /// Answer window per card, in seconds.
    pub time_limit: u64,
    /// Number of cards in the deck.
    pub card_count: usize,
    /// Display name of the host.
    pub host_name: String,
    /// Identifier of the host.
    pub host_id: Uuid,
    /// RFC3339 creation timestamp.
    pub created_at: String,
}

impl From<GameSession> for GameSummary {
    fn from(session: GameSession) -> Self {
        Self {
            id: session.id,
            topic: session.topic,
            status: session.status,
            difficulty: session.difficulty,
            time_limit: session.time_limit_per_card,
            card_count: session.cards.len(),
            host_name: session.host_name,
            host_id: session.host_id,
            created_at: format_system_time(session.created_at),
        }
    }
}

/// One ranked row of a round or final leaderboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    /// Display name of the participant.
    pub username: String,
    /// Accumulated score.
    pub score: u32,
    /// Identifier of the participant.
    pub user_id: Uuid,
}

impl From<&GameParticipant> for LeaderboardEntry {
    fn from(row: &GameParticipant) -> Self {
        Self {
            username: row.username.clone(),
            score: row.score,
            user_id: row.user_id,
        }
    }
}

/// Rank participants by descending score.
///
/// Sorting is stable, so equal scores keep the store's join order; that is the
/// documented tie-break.
pub fn rank_leaderboard(participants: &[GameParticipant]) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = participants.iter().map(Into::into).collect();
    entries.sort_by(|a, b| b.score.cmp(&a.score));
    entries
}
