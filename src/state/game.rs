//! Domain model for flashcard game sessions and their participants.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle status of a game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Waiting room: the deck exists but no round loop is running.
    Lobby,
    /// A round loop owns the session and is driving rounds.
    InProgress,
    /// Archived session, excluded from active listings.
    Finished,
}

/// Requested difficulty for generated or fetched questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GameDifficulty {
    /// High-level definitions, clearly distinct options.
    Easy,
    /// Applied concepts, plausible distractors.
    #[default]
    Medium,
    /// Precise details, near-identical distractors.
    Hard,
}

impl GameDifficulty {
    /// Lowercase label used by external question providers.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

/// One flashcard: a prompt, the exact correct answer, and four options.
///
/// Immutable once the deck is created. `back` must equal exactly one of
/// `options`; [`Card::validate`] enforces that at deck-construction time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Question or term shown to players.
    pub front: String,
    /// Exact-match correct answer.
    pub back: String,
    /// Exactly four distinct answer options, one of which is `back`.
    pub options: Vec<String>,
}

impl Card {
    /// Check the structural invariants of a freshly built card.
    pub fn validate(&self) -> Result<(), String> {
        if self.front.trim().is_empty() {
            return Err("card front must not be empty".into());
        }
        if self.options.len() != 4 {
            return Err(format!(
                "card `{}` has {} options, expected 4",
                self.front,
                self.options.len()
            ));
        }
        for (i, option) in self.options.iter().enumerate() {
            if self.options[..i].contains(option) {
                return Err(format!(
                    "card `{}` has duplicate option `{option}`",
                    self.front
                ));
            }
        }
        if !self.options.contains(&self.back) {
            return Err(format!(
                "card `{}`: answer `{}` is not among the options",
                self.front, self.back
            ));
        }
        Ok(())
    }
}

/// Persisted record of one game session: identity, deck, and round pointer.
#[derive(Debug, Clone)]
pub struct GameSession {
    /// Primary key of the session.
    pub id: Uuid,
    /// Study group this game belongs to.
    pub group_id: Uuid,
    /// User who created the game and may start it.
    pub host_id: Uuid,
    /// Display name of the host, captured at creation.
    pub host_name: String,
    /// Current lifecycle status.
    pub status: GameStatus,
    /// Difficulty the deck was built for.
    pub difficulty: GameDifficulty,
    /// Display topic of the deck.
    pub topic: String,
    /// Ordered, immutable deck of cards.
    pub cards: Vec<Card>,
    /// Index of the round currently open for answers. `None` outside play.
    pub current_card_index: Option<usize>,
    /// Answer window per round, in seconds.
    pub time_limit_per_card: u64,
    /// Creation timestamp for auditing/listings.
    pub created_at: SystemTime,
}

impl GameSession {
    /// Build a new lobby-state session with the provided deck.
    pub fn new(
        group_id: Uuid,
        host_id: Uuid,
        host_name: String,
        topic: String,
        difficulty: GameDifficulty,
        time_limit_per_card: u64,
        cards: Vec<Card>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            host_id,
            host_name,
            status: GameStatus::Lobby,
            difficulty,
            topic,
            cards,
            current_card_index: None,
            time_limit_per_card,
            created_at: SystemTime::now(),
        }
    }
}

/// Per-user transient state within one game session.
///
/// Keyed by `(session_id, user_id)`; a reconnecting user reuses their row, so
/// scores survive dropped connections.
#[derive(Debug, Clone)]
pub struct GameParticipant {
    /// User this row belongs to.
    pub user_id: Uuid,
    /// Display name cached at join time for leaderboard rendering.
    pub username: String,
    /// Accumulated score. Never decreases.
    pub score: u32,
    /// Consecutive correct rounds. Reset on any wrong or missed round.
    pub streak: u32,
    /// Most recently submitted answer string.
    pub last_answer: Option<String>,
    /// Round index the last answer was submitted against. Grading only
    /// credits answers whose index matches the round being graded.
    pub last_answered_card_index: Option<usize>,
}

impl GameParticipant {
    /// Fresh participant row with zeroed score and streak.
    pub fn new(user_id: Uuid, username: String) -> Self {
        Self {
            user_id,
            username,
            score: 0,
            streak: 0,
            last_answer: None,
            last_answered_card_index: None,
        }
    }
}
