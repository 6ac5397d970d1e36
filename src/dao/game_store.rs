use futures::future::BoxFuture;
use uuid::Uuid;

use crate::{
    dao::storage::StorageResult,
    state::game::{GameParticipant, GameSession, GameStatus},
};

/// Abstraction over the persistence layer for game sessions and participants.
///
/// Every operation is a small atomic read-modify-write: the round loop and the
/// per-connection dispatchers run as independent tasks and must always observe
/// each other's committed state, so callers re-fetch through this trait after
/// every suspension point instead of trusting an in-task copy.
pub trait GameStore: Send + Sync {
    /// Persist a freshly created session.
    fn insert_session(&self, session: GameSession) -> BoxFuture<'static, StorageResult<()>>;

    /// Fetch a session by id.
    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameSession>>>;

    /// List the sessions of a group that are not archived.
    fn list_active(&self, group_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<GameSession>>>;

    /// Remove a session and its participant rows. Returns whether it existed.
    fn delete_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    /// Overwrite a session's lifecycle status.
    fn set_status(&self, id: Uuid, status: GameStatus) -> BoxFuture<'static, StorageResult<()>>;

    /// Move the session's round pointer. `None` means "not in a round".
    fn advance_to(
        &self,
        id: Uuid,
        index: Option<usize>,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// Atomically transition `Lobby -> InProgress`.
    ///
    /// Returns `true` when this caller won the transition and may spawn the
    /// round loop; `false` when the session was already in progress (or
    /// archived), which rejects a concurrent double start.
    fn begin_round_loop(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;

    /// Fetch the participant row for `(session, user)`, creating it on first
    /// join. Idempotent: repeated calls return the same row.
    fn get_or_create_participant(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        username: String,
    ) -> BoxFuture<'static, StorageResult<GameParticipant>>;

    /// Record a submitted answer together with the round index it targets.
    fn record_answer(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        answer: String,
        card_index: Option<usize>,
    ) -> BoxFuture<'static, StorageResult<()>>;

    /// All participant rows of a session, in join order.
    fn list_participants(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GameParticipant>>>;

    /// Batch-grade one round against `correct_answer`, considering every
    /// participant exactly once.
    ///
    /// A participant whose `last_answered_card_index` equals `card_index` and
    /// whose `last_answer` matches `correct_answer` exactly (case-sensitive)
    /// earns `100 + 10 * streak` points and a streak increment; everyone else
    /// has their streak reset. Returns the updated rows in join order.
    fn apply_round_result(
        &self,
        session_id: Uuid,
        card_index: usize,
        correct_answer: String,
    ) -> BoxFuture<'static, StorageResult<Vec<GameParticipant>>>;
}
