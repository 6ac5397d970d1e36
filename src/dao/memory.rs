//! In-memory [`GameStore`] used as the default backend.
//!
//! Each session and its participant rows live inside one `DashMap` entry, so
//! every trait operation locks exactly one shard for the duration of its
//! read-modify-write. Participant rows are kept in an `IndexMap` to preserve
//! join order, which is the documented leaderboard tie-break.

use dashmap::DashMap;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    dao::{
        game_store::GameStore,
        storage::{StorageError, StorageResult},
    },
    state::game::{GameParticipant, GameSession, GameStatus},
};

/// Base points for a correct answer, before the streak bonus.
const BASE_POINTS: u32 = 100;
/// Extra points per streak level carried into the round.
const STREAK_BONUS: u32 = 10;

#[derive(Debug)]
struct SessionRecord {
    session: GameSession,
    participants: IndexMap<Uuid, GameParticipant>,
}

/// Process-local store keeping all game state in memory.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    records: Arc<DashMap<Uuid, SessionRecord>>,
}

impl MemoryGameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_record<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut SessionRecord) -> T,
    ) -> StorageResult<T> {
        match self.records.get_mut(&id) {
            Some(mut record) => Ok(f(&mut record)),
            None => Err(StorageError::UnknownGame(id)),
        }
    }
}

impl GameStore for MemoryGameStore {
    fn insert_session(&self, session: GameSession) -> BoxFuture<'static, StorageResult<()>> {
        let records = Arc::clone(&self.records);
        Box::pin(async move {
            records.insert(
                session.id,
                SessionRecord {
                    session,
                    participants: IndexMap::new(),
                },
            );
            Ok(())
        })
    }

    fn find_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameSession>>> {
        let records = Arc::clone(&self.records);
        Box::pin(async move { Ok(records.get(&id).map(|record| record.session.clone())) })
    }

    fn list_active(&self, group_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<GameSession>>> {
        let records = Arc::clone(&self.records);
        Box::pin(async move {
            let mut sessions: Vec<GameSession> = records
                .iter()
                .filter(|record| {
                    record.session.group_id == group_id
                        && record.session.status != GameStatus::Finished
                })
                .map(|record| record.session.clone())
                .collect();
            sessions.sort_by_key(|session| session.created_at);
            Ok(sessions)
        })
    }

    fn delete_session(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let records = Arc::clone(&self.records);
        Box::pin(async move { Ok(records.remove(&id).is_some()) })
    }

    fn set_status(&self, id: Uuid, status: GameStatus) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.with_record(id, |record| record.session.status = status) })
    }

    fn advance_to(&self, id: Uuid, index: Option<usize>) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.with_record(id, |record| record.session.current_card_index = index)
        })
    }

    fn begin_round_loop(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store.with_record(id, |record| {
                if record.session.status == GameStatus::Lobby {
                    record.session.status = GameStatus::InProgress;
                    true
                } else {
                    false
                }
            })
        })
    }

    fn get_or_create_participant(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        username: String,
    ) -> BoxFuture<'static, StorageResult<GameParticipant>> {
        let store = self.clone();
        Box::pin(async move {
            store.with_record(session_id, |record| {
                let row = record
                    .participants
                    .entry(user_id)
                    .or_insert_with(|| GameParticipant::new(user_id, username.clone()));
                // Refresh the cached display name on reconnect.
                row.username = username;
                row.clone()
            })
        })
    }

    fn record_answer(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        answer: String,
        card_index: Option<usize>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.with_record(session_id, |record| {
                if let Some(row) = record.participants.get_mut(&user_id) {
                    row.last_answer = Some(answer);
                    row.last_answered_card_index = card_index;
                }
            })
        })
    }

    fn list_participants(
        &self,
        session_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<GameParticipant>>> {
        let store = self.clone();
        Box::pin(async move {
            store.with_record(session_id, |record| {
                record.participants.values().cloned().collect()
            })
        })
    }

    fn apply_round_result(
        &self,
        session_id: Uuid,
        card_index: usize,
        correct_answer: String,
    ) -> BoxFuture<'static, StorageResult<Vec<GameParticipant>>> {
        let store = self.clone();
        Box::pin(async move {
            store.with_record(session_id, |record| {
                for row in record.participants.values_mut() {
                    let answered_this_round = row.last_answered_card_index == Some(card_index);
                    if answered_this_round && row.last_answer.as_deref() == Some(&correct_answer) {
                        row.score += BASE_POINTS + STREAK_BONUS * row.streak;
                        row.streak += 1;
                    } else {
                        // Wrong answer, no answer, or an answer left over from
                        // a previous round all break the streak.
                        row.streak = 0;
                    }
                }
                record.participants.values().cloned().collect()
            })
        })
    }
}
