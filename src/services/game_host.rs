//! Round loop driving one started game: open each card for its answer
//! window, grade the round, pause for the intermission, and finally recycle
//! the session back to the lobby.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    dao::game_store::GameStore,
    dto::{game::rank_leaderboard, ws::GameBroadcast},
    error::ServiceError,
    state::{SharedState, game::GameStatus},
};

/// Drive the rounds of a started game to completion.
///
/// Spawned as a detached task by the start dispatch after it wins the
/// lobby-to-in-progress transition. A failing loop is terminal for this run:
/// the error is logged and the session is left in whatever state it reached.
pub async fn run_game_loop(state: SharedState, game_id: Uuid) {
    if let Err(err) = drive_rounds(&state, game_id).await {
        error!(%game_id, error = %err, "round loop failed; session left as-is");
    }
}

async fn drive_rounds(state: &SharedState, game_id: Uuid) -> Result<(), ServiceError> {
    let store = state.store();
    let session = store
        .find_session(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}`")))?;
    let total = session.cards.len();
    info!(%game_id, rounds = total, "round loop started");

    for index in 0..total {
        store.advance_to(game_id, Some(index)).await?;

        // Re-fetch after every commit: the session is shared state and this
        // task must not trust a stale copy across suspension points.
        let session = store
            .find_session(game_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}`")))?;
        let card = session.cards.get(index).cloned().ok_or_else(|| {
            ServiceError::InvalidState(format!("round {index} has no card"))
        })?;

        state
            .rooms()
            .send_next_card(game_id, &card, session.time_limit_per_card);
        sleep(Duration::from_secs(session.time_limit_per_card)).await;

        let graded = store
            .apply_round_result(game_id, index, card.back.clone())
            .await?;
        state
            .rooms()
            .send_round_result(game_id, card.back, rank_leaderboard(&graded));

        let pause = if index + 1 == total {
            state.config().final_intermission
        } else {
            state.config().intermission
        };
        sleep(pause).await;
    }

    // Recycle rather than archive: the lobby keeps the deck and the scores,
    // so the host can start another run with the same group.
    store.set_status(game_id, GameStatus::Lobby).await?;
    store.advance_to(game_id, None).await?;

    let standings = store.list_participants(game_id).await?;
    state.rooms().broadcast(
        game_id,
        &GameBroadcast::GameOver {
            leaderboard: rank_leaderboard(&standings),
        },
    );
    info!(%game_id, "round loop finished; session recycled to lobby");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    use crate::{
        config::AppConfig,
        dao::{game_store::GameStore, memory::MemoryGameStore},
        services::{
            content::{
                ContentError,
                trivia::{TriviaBackend, TriviaBatch, TriviaSource},
            },
            platform::{DevDirectory, NoDocuments},
        },
        state::{
            AppState,
            game::{Card, GameDifficulty, GameSession},
            rooms::RoomMember,
        },
    };
    use axum::extract::ws::Message;

    struct UnusedTrivia;

    impl TriviaBackend for UnusedTrivia {
        fn request_token(&self) -> BoxFuture<'static, Result<String, ContentError>> {
            Box::pin(async { Err(ContentError::Backend("unused".into())) })
        }

        fn reset_token(&self, _token: String) -> BoxFuture<'static, Result<(), ContentError>> {
            Box::pin(async { Err(ContentError::Backend("unused".into())) })
        }

        fn fetch(
            &self,
            _amount: u8,
            _category: Option<u32>,
            _difficulty: GameDifficulty,
            _token: String,
        ) -> BoxFuture<'static, Result<TriviaBatch, ContentError>> {
            Box::pin(async { Err(ContentError::Backend("unused".into())) })
        }
    }

    fn card(front: &str, back: &str) -> Card {
        Card {
            front: front.into(),
            back: back.into(),
            options: vec![back.into(), "w1".into(), "w2".into(), "w3".into()],
        }
    }

    fn state_with_config(config: AppConfig) -> SharedState {
        AppState::with_parts(
            config,
            Arc::new(MemoryGameStore::new()),
            Arc::new(DevDirectory),
            Arc::new(NoDocuments),
            None,
            TriviaSource::new(Arc::new(UnusedTrivia)),
        )
    }

    fn fast_config() -> AppConfig {
        AppConfig {
            intermission: Duration::from_secs(5),
            final_intermission: Duration::from_secs(10),
            ..AppConfig::default()
        }
    }

    /// Seed a started session: inserted, joined by `players`, and already
    /// holding the lobby-to-in-progress transition.
    async fn seed_game(
        state: &SharedState,
        cards: Vec<Card>,
        time_limit: u64,
        players: &[(Uuid, &str)],
    ) -> Uuid {
        let session = GameSession::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "host".into(),
            "Test deck".into(),
            GameDifficulty::Medium,
            time_limit,
            cards,
        );
        let game_id = session.id;
        state.store().insert_session(session).await.unwrap();
        for (user_id, username) in players {
            state
                .store()
                .get_or_create_participant(game_id, *user_id, (*username).to_string())
                .await
                .unwrap();
        }
        assert!(state.store().begin_round_loop(game_id).await.unwrap());
        game_id
    }

    /// Submit `answer` against the round that is open after `delay`.
    fn answer_after(state: SharedState, game_id: Uuid, user_id: Uuid, answer: &str, delay: Duration) {
        let answer = answer.to_string();
        tokio::spawn(async move {
            sleep(delay).await;
            let index = state
                .store()
                .find_session(game_id)
                .await
                .unwrap()
                .unwrap()
                .current_card_index;
            state
                .store()
                .record_answer(game_id, user_id, answer, index)
                .await
                .unwrap();
        });
    }

    async fn participant(
        state: &SharedState,
        game_id: Uuid,
        user_id: Uuid,
    ) -> crate::state::game::GameParticipant {
        state
            .store()
            .list_participants(game_id)
            .await
            .unwrap()
            .into_iter()
            .find(|row| row.user_id == user_id)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn timely_correct_answer_scores_and_session_recycles() {
        let state = state_with_config(fast_config());
        let ada = Uuid::new_v4();
        let game_id = seed_game(&state, vec![card("Q0", "right")], 1, &[(ada, "ada")]).await;

        answer_after(state.clone(), game_id, ada, "right", Duration::from_millis(100));
        run_game_loop(state.clone(), game_id).await;

        let row = participant(&state, game_id, ada).await;
        assert_eq!(row.score, 100);
        assert_eq!(row.streak, 1);

        let session = state.store().find_session(game_id).await.unwrap().unwrap();
        assert_eq!(session.status, GameStatus::Lobby);
        assert_eq!(session.current_card_index, None);
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_answer_scores_nothing_and_resets_streak() {
        let state = state_with_config(fast_config());
        let ada = Uuid::new_v4();
        let game_id = seed_game(&state, vec![card("Q0", "right")], 1, &[(ada, "ada")]).await;

        answer_after(state.clone(), game_id, ada, "wrong", Duration::from_millis(100));
        run_game_loop(state.clone(), game_id).await;

        let row = participant(&state, game_id, ada).await;
        assert_eq!(row.score, 0);
        assert_eq!(row.streak, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn consecutive_correct_answers_earn_the_streak_bonus() {
        let state = state_with_config(fast_config());
        let ada = Uuid::new_v4();
        let game_id = seed_game(
            &state,
            vec![card("Q0", "right"), card("Q1", "right")],
            1,
            &[(ada, "ada")],
        )
        .await;

        // Round 0 opens at t=0, round 1 at t=1s+5s intermission.
        answer_after(state.clone(), game_id, ada, "right", Duration::from_millis(100));
        answer_after(state.clone(), game_id, ada, "right", Duration::from_millis(6100));
        run_game_loop(state.clone(), game_id).await;

        let row = participant(&state, game_id, ada).await;
        assert_eq!(row.score, 210);
        assert_eq!(row.streak, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn answer_arriving_after_the_window_is_not_graded() {
        let state = state_with_config(fast_config());
        let ada = Uuid::new_v4();
        let game_id = seed_game(&state, vec![card("Q0", "right")], 1, &[(ada, "ada")]).await;

        // Lands during the final intermission, after grading already ran.
        answer_after(state.clone(), game_id, ada, "right", Duration::from_millis(1500));
        run_game_loop(state.clone(), game_id).await;

        let row = participant(&state, game_id, ada).await;
        assert_eq!(row.score, 0);
        assert_eq!(row.streak, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn broadcasts_follow_the_round_sequence_without_leaking_answers() {
        let state = state_with_config(fast_config());
        let ada = Uuid::new_v4();
        let game_id = seed_game(
            &state,
            vec![card("Q0", "right"), card("Q1", "right")],
            1,
            &[(ada, "ada")],
        )
        .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        state.rooms().connect(
            game_id,
            RoomMember {
                conn_id: Uuid::new_v4(),
                user_id: ada,
                username: "ada".into(),
                tx,
            },
        );

        run_game_loop(state.clone(), game_id).await;

        let mut events = Vec::new();
        while let Ok(message) = rx.try_recv() {
            let Message::Text(text) = message else {
                panic!("expected text frame");
            };
            events.push(serde_json::from_str::<serde_json::Value>(text.as_str()).unwrap());
        }

        let types: Vec<&str> = events.iter().map(|e| e["type"].as_str().unwrap()).collect();
        assert_eq!(
            types,
            vec![
                "player_update",
                "new_card",
                "round_end",
                "new_card",
                "round_end",
                "game_over"
            ]
        );

        let fronts: Vec<&str> = events
            .iter()
            .filter(|e| e["type"] == "new_card")
            .map(|e| e["card"]["front"].as_str().unwrap())
            .collect();
        assert_eq!(fronts, vec!["Q0", "Q1"]);
        for event in events.iter().filter(|e| e["type"] == "new_card") {
            assert!(event["card"].get("back").is_none());
        }

        let game_over = events.last().unwrap();
        assert_eq!(game_over["leaderboard"][0]["username"], "ada");
    }
}
