//! Game lifecycle operations outside the round loop: creation (including
//! synchronous content acquisition), listing, and deletion.

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::game_store::GameStore,
    dto::game::{CreateGameRequest, CreatedGameResponse, GameSummary, QuestionMode},
    error::ServiceError,
    services::{
        content::{ContentError, llm},
        platform::{Directory, DocumentProvider, GroupRole, UserProfile},
    },
    state::{SharedState, game::GameSession},
};

/// Create a game for a study group: acquire the deck, then persist the
/// session. Content acquisition failing means no session row ever exists.
pub async fn create_game(
    state: &SharedState,
    group_id: Uuid,
    host: UserProfile,
    request: CreateGameRequest,
) -> Result<CreatedGameResponse, ServiceError> {
    require_membership(state, group_id, host.id).await?;

    let cards = match request.source {
        QuestionMode::Trivia => {
            state
                .trivia()
                .fetch_cards(
                    request.num_cards,
                    request.trivia_category,
                    request.difficulty,
                    host.id,
                )
                .await?
        }
        QuestionMode::Llm => {
            let generator = state
                .generator()
                .ok_or(ServiceError::ContentGeneration(ContentError::GeneratorMissing))?;
            let attachments = state
                .documents()
                .fetch_texts(group_id, request.document_ids.clone())
                .await;
            llm::generate_cards(
                generator.as_ref(),
                &request.topic,
                request.num_cards,
                request.difficulty,
                attachments,
            )
            .await?
        }
    };

    let session = GameSession::new(
        group_id,
        host.id,
        host.username,
        request.topic,
        request.difficulty,
        request.time_limit,
        cards,
    );
    let game_id = session.id;
    state.store().insert_session(session).await?;

    info!(%game_id, %group_id, "game created");
    Ok(CreatedGameResponse { game_id })
}

/// List a group's games that are not archived.
pub async fn list_active_games(
    state: &SharedState,
    group_id: Uuid,
    user: &UserProfile,
) -> Result<Vec<GameSummary>, ServiceError> {
    require_membership(state, group_id, user.id).await?;
    let sessions = state.store().list_active(group_id).await?;
    Ok(sessions.into_iter().map(Into::into).collect())
}

/// Delete a game. Allowed for the game's host and for group admins.
pub async fn delete_game(
    state: &SharedState,
    game_id: Uuid,
    user: &UserProfile,
) -> Result<(), ServiceError> {
    let session = state
        .store()
        .find_session(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}`")))?;

    let role = require_membership(state, session.group_id, user.id).await?;
    let is_host = session.host_id == user.id;
    if !is_host && role != GroupRole::Admin {
        return Err(ServiceError::Forbidden(
            "only the host or a group admin can delete this game".into(),
        ));
    }

    state.store().delete_session(game_id).await?;
    info!(%game_id, "game deleted");
    Ok(())
}

async fn require_membership(
    state: &SharedState,
    group_id: Uuid,
    user_id: Uuid,
) -> Result<GroupRole, ServiceError> {
    state
        .directory()
        .membership(group_id, user_id)
        .await
        .ok_or_else(|| ServiceError::Forbidden("not a member of this group".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::Arc;

    use crate::{
        config::AppConfig,
        dao::{game_store::GameStore, memory::MemoryGameStore},
        services::{
            content::trivia::{
                HttpTriviaBackend, ProviderQuestion, TriviaBackend, TriviaBatch, TriviaSource,
            },
            platform::{DevDirectory, Directory, NoDocuments},
        },
        state::AppState,
    };

    struct HappyTrivia;

    impl TriviaBackend for HappyTrivia {
        fn request_token(&self) -> BoxFuture<'static, Result<String, ContentError>> {
            Box::pin(async { Ok("token".into()) })
        }

        fn reset_token(&self, _token: String) -> BoxFuture<'static, Result<(), ContentError>> {
            Box::pin(async { Ok(()) })
        }

        fn fetch(
            &self,
            amount: u8,
            _category: Option<u32>,
            _difficulty: crate::state::game::GameDifficulty,
            _token: String,
        ) -> BoxFuture<'static, Result<TriviaBatch, ContentError>> {
            Box::pin(async move {
                Ok(TriviaBatch {
                    response_code: 0,
                    results: (0..amount)
                        .map(|i| ProviderQuestion {
                            question: format!("q{i}"),
                            correct_answer: "right".into(),
                            incorrect_answers: vec!["a".into(), "b".into(), "c".into()],
                        })
                        .collect(),
                })
            })
        }
    }

    struct NoMembers;

    impl Directory for NoMembers {
        fn authenticate(&self, _token: String) -> BoxFuture<'static, Option<UserProfile>> {
            Box::pin(async { None })
        }

        fn membership(
            &self,
            _group_id: Uuid,
            _user_id: Uuid,
        ) -> BoxFuture<'static, Option<GroupRole>> {
            Box::pin(async { None })
        }
    }

    fn trivia_state(directory: Arc<dyn Directory>) -> crate::state::SharedState {
        AppState::with_parts(
            AppConfig::default(),
            Arc::new(MemoryGameStore::new()),
            directory,
            Arc::new(NoDocuments),
            None,
            TriviaSource::new(Arc::new(HappyTrivia)),
        )
    }

    fn host() -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            username: "ada".into(),
        }
    }

    fn trivia_request(n: u8) -> CreateGameRequest {
        serde_json::from_value(serde_json::json!({
            "topic": "General knowledge",
            "num_cards": n,
            "source": "trivia",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn trivia_game_is_created_and_listed() {
        let state = trivia_state(Arc::new(DevDirectory));
        let group = Uuid::new_v4();
        let host = host();

        let created = create_game(&state, group, host.clone(), trivia_request(3))
            .await
            .unwrap();

        let listed = list_active_games(&state, group, &host).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.game_id);
        assert_eq!(listed[0].card_count, 3);
        assert_eq!(listed[0].host_name, "ada");
    }

    #[tokio::test]
    async fn non_member_cannot_create_a_game() {
        let state = trivia_state(Arc::new(NoMembers));
        let err = create_game(&state, Uuid::new_v4(), host(), trivia_request(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn llm_game_without_generator_fails_without_a_session() {
        let state = trivia_state(Arc::new(DevDirectory));
        let group = Uuid::new_v4();
        let host = host();

        let request: CreateGameRequest =
            serde_json::from_value(serde_json::json!({ "topic": "Rust" })).unwrap();
        let err = create_game(&state, group, host.clone(), request)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::ContentGeneration(ContentError::GeneratorMissing)
        ));

        // Failed creation leaves no zombie session behind.
        assert!(list_active_games(&state, group, &host).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn host_can_delete_their_game() {
        let state = trivia_state(Arc::new(DevDirectory));
        let group = Uuid::new_v4();
        let host = host();
        let created = create_game(&state, group, host.clone(), trivia_request(1))
            .await
            .unwrap();

        delete_game(&state, created.game_id, &host).await.unwrap();
        assert!(
            state
                .store()
                .find_session(created.game_id)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn deleting_an_unknown_game_is_not_found() {
        let state = trivia_state(Arc::new(DevDirectory));
        let err = delete_game(&state, Uuid::new_v4(), &host()).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    // Keep the HTTP backend type exercised by construction even though unit
    // tests never hit the network.
    #[test]
    fn http_backend_builds_from_config_url() {
        let _ = HttpTriviaBackend::new("https://opentdb.com/".into());
    }
}
