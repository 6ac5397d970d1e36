//! Trivia-provider question source with per-user continuation tokens.
//!
//! The provider hands out session tokens that guarantee no repeated questions
//! across calls. Tokens live in an explicit keyed [`TokenStore`] owned by the
//! application state, not in hidden process-wide statics.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    services::content::{ContentError, validate_deck},
    state::game::{Card, GameDifficulty},
};

/// Provider response code: questions returned successfully.
const CODE_SUCCESS: u8 = 0;
/// Provider response code: the supplied token is unknown or expired.
const CODE_TOKEN_NOT_FOUND: u8 = 3;
/// Provider response code: the token's question pool is exhausted.
const CODE_TOKEN_EXHAUSTED: u8 = 4;

/// Keyed store of per-user continuation tokens.
#[derive(Default)]
pub struct TokenStore {
    tokens: DashMap<Uuid, String>,
}

impl TokenStore {
    /// Create an empty token store.
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, user_id: Uuid) -> Option<String> {
        self.tokens.get(&user_id).map(|token| token.clone())
    }

    fn insert(&self, user_id: Uuid, token: String) {
        self.tokens.insert(user_id, token);
    }
}

/// One raw multiple-choice question as delivered by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderQuestion {
    /// HTML-encoded question text.
    pub question: String,
    /// HTML-encoded correct answer.
    pub correct_answer: String,
    /// HTML-encoded distractors; three for multiple-choice questions.
    pub incorrect_answers: Vec<String>,
}

/// One provider reply: a response code plus the question batch.
#[derive(Debug, Clone, Deserialize)]
pub struct TriviaBatch {
    /// Provider status code for the request.
    pub response_code: u8,
    /// Questions, present only on success.
    #[serde(default)]
    pub results: Vec<ProviderQuestion>,
}

/// Transport seam for the trivia provider, mockable in tests.
pub trait TriviaBackend: Send + Sync {
    /// Acquire a fresh continuation token.
    fn request_token(&self) -> BoxFuture<'static, Result<String, ContentError>>;
    /// Reset an exhausted token so its question pool refills.
    fn reset_token(&self, token: String) -> BoxFuture<'static, Result<(), ContentError>>;
    /// Fetch a batch of questions under the given token.
    fn fetch(
        &self,
        amount: u8,
        category: Option<u32>,
        difficulty: GameDifficulty,
        token: String,
    ) -> BoxFuture<'static, Result<TriviaBatch, ContentError>>;
}

/// Question source backed by a [`TriviaBackend`] plus the token store.
pub struct TriviaSource {
    backend: Arc<dyn TriviaBackend>,
    tokens: TokenStore,
}

impl TriviaSource {
    /// Build a source over the given backend with an empty token store.
    pub fn new(backend: Arc<dyn TriviaBackend>) -> Self {
        Self {
            backend,
            tokens: TokenStore::new(),
        }
    }

    /// Fetch `amount` cards for `user_id`, honoring token continuity.
    ///
    /// Token trouble is retried exactly once: an exhausted pool resets the
    /// token in place, an invalid token is discarded and reacquired. Any other
    /// non-success code, or trouble persisting after the retry, is fatal.
    pub async fn fetch_cards(
        &self,
        amount: u8,
        category: Option<u32>,
        difficulty: GameDifficulty,
        user_id: Uuid,
    ) -> Result<Vec<Card>, ContentError> {
        let mut token = match self.tokens.get(user_id) {
            Some(token) => token,
            None => {
                let token = self.backend.request_token().await?;
                self.tokens.insert(user_id, token.clone());
                token
            }
        };

        let mut retried = false;
        loop {
            let batch = self
                .backend
                .fetch(amount, category, difficulty, token.clone())
                .await?;

            match batch.response_code {
                CODE_SUCCESS => return build_cards(batch.results, amount),
                CODE_TOKEN_EXHAUSTED if !retried => {
                    info!(%user_id, "trivia token exhausted; resetting and retrying");
                    self.backend.reset_token(token.clone()).await?;
                    retried = true;
                }
                CODE_TOKEN_NOT_FOUND if !retried => {
                    info!(%user_id, "trivia token invalid; reacquiring and retrying");
                    token = self.backend.request_token().await?;
                    self.tokens.insert(user_id, token.clone());
                    retried = true;
                }
                code => return Err(ContentError::Provider(code)),
            }
        }
    }
}

/// Normalize provider questions into cards: decode HTML entities and shuffle
/// the correct answer in among the distractors.
fn build_cards(questions: Vec<ProviderQuestion>, requested: u8) -> Result<Vec<Card>, ContentError> {
    let mut rng = rand::rng();
    let cards = questions
        .into_iter()
        .map(|question| {
            let front = decode(&question.question);
            let back = decode(&question.correct_answer);
            let mut options: Vec<String> =
                question.incorrect_answers.iter().map(|s| decode(s)).collect();
            options.push(back.clone());
            // Shuffled so the correct answer's position carries no signal.
            options.shuffle(&mut rng);
            Card {
                front,
                back,
                options,
            }
        })
        .collect();
    validate_deck(cards, requested as usize)
}

fn decode(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// HTTP implementation of [`TriviaBackend`] for an OpenTDB-style API.
pub struct HttpTriviaBackend {
    client: Client,
    base_url: String,
}

impl HttpTriviaBackend {
    /// Build a backend talking to the provider at `base_url`.
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    response_code: u8,
    #[serde(default)]
    token: String,
}

impl TriviaBackend for HttpTriviaBackend {
    fn request_token(&self) -> BoxFuture<'static, Result<String, ContentError>> {
        let client = self.client.clone();
        let url = format!("{}/api_token.php", self.base_url);
        Box::pin(async move {
            let response: TokenResponse = client
                .get(&url)
                .query(&[("command", "request")])
                .send()
                .await?
                .json()
                .await?;
            if response.response_code != CODE_SUCCESS {
                return Err(ContentError::Provider(response.response_code));
            }
            debug!("acquired trivia continuation token");
            Ok(response.token)
        })
    }

    fn reset_token(&self, token: String) -> BoxFuture<'static, Result<(), ContentError>> {
        let client = self.client.clone();
        let url = format!("{}/api_token.php", self.base_url);
        Box::pin(async move {
            let response: TokenResponse = client
                .get(&url)
                .query(&[("command", "reset"), ("token", token.as_str())])
                .send()
                .await?
                .json()
                .await?;
            if response.response_code != CODE_SUCCESS {
                return Err(ContentError::Provider(response.response_code));
            }
            Ok(())
        })
    }

    fn fetch(
        &self,
        amount: u8,
        category: Option<u32>,
        difficulty: GameDifficulty,
        token: String,
    ) -> BoxFuture<'static, Result<TriviaBatch, ContentError>> {
        let client = self.client.clone();
        let url = format!("{}/api.php", self.base_url);
        Box::pin(async move {
            let mut query: Vec<(&str, String)> = vec![
                ("amount", amount.to_string()),
                ("type", "multiple".into()),
                ("difficulty", difficulty.as_str().into()),
                ("token", token),
            ];
            if let Some(category) = category {
                query.push(("category", category.to_string()));
            }
            let batch = client
                .get(&url)
                .query(&query)
                .send()
                .await?
                .json::<TriviaBatch>()
                .await?;
            Ok(batch)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Scripted backend: pops pre-programmed batches and counts token calls.
    struct ScriptedBackend {
        batches: Mutex<Vec<TriviaBatch>>,
        tokens_issued: Mutex<u32>,
        resets: Mutex<u32>,
    }

    impl ScriptedBackend {
        fn new(mut batches: Vec<TriviaBatch>) -> Arc<Self> {
            batches.reverse();
            Arc::new(Self {
                batches: Mutex::new(batches),
                tokens_issued: Mutex::new(0),
                resets: Mutex::new(0),
            })
        }

        fn tokens_issued(&self) -> u32 {
            *self.tokens_issued.lock().unwrap()
        }

        fn resets(&self) -> u32 {
            *self.resets.lock().unwrap()
        }
    }

    impl TriviaBackend for ScriptedBackend {
        fn request_token(&self) -> BoxFuture<'static, Result<String, ContentError>> {
            let mut issued = self.tokens_issued.lock().unwrap();
            *issued += 1;
            let token = format!("token-{issued}");
            Box::pin(async move { Ok(token) })
        }

        fn reset_token(&self, _token: String) -> BoxFuture<'static, Result<(), ContentError>> {
            *self.resets.lock().unwrap() += 1;
            Box::pin(async move { Ok(()) })
        }

        fn fetch(
            &self,
            _amount: u8,
            _category: Option<u32>,
            _difficulty: GameDifficulty,
            _token: String,
        ) -> BoxFuture<'static, Result<TriviaBatch, ContentError>> {
            let batch = self.batches.lock().unwrap().pop();
            Box::pin(async move {
                batch.ok_or_else(|| ContentError::Backend("script exhausted".into()))
            })
        }
    }

    fn question(text: &str, correct: &str) -> ProviderQuestion {
        ProviderQuestion {
            question: text.into(),
            correct_answer: correct.into(),
            incorrect_answers: vec!["w1".into(), "w2".into(), "w3".into()],
        }
    }

    fn success_batch(n: usize) -> TriviaBatch {
        TriviaBatch {
            response_code: CODE_SUCCESS,
            results: (0..n).map(|i| question(&format!("q{i}"), "right")).collect(),
        }
    }

    fn code_batch(code: u8) -> TriviaBatch {
        TriviaBatch {
            response_code: code,
            results: vec![],
        }
    }

    #[tokio::test]
    async fn success_produces_shuffled_four_option_cards() {
        let backend = ScriptedBackend::new(vec![success_batch(2)]);
        let source = TriviaSource::new(backend.clone());

        let cards = source
            .fetch_cards(2, None, GameDifficulty::Easy, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(cards.len(), 2);
        for card in &cards {
            assert_eq!(card.options.len(), 4);
            assert!(card.options.contains(&card.back));
        }
    }

    #[tokio::test]
    async fn exhausted_token_is_reset_and_retried_once() {
        let backend = ScriptedBackend::new(vec![
            code_batch(CODE_TOKEN_EXHAUSTED),
            success_batch(1),
        ]);
        let source = TriviaSource::new(backend.clone());

        let cards = source
            .fetch_cards(1, None, GameDifficulty::Medium, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(cards.len(), 1);
        assert_eq!(backend.resets(), 1);
        assert_eq!(backend.tokens_issued(), 1);
    }

    #[tokio::test]
    async fn invalid_token_is_reacquired_and_retried_once() {
        let backend = ScriptedBackend::new(vec![
            code_batch(CODE_TOKEN_NOT_FOUND),
            success_batch(1),
        ]);
        let source = TriviaSource::new(backend.clone());
        let user = Uuid::new_v4();

        source
            .fetch_cards(1, None, GameDifficulty::Medium, user)
            .await
            .unwrap();

        // One token for the initial call, one for the reacquisition.
        assert_eq!(backend.tokens_issued(), 2);
    }

    #[tokio::test]
    async fn persistent_token_trouble_is_fatal_after_one_retry() {
        let backend = ScriptedBackend::new(vec![
            code_batch(CODE_TOKEN_EXHAUSTED),
            code_batch(CODE_TOKEN_EXHAUSTED),
        ]);
        let source = TriviaSource::new(backend.clone());

        let err = source
            .fetch_cards(1, None, GameDifficulty::Medium, Uuid::new_v4())
            .await
            .unwrap_err();

        assert!(matches!(err, ContentError::Provider(code) if code == CODE_TOKEN_EXHAUSTED));
        assert_eq!(backend.resets(), 1);
    }

    #[tokio::test]
    async fn other_provider_codes_fail_without_retry() {
        let backend = ScriptedBackend::new(vec![code_batch(2), success_batch(1)]);
        let source = TriviaSource::new(backend.clone());

        let err = source
            .fetch_cards(1, None, GameDifficulty::Medium, Uuid::new_v4())
            .await
            .unwrap_err();

        assert!(matches!(err, ContentError::Provider(2)));
        assert_eq!(backend.resets(), 0);
    }

    #[tokio::test]
    async fn token_is_reused_across_calls_for_the_same_user() {
        let backend = ScriptedBackend::new(vec![success_batch(1), success_batch(1)]);
        let source = TriviaSource::new(backend.clone());
        let user = Uuid::new_v4();

        source
            .fetch_cards(1, None, GameDifficulty::Medium, user)
            .await
            .unwrap();
        source
            .fetch_cards(1, None, GameDifficulty::Medium, user)
            .await
            .unwrap();

        assert_eq!(backend.tokens_issued(), 1);
    }

    #[tokio::test]
    async fn html_entities_are_decoded() {
        let batch = TriviaBatch {
            response_code: CODE_SUCCESS,
            results: vec![ProviderQuestion {
                question: "What&#039;s 2+2?".into(),
                correct_answer: "&quot;4&quot;".into(),
                incorrect_answers: vec!["3".into(), "5".into(), "&amp;6".into()],
            }],
        };
        let backend = ScriptedBackend::new(vec![batch]);
        let source = TriviaSource::new(backend);

        let cards = source
            .fetch_cards(1, None, GameDifficulty::Easy, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(cards[0].front, "What's 2+2?");
        assert_eq!(cards[0].back, "\"4\"");
        assert!(cards[0].options.contains(&"&6".to_string()));
    }
}
