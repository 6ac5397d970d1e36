//! Shared application state wiring the store, the room registry, and the
//! question sources together.

pub mod game;
pub mod rooms;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    dao::{game_store::GameStore, memory::MemoryGameStore},
    services::{
        content::{
            llm::{CardGenerator, GeminiGenerator},
            trivia::{HttpTriviaBackend, TriviaSource},
        },
        platform::{DevDirectory, Directory, DocumentProvider, NoDocuments},
    },
    state::rooms::RoomManager,
};

/// Cheaply cloneable handle to the application state.
pub type SharedState = Arc<AppState>;

/// Central application state shared by every connection task and round loop.
pub struct AppState {
    config: AppConfig,
    store: Arc<dyn GameStore>,
    rooms: RoomManager,
    directory: Arc<dyn Directory>,
    documents: Arc<dyn DocumentProvider>,
    generator: Option<Arc<dyn CardGenerator>>,
    trivia: TriviaSource,
}

impl AppState {
    /// Construct the default wiring: in-memory store, HTTP trivia provider,
    /// and an LLM generator when an API key is configured.
    pub fn new(config: AppConfig) -> SharedState {
        let trivia = TriviaSource::new(Arc::new(HttpTriviaBackend::new(
            config.trivia_base_url.clone(),
        )));
        let generator = config.generation_api_key.clone().map(|api_key| {
            Arc::new(GeminiGenerator::new(config.generation_model.clone(), api_key))
                as Arc<dyn CardGenerator>
        });
        Self::with_parts(
            config,
            Arc::new(MemoryGameStore::new()),
            Arc::new(DevDirectory),
            Arc::new(NoDocuments),
            generator,
            trivia,
        )
    }

    /// Construct state from explicit parts. Used by tests and by deployments
    /// that swap in real platform collaborators.
    pub fn with_parts(
        config: AppConfig,
        store: Arc<dyn GameStore>,
        directory: Arc<dyn Directory>,
        documents: Arc<dyn DocumentProvider>,
        generator: Option<Arc<dyn CardGenerator>>,
        trivia: TriviaSource,
    ) -> SharedState {
        Arc::new(Self {
            config,
            store,
            rooms: RoomManager::new(),
            directory,
            documents,
            generator,
            trivia,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle to the session/participant store.
    pub fn store(&self) -> Arc<dyn GameStore> {
        Arc::clone(&self.store)
    }

    /// Registry of live game-room connections.
    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    /// Authentication and membership oracle.
    pub fn directory(&self) -> Arc<dyn Directory> {
        Arc::clone(&self.directory)
    }

    /// Document text provider for LLM grounding.
    pub fn documents(&self) -> Arc<dyn DocumentProvider> {
        Arc::clone(&self.documents)
    }

    /// Configured LLM generator, if any.
    pub fn generator(&self) -> Option<Arc<dyn CardGenerator>> {
        self.generator.clone()
    }

    /// Trivia question source.
    pub fn trivia(&self) -> &TriviaSource {
        &self.trivia
    }
}
