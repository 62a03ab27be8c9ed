//! Wires repositories, the scoring oracle, and the clock into the service
//! layer. One `AppServices` per process.

use std::sync::Arc;

use storage::repository::Storage;
use surge_core::time::Clock;

use crate::chat_service::ChatService;
use crate::completion_service::CompletionService;
use crate::error::AppServicesError;
use crate::oracle::{OpenAiOracle, ScoringOracle};
use crate::progress_service::ProgressService;

#[derive(Clone)]
pub struct AppServices {
    chat: ChatService,
    progress: ProgressService,
    completion: CompletionService,
}

impl AppServices {
    /// Builds the service layer over any storage backend and oracle. Tests
    /// pass `Storage::in_memory()` and a scripted oracle here.
    #[must_use]
    pub fn new(storage: Storage, oracle: Arc<dyn ScoringOracle>, clock: Clock) -> Self {
        let completion = CompletionService::new(
            Arc::clone(&storage.modules),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.sessions),
        );
        let chat = ChatService::new(
            clock,
            Arc::clone(&storage.sessions),
            Arc::clone(&storage.progress),
            oracle,
            completion.clone(),
        );
        let progress = ProgressService::new(
            clock,
            Arc::clone(&storage.progress),
            Arc::clone(&storage.modules),
        );
        Self {
            chat,
            progress,
            completion,
        }
    }

    /// Production wiring: SQLite storage (migrated) plus the
    /// environment-configured OpenAI-compatible oracle.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Sqlite` when the database cannot be opened
    /// or migrated.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let oracle: Arc<dyn ScoringOracle> = Arc::new(OpenAiOracle::from_env());
        Ok(Self::new(storage, oracle, clock))
    }

    #[must_use]
    pub fn chat(&self) -> &ChatService {
        &self.chat
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressService {
        &self.progress
    }

    #[must_use]
    pub fn completion(&self) -> &CompletionService {
        &self.completion
    }
}
