use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use surge_core::model::{
    Chapter, ChapterId, ChapterProgress, ChatSession, Message, Module, ModuleId, SessionKey,
    SessionStateError, SsiScore, StudentId,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<SessionStateError> for StorageError {
    fn from(e: SessionStateError) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Persisted shape for a chat session.
///
/// This mirrors the domain `ChatSession` so repositories can
/// serialize/deserialize without leaking storage concerns into the domain
/// layer. The conversation travels as a `Vec<Message>`; the SQLite adapter
/// encodes it as one JSON column.
#[derive(Debug, Clone)]
pub struct ChatSessionRecord {
    pub key: SessionKey,
    pub conversation: Vec<Message>,
    pub ssi_score: Option<SsiScore>,
    pub is_completed: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ChatSessionRecord {
    #[must_use]
    pub fn from_session(session: &ChatSession) -> Self {
        Self {
            key: session.key(),
            conversation: session.conversation().to_vec(),
            ssi_score: session.ssi_score(),
            is_completed: session.is_completed(),
            started_at: session.started_at(),
            finished_at: session.finished_at(),
        }
    }

    /// Convert the record back into a domain `ChatSession`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the persisted flags are
    /// mutually inconsistent.
    pub fn into_session(self) -> Result<ChatSession, StorageError> {
        Ok(ChatSession::from_persisted(
            self.key,
            self.conversation,
            self.ssi_score,
            self.is_completed,
            self.started_at,
            self.finished_at,
        )?)
    }
}

/// Repository contract for chat sessions.
///
/// `upsert_session` must be atomic per session key: two near-simultaneous
/// writers for the same key must serialize, never interleave, so an
/// exchange cannot be silently dropped.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Fetch a session by key. Unknown keys are `Ok(None)`: "no session yet"
    /// is a valid read outcome, not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or deserialization failures.
    async fn get_session(&self, key: &SessionKey) -> Result<Option<ChatSession>, StorageError>;

    /// Persist or replace the session stored under its key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn upsert_session(&self, session: &ChatSession) -> Result<(), StorageError>;

    /// All sessions belonging to a student, chapter-scoped and global alike.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or deserialization failures.
    async fn list_sessions_by_student(
        &self,
        student: StudentId,
    ) -> Result<Vec<ChatSession>, StorageError>;
}

/// Repository contract for per-chapter unlock records.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on connection failures.
    async fn get_progress(
        &self,
        student: StudentId,
        module: ModuleId,
        chapter: ChapterId,
    ) -> Result<Option<ChapterProgress>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_progress(&self, progress: &ChapterProgress) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on connection failures.
    async fn list_progress_by_student(
        &self,
        student: StudentId,
    ) -> Result<Vec<ChapterProgress>, StorageError>;
}

/// Repository contract for the module/chapter catalog.
#[async_trait]
pub trait ModuleRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the module id already exists.
    async fn insert_module(&self, module: &Module) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::Conflict` on duplicate id or position,
    /// `StorageError::NotFound` if the parent module is missing.
    async fn insert_chapter(&self, chapter: &Chapter) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on connection failures.
    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on connection failures.
    async fn list_modules(&self) -> Result<Vec<Module>, StorageError>;

    /// Chapters of a module ordered by position.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection failures.
    async fn list_chapters(&self, module: ModuleId) -> Result<Vec<Chapter>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<HashMap<SessionKey, ChatSession>>>,
    progress: Arc<Mutex<HashMap<(StudentId, ModuleId, ChapterId), ChapterProgress>>>,
    modules: Arc<Mutex<Vec<Module>>>,
    chapters: Arc<Mutex<Vec<Chapter>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn get_session(&self, key: &SessionKey) -> Result<Option<ChatSession>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn upsert_session(&self, session: &ChatSession) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(session.key(), session.clone());
        Ok(())
    }

    async fn list_sessions_by_student(
        &self,
        student: StudentId,
    ) -> Result<Vec<ChatSession>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .values()
            .filter(|s| s.key().student() == student)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        student: StudentId,
        module: ModuleId,
        chapter: ChapterId,
    ) -> Result<Option<ChapterProgress>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(student, module, chapter)).copied())
    }

    async fn upsert_progress(&self, progress: &ChapterProgress) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(
            (progress.student(), progress.module(), progress.chapter()),
            *progress,
        );
        Ok(())
    }

    async fn list_progress_by_student(
        &self,
        student: StudentId,
    ) -> Result<Vec<ChapterProgress>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard
            .values()
            .filter(|p| p.student() == student)
            .copied()
            .collect())
    }
}

#[async_trait]
impl ModuleRepository for InMemoryRepository {
    async fn insert_module(&self, module: &Module) -> Result<(), StorageError> {
        let mut guard = self
            .modules
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.iter().any(|m| m.id() == module.id()) {
            return Err(StorageError::Conflict);
        }
        guard.push(module.clone());
        Ok(())
    }

    async fn insert_chapter(&self, chapter: &Chapter) -> Result<(), StorageError> {
        {
            let modules = self
                .modules
                .lock()
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            if !modules.iter().any(|m| m.id() == chapter.module_id()) {
                return Err(StorageError::NotFound);
            }
        }
        let mut guard = self
            .chapters
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let duplicate = guard.iter().any(|c| {
            c.id() == chapter.id()
                || (c.module_id() == chapter.module_id() && c.position() == chapter.position())
        });
        if duplicate {
            return Err(StorageError::Conflict);
        }
        guard.push(chapter.clone());
        Ok(())
    }

    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>, StorageError> {
        let guard = self
            .modules
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.iter().find(|m| m.id() == id).cloned())
    }

    async fn list_modules(&self) -> Result<Vec<Module>, StorageError> {
        let guard = self
            .modules
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn list_chapters(&self, module: ModuleId) -> Result<Vec<Chapter>, StorageError> {
        let guard = self
            .chapters
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut chapters: Vec<Chapter> = guard
            .iter()
            .filter(|c| c.module_id() == module)
            .cloned()
            .collect();
        chapters.sort_by_key(Chapter::position);
        Ok(chapters)
    }
}

/// Aggregates the three repositories behind trait objects for easy backend
/// swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub modules: Arc<dyn ModuleRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let modules: Arc<dyn ModuleRepository> = Arc::new(repo);
        Self {
            sessions,
            progress,
            modules,
        }
    }
}
