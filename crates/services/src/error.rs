//! Shared error types for the services crate.
//!
//! Lifecycle violations (`SessionLocked`, `ChapterNotUnlocked`,
//! `NothingToFinish`) are recoverable, user-facing rejections; storage
//! failures propagate separately and are the only fatal class.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use surge_core::model::{MessageError, SessionStateError};

/// Errors emitted by scoring-oracle adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OracleError {
    #[error("scoring oracle is not configured")]
    Disabled,
    #[error("scoring oracle returned an empty reply")]
    EmptyResponse,
    #[error("scoring oracle request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted by `ChatService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChatError {
    #[error("session is completed and locked against further messages")]
    SessionLocked,
    #[error("chapter must be marked complete before its chat opens")]
    ChapterNotUnlocked,
    #[error("session has no exchange to finish")]
    NothingToFinish,
    #[error("scoring oracle unavailable: {0}")]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error(transparent)]
    Session(SessionStateError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
}

impl From<SessionStateError> for ChatError {
    fn from(e: SessionStateError) -> Self {
        // Surface the two lifecycle violations under their own variants so
        // callers can present them as guidance rather than failures.
        match e {
            SessionStateError::Completed => ChatError::SessionLocked,
            SessionStateError::NothingToFinish => ChatError::NothingToFinish,
            other => ChatError::Session(other),
        }
    }
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("module not found")]
    UnknownModule,
    #[error("chapter does not belong to the module")]
    UnknownChapter,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CompletionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompletionError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
