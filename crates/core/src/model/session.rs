use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ChapterId, Message, MessageRole, ModuleId, SsiScore, StudentId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("session is completed and locked against further messages")]
    Completed,

    #[error("session has no exchange to finish")]
    NothingToFinish,

    #[error("exchange must pair a user message with an assistant reply")]
    RoleMismatch,

    #[error("inconsistent persisted session: {0}")]
    InvalidPersistedState(String),
}

/// What a chat session is scoped to.
///
/// Chapter sessions are gated on the chapter being marked complete first;
/// the global SURGE chat has no such precondition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionScope {
    Chapter { module: ModuleId, chapter: ChapterId },
    Global,
}

impl SessionScope {
    #[must_use]
    pub fn chapter(module: ModuleId, chapter: ChapterId) -> Self {
        Self::Chapter { module, chapter }
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }
}

/// Identity of a chat session: one per (student, module, chapter) plus one
/// module-agnostic global session per student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    student: StudentId,
    scope: SessionScope,
}

impl SessionKey {
    #[must_use]
    pub fn new(student: StudentId, scope: SessionScope) -> Self {
        Self { student, scope }
    }

    #[must_use]
    pub fn global(student: StudentId) -> Self {
        Self::new(student, SessionScope::Global)
    }

    #[must_use]
    pub fn student(&self) -> StudentId {
        self.student
    }

    #[must_use]
    pub fn scope(&self) -> SessionScope {
        self.scope
    }
}

/// Lifecycle position of a session. Transitions only move forward:
/// `NotStarted → Active → Completed`, and `Completed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    Active,
    Completed,
}

/// A chapter-scoped (or global) reflective AI conversation with its
/// accumulated SSI score.
///
/// The conversation is append-only and grows one user/assistant exchange at
/// a time. `is_completed` is monotonic; once set the transcript and score are
/// frozen and further exchanges are rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSession {
    key: SessionKey,
    conversation: Vec<Message>,
    ssi_score: Option<SsiScore>,
    is_completed: bool,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl ChatSession {
    /// Creates an empty `NotStarted` session. Nothing is persisted until the
    /// first exchange lands.
    #[must_use]
    pub fn new(key: SessionKey) -> Self {
        Self {
            key,
            conversation: Vec::new(),
            ssi_score: None,
            is_completed: false,
            started_at: None,
            finished_at: None,
        }
    }

    /// Rehydrates a session from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::InvalidPersistedState` when the stored
    /// flags contradict each other (completed with no exchange, a finish
    /// timestamp without the completed flag, or messages without a start
    /// timestamp).
    pub fn from_persisted(
        key: SessionKey,
        conversation: Vec<Message>,
        ssi_score: Option<SsiScore>,
        is_completed: bool,
        started_at: Option<DateTime<Utc>>,
        finished_at: Option<DateTime<Utc>>,
    ) -> Result<Self, SessionStateError> {
        if !conversation.is_empty() && started_at.is_none() {
            return Err(SessionStateError::InvalidPersistedState(
                "conversation present without started_at".into(),
            ));
        }
        if finished_at.is_some() != is_completed {
            return Err(SessionStateError::InvalidPersistedState(
                "finished_at and is_completed disagree".into(),
            ));
        }
        let session = Self {
            key,
            conversation,
            ssi_score,
            is_completed,
            started_at,
            finished_at,
        };
        if is_completed && !session.has_exchange() {
            return Err(SessionStateError::InvalidPersistedState(
                "completed session without any exchange".into(),
            ));
        }
        Ok(session)
    }

    #[must_use]
    pub fn key(&self) -> SessionKey {
        self.key
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.is_completed {
            SessionState::Completed
        } else if self.conversation.is_empty() {
            SessionState::NotStarted
        } else {
            SessionState::Active
        }
    }

    /// Full transcript including the hidden seed, in insertion order.
    ///
    /// This is what the scoring oracle sees; callers presenting history to a
    /// student must use [`ChatSession::visible_conversation`] instead.
    #[must_use]
    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }

    /// Transcript with the seed sentinel stripped. The seed must never reach
    /// a caller-facing surface.
    pub fn visible_conversation(&self) -> impl Iterator<Item = &Message> {
        self.conversation.iter().filter(|m| !m.is_seed())
    }

    #[must_use]
    pub fn ssi_score(&self) -> Option<SsiScore> {
        self.ssi_score
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.is_completed
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// True once at least one real exchange exists: a non-seed user message
    /// plus an assistant reply. The seeded opening question alone does not
    /// count.
    #[must_use]
    pub fn has_exchange(&self) -> bool {
        let real_user = self
            .conversation
            .iter()
            .any(|m| m.role() == MessageRole::User && !m.is_seed());
        let assistant = self
            .conversation
            .iter()
            .any(|m| m.role() == MessageRole::Assistant);
        real_user && assistant
    }

    /// Elapsed time: live while the session is open, frozen at `finished_at`
    /// once completed. `None` before the first exchange.
    #[must_use]
    pub fn time_spent(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.started_at
            .map(|started| self.finished_at.unwrap_or(now) - started)
    }

    /// Appends one user/assistant exchange. The only way the conversation
    /// grows, so transcript length is non-decreasing by construction.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::Completed` on a finished session and
    /// `SessionStateError::RoleMismatch` if the pair is not user-then-assistant.
    pub fn append_exchange(
        &mut self,
        user: Message,
        assistant: Message,
    ) -> Result<(), SessionStateError> {
        if self.is_completed {
            return Err(SessionStateError::Completed);
        }
        if user.role() != MessageRole::User || assistant.role() != MessageRole::Assistant {
            return Err(SessionStateError::RoleMismatch);
        }
        if self.started_at.is_none() {
            self.started_at = Some(user.timestamp());
        }
        self.conversation.push(user);
        self.conversation.push(assistant);
        Ok(())
    }

    /// Records a freshly computed SSI score, replacing the previous one.
    ///
    /// Callers keep the existing score when the oracle yields none; this
    /// method is only invoked with a real score.
    pub fn record_score(&mut self, score: SsiScore) {
        self.ssi_score = Some(score);
    }

    /// Marks the session completed, freezing transcript, score, and elapsed
    /// time. A no-op on an already-completed session, so unreliable clients
    /// can submit twice.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::NothingToFinish` before the first real
    /// exchange.
    pub fn finish(&mut self, at: DateTime<Utc>) -> Result<(), SessionStateError> {
        if self.is_completed {
            return Ok(());
        }
        if !self.has_exchange() {
            return Err(SessionStateError::NothingToFinish);
        }
        self.is_completed = true;
        self.finished_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn key() -> SessionKey {
        SessionKey::new(
            StudentId::new(),
            SessionScope::chapter(ModuleId::new(), ChapterId::new()),
        )
    }

    fn exchange(text: &str) -> (Message, Message) {
        let now = fixed_now();
        (
            Message::user(text, now).unwrap(),
            Message::assistant("noted, tell me more", now).unwrap(),
        )
    }

    #[test]
    fn fresh_session_is_not_started() {
        let session = ChatSession::new(key());
        assert_eq!(session.state(), SessionState::NotStarted);
        assert!(session.time_spent(fixed_now()).is_none());
    }

    #[test]
    fn first_exchange_activates_and_sets_started_at() {
        let mut session = ChatSession::new(key());
        let (user, assistant) = exchange("I want to build a tutoring app");
        session.append_exchange(user, assistant).unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.started_at(), Some(fixed_now()));
    }

    #[test]
    fn finish_requires_a_real_exchange() {
        let mut session = ChatSession::new(key());
        assert_eq!(
            session.finish(fixed_now()).unwrap_err(),
            SessionStateError::NothingToFinish
        );

        // A seeded opening question alone still does not count.
        let seed = Message::seed(fixed_now());
        let question = Message::assistant("What problem do you want to solve?", fixed_now()).unwrap();
        session.append_exchange(seed, question).unwrap();
        assert_eq!(
            session.finish(fixed_now()).unwrap_err(),
            SessionStateError::NothingToFinish
        );
    }

    #[test]
    fn finish_is_idempotent_and_locks_appends() {
        let mut session = ChatSession::new(key());
        let (user, assistant) = exchange("my answer");
        session.append_exchange(user, assistant).unwrap();

        session.finish(fixed_now()).unwrap();
        assert!(session.is_completed());
        session.finish(fixed_now() + Duration::hours(1)).unwrap();
        assert_eq!(session.finished_at(), Some(fixed_now()));

        let (user, assistant) = exchange("one more thing");
        assert_eq!(
            session.append_exchange(user, assistant).unwrap_err(),
            SessionStateError::Completed
        );
        assert_eq!(session.conversation().len(), 2);
    }

    #[test]
    fn time_spent_freezes_on_finish() {
        let mut session = ChatSession::new(key());
        let (user, assistant) = exchange("thinking out loud");
        session.append_exchange(user, assistant).unwrap();
        session.finish(fixed_now() + Duration::seconds(300)).unwrap();

        let much_later = fixed_now() + Duration::days(2);
        assert_eq!(session.time_spent(much_later), Some(Duration::seconds(300)));
    }

    #[test]
    fn visible_conversation_strips_seed() {
        let mut session = ChatSession::new(key());
        let seed = Message::seed(fixed_now());
        let question = Message::assistant("Where do you see opportunity?", fixed_now()).unwrap();
        session.append_exchange(seed, question).unwrap();
        let (user, assistant) = exchange("in after-school programs");
        session.append_exchange(user, assistant).unwrap();

        let visible: Vec<_> = session.visible_conversation().collect();
        assert_eq!(visible.len(), 3);
        assert!(visible.iter().all(|m| !m.is_seed()));
        assert_eq!(session.conversation().len(), 4);
    }

    #[test]
    fn from_persisted_rejects_contradictory_flags() {
        let err = ChatSession::from_persisted(key(), Vec::new(), None, true, None, None)
            .unwrap_err();
        assert!(matches!(err, SessionStateError::InvalidPersistedState(_)));

        let (user, assistant) = exchange("answer");
        let err = ChatSession::from_persisted(
            key(),
            vec![user, assistant],
            None,
            false,
            Some(fixed_now()),
            Some(fixed_now()),
        )
        .unwrap_err();
        assert!(matches!(err, SessionStateError::InvalidPersistedState(_)));
    }

    #[test]
    fn mismatched_roles_are_rejected() {
        let mut session = ChatSession::new(key());
        let now = fixed_now();
        let a = Message::assistant("question?", now).unwrap();
        let b = Message::assistant("another", now).unwrap();
        assert_eq!(
            session.append_exchange(a, b).unwrap_err(),
            SessionStateError::RoleMismatch
        );
        assert_eq!(session.state(), SessionState::NotStarted);
    }
}
