//! Chat session lifecycle: seeding, exchanges, scoring, and completion.
//!
//! Every mutation follows the same shape: load the session, apply the domain
//! transition, persist the whole session in one upsert, all under a per-key
//! lock so whole turns serialize. A turn that fails at the oracle persists
//! nothing, so the transcript never carries an unanswered user message.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard};

use storage::repository::{ProgressRepository, SessionRepository, StorageError};
use surge_core::model::{
    ChatSession, Message, MessageRole, SEED_SENTINEL, SessionKey, SessionScope, SsiScore,
    StudentId,
};
use surge_core::time::Clock;

use crate::completion_service::CompletionService;
use crate::error::ChatError;
use crate::oracle::ScoringOracle;

/// Result of one chat turn: the visible assistant reply plus the score as it
/// stands after the turn (retained from before when the oracle declined to
/// score).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub ai_message: String,
    pub ssi_score: Option<SsiScore>,
}

/// Student-facing view of a session. The conversation excludes the hidden
/// seed message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatHistory {
    pub conversation: Vec<Message>,
    pub ssi_score: Option<SsiScore>,
    pub is_completed: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub time_spent_secs: Option<i64>,
}

/// Result of finishing a session: the frozen score plus whether the student
/// has now completed every module they have touched.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishOutcome {
    pub final_ssi: Option<SsiScore>,
    pub all_modules_completed: bool,
}

/// One session's contribution to a student's SSI report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SsiReportRow {
    pub scope: SessionScope,
    pub score: Option<SsiScore>,
    pub is_completed: bool,
}

/// Cross-session SSI view for one student. The average is the per-dimension
/// mean over scored sessions only; `None` when nothing is scored yet.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SsiReport {
    pub sessions: Vec<SsiReportRow>,
    pub average: Option<SsiScore>,
}

/// One async mutex per session key. The repository upsert is atomic per
/// statement, but a turn is a read, an oracle call, and a write; the lock
/// makes that whole span exclusive so concurrent turns for one session
/// cannot commit from the same stale snapshot.
#[derive(Clone, Default)]
struct SessionLocks {
    inner: Arc<Mutex<HashMap<SessionKey, Arc<Mutex<()>>>>>,
}

impl SessionLocks {
    async fn acquire(&self, key: SessionKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            Arc::clone(map.entry(key).or_default())
        };
        lock.lock_owned().await
    }
}

#[derive(Clone)]
pub struct ChatService {
    clock: Clock,
    sessions: Arc<dyn SessionRepository>,
    progress: Arc<dyn ProgressRepository>,
    oracle: Arc<dyn ScoringOracle>,
    completion: CompletionService,
    turn_locks: SessionLocks,
}

impl ChatService {
    #[must_use]
    pub fn new(
        clock: Clock,
        sessions: Arc<dyn SessionRepository>,
        progress: Arc<dyn ProgressRepository>,
        oracle: Arc<dyn ScoringOracle>,
        completion: CompletionService,
    ) -> Self {
        Self {
            clock,
            sessions,
            progress,
            oracle,
            completion,
            turn_locks: SessionLocks::default(),
        }
    }

    /// Loads the session for a key, or a fresh `NotStarted` one. Nothing is
    /// persisted until the first exchange lands, so merely opening a chat
    /// leaves no trace.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Storage` on repository failures.
    pub async fn start_or_get(&self, key: SessionKey) -> Result<ChatSession, ChatError> {
        Ok(self
            .sessions
            .get_session(&key)
            .await?
            .unwrap_or_else(|| ChatSession::new(key)))
    }

    /// Runs one chat turn: validates the gate, consults the oracle with the
    /// prospective transcript, and commits the exchange plus any fresh score
    /// in a single upsert. The whole turn holds the per-key lock, so two
    /// near-simultaneous calls for one session commit one after the other
    /// and neither exchange is lost.
    ///
    /// Sending the seed sentinel into a conversation that already has
    /// messages is a read-only no-op that replays the latest assistant
    /// reply, so a client that re-seeds on reload cannot duplicate the
    /// opening question.
    ///
    /// # Errors
    ///
    /// `ChatError::ChapterNotUnlocked` when a chapter-scoped chat is opened
    /// before the chapter is marked complete, `ChatError::SessionLocked` on
    /// a finished session, `ChatError::Oracle` when the oracle fails (in
    /// which case nothing is persisted), `ChatError::Message` on invalid
    /// input text, and `ChatError::Storage` on repository failures.
    pub async fn send_message(&self, key: SessionKey, text: &str) -> Result<ChatTurn, ChatError> {
        self.check_chapter_gate(&key).await?;

        let _turn = self.turn_locks.acquire(key).await;
        let mut session = self.start_or_get(key).await?;
        if session.is_completed() {
            return Err(ChatError::SessionLocked);
        }

        let now = self.clock.now();
        let is_seed = text == SEED_SENTINEL;
        if is_seed && !session.conversation().is_empty() {
            return Ok(Self::latest_turn(&session));
        }
        let user = if is_seed {
            Message::seed(now)
        } else {
            Message::user(text, now)?
        };

        // The oracle sees the transcript as it would look with this user
        // message appended; the session itself is not touched until the
        // oracle succeeds.
        let mut transcript = session.conversation().to_vec();
        transcript.push(user.clone());
        let reply = match self.oracle.exchange(&transcript).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(error = %err, "oracle exchange failed, turn discarded");
                return Err(err.into());
            }
        };

        let assistant = Message::assistant(&reply.message, now)?;
        session.append_exchange(user, assistant)?;
        if let Some(score) = reply.score {
            session.record_score(score);
        }
        self.sessions.upsert_session(&session).await?;

        Ok(ChatTurn {
            ai_message: reply.message,
            ssi_score: session.ssi_score(),
        })
    }

    /// Marks the session completed, freezing its transcript, score, and
    /// elapsed time, and reports whether the student has now completed all
    /// their modules. Finishing an already-completed session is a no-op that
    /// returns the frozen score.
    ///
    /// # Errors
    ///
    /// `ChatError::NothingToFinish` when the session does not exist or has
    /// no real exchange yet, `ChatError::Storage` on repository failures.
    pub async fn finish(&self, key: SessionKey) -> Result<FinishOutcome, ChatError> {
        let _turn = self.turn_locks.acquire(key).await;
        let Some(mut session) = self.sessions.get_session(&key).await? else {
            return Err(ChatError::NothingToFinish);
        };

        if !session.is_completed() {
            session.finish(self.clock.now())?;
            self.sessions.upsert_session(&session).await?;
            tracing::info!(student = %key.student(), "chat session finished");
        }

        let status = self.completion.student_completion(key.student()).await?;
        Ok(FinishOutcome {
            final_ssi: session.ssi_score(),
            all_modules_completed: status.all_completed,
        })
    }

    /// Student-facing history for a session; an unknown key reads as an
    /// empty, unstarted chat.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Storage` on repository failures.
    pub async fn history(&self, key: SessionKey) -> Result<ChatHistory, ChatError> {
        let session = self.start_or_get(key).await?;
        Ok(ChatHistory {
            conversation: session.visible_conversation().cloned().collect(),
            ssi_score: session.ssi_score(),
            is_completed: session.is_completed(),
            started_at: session.started_at(),
            time_spent_secs: session
                .time_spent(self.clock.now())
                .map(|d| d.num_seconds()),
        })
    }

    /// All of a student's sessions, chapter-scoped and global alike.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Storage` on repository failures.
    pub async fn list_sessions(&self, student: StudentId) -> Result<Vec<ChatSession>, ChatError> {
        Ok(self.sessions.list_sessions_by_student(student).await?)
    }

    /// Cross-session SSI report with a per-dimension mean over the scored
    /// sessions.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Storage` on repository failures.
    pub async fn ssi_report(&self, student: StudentId) -> Result<SsiReport, ChatError> {
        let sessions = self.sessions.list_sessions_by_student(student).await?;
        let rows: Vec<SsiReportRow> = sessions
            .iter()
            .map(|s| SsiReportRow {
                scope: s.key().scope(),
                score: s.ssi_score(),
                is_completed: s.is_completed(),
            })
            .collect();
        let average = average_score(rows.iter().filter_map(|r| r.score));
        Ok(SsiReport {
            sessions: rows,
            average,
        })
    }

    /// Admin override: replace a session's score outright, completed or not.
    ///
    /// # Errors
    ///
    /// `ChatError::Storage(StorageError::NotFound)` when no session exists
    /// under the key.
    pub async fn override_ssi(&self, key: SessionKey, score: SsiScore) -> Result<(), ChatError> {
        let _turn = self.turn_locks.acquire(key).await;
        let Some(mut session) = self.sessions.get_session(&key).await? else {
            return Err(ChatError::Storage(StorageError::NotFound));
        };
        session.record_score(score);
        self.sessions.upsert_session(&session).await?;
        tracing::info!(student = %key.student(), "ssi score overridden");
        Ok(())
    }

    async fn check_chapter_gate(&self, key: &SessionKey) -> Result<(), ChatError> {
        let SessionScope::Chapter { module, chapter } = key.scope() else {
            return Ok(());
        };
        let unlocked = self
            .progress
            .get_progress(key.student(), module, chapter)
            .await?
            .is_some_and(|p| p.unlocked_complete());
        if unlocked {
            Ok(())
        } else {
            Err(ChatError::ChapterNotUnlocked)
        }
    }

    /// Replay of the most recent assistant reply, for idempotent re-seeds.
    fn latest_turn(session: &ChatSession) -> ChatTurn {
        let ai_message = session
            .conversation()
            .iter()
            .rev()
            .find(|m| m.role() == MessageRole::Assistant)
            .map(|m| m.text().to_string())
            .unwrap_or_default();
        ChatTurn {
            ai_message,
            ssi_score: session.ssi_score(),
        }
    }
}

fn average_score(scores: impl Iterator<Item = SsiScore>) -> Option<SsiScore> {
    let mut sums = [0_u32; 6];
    let mut count = 0_u32;
    for score in scores {
        sums[0] += u32::from(score.overall());
        sums[1] += u32::from(score.self_awareness());
        sums[2] += u32::from(score.understanding_opportunities());
        sums[3] += u32::from(score.resilience());
        sums[4] += u32::from(score.growth_execution());
        sums[5] += u32::from(score.entrepreneurial_leadership());
        count += 1;
    }
    if count == 0 {
        return None;
    }
    let mean = |sum: u32| u8::try_from(sum / count).unwrap_or(100);
    SsiScore::new(
        mean(sums[0]),
        mean(sums[1]),
        mean(sums[2]),
        mean(sums[3]),
        mean(sums[4]),
        mean(sums[5]),
    )
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_no_scores_is_none() {
        assert!(average_score(std::iter::empty()).is_none());
    }

    #[test]
    fn average_is_per_dimension_mean() {
        let scores = [
            SsiScore::new(40, 50, 60, 70, 80, 90).unwrap(),
            SsiScore::new(60, 70, 80, 90, 100, 100).unwrap(),
        ];
        let avg = average_score(scores.into_iter()).unwrap();
        assert_eq!(avg.overall(), 50);
        assert_eq!(avg.self_awareness(), 60);
        assert_eq!(avg.entrepreneurial_leadership(), 95);
    }

    #[test]
    fn average_floors_fractions() {
        let scores = [
            SsiScore::new(50, 0, 0, 0, 0, 0).unwrap(),
            SsiScore::new(51, 0, 0, 0, 0, 0).unwrap(),
        ];
        let avg = average_score(scores.into_iter()).unwrap();
        assert_eq!(avg.overall(), 50);
    }
}
