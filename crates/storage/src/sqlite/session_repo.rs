use async_trait::async_trait;

use surge_core::model::{ChatSession, SessionKey, StudentId};

use crate::repository::{ChatSessionRecord, SessionRepository, StorageError};

use super::SqliteRepository;
use super::mapping::{map_session_row, scope_to_columns, score_to_columns, ser};

#[async_trait]
impl SessionRepository for SqliteRepository {
    async fn get_session(&self, key: &SessionKey) -> Result<Option<ChatSession>, StorageError> {
        let (module_col, chapter_col) = scope_to_columns(key.scope());
        let row = sqlx::query(
            r"
                SELECT
                    student_id, module_id, chapter_id, conversation,
                    ssi_overall, ssi_self_awareness, ssi_understanding,
                    ssi_resilience, ssi_growth, ssi_leadership,
                    is_completed, started_at, finished_at
                FROM chat_sessions
                WHERE student_id = ?1 AND module_id = ?2 AND chapter_id = ?3
            ",
        )
        .bind(key.student().to_string())
        .bind(module_col)
        .bind(chapter_col)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_session_row).transpose()
    }

    async fn upsert_session(&self, session: &ChatSession) -> Result<(), StorageError> {
        let record = ChatSessionRecord::from_session(session);
        let (module_col, chapter_col) = scope_to_columns(record.key.scope());
        let conversation = serde_json::to_string(&record.conversation).map_err(ser)?;
        let [overall, self_awareness, understanding, resilience, growth, leadership] =
            score_to_columns(record.ssi_score);

        // Single UPSERT so concurrent writers for one key serialize inside
        // SQLite instead of interleaving a read-modify-write.
        sqlx::query(
            r"
                INSERT INTO chat_sessions (
                    student_id, module_id, chapter_id, conversation,
                    ssi_overall, ssi_self_awareness, ssi_understanding,
                    ssi_resilience, ssi_growth, ssi_leadership,
                    is_completed, started_at, finished_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                ON CONFLICT (student_id, module_id, chapter_id) DO UPDATE SET
                    conversation = excluded.conversation,
                    ssi_overall = excluded.ssi_overall,
                    ssi_self_awareness = excluded.ssi_self_awareness,
                    ssi_understanding = excluded.ssi_understanding,
                    ssi_resilience = excluded.ssi_resilience,
                    ssi_growth = excluded.ssi_growth,
                    ssi_leadership = excluded.ssi_leadership,
                    is_completed = excluded.is_completed,
                    started_at = excluded.started_at,
                    finished_at = excluded.finished_at
            ",
        )
        .bind(record.key.student().to_string())
        .bind(module_col)
        .bind(chapter_col)
        .bind(conversation)
        .bind(overall)
        .bind(self_awareness)
        .bind(understanding)
        .bind(resilience)
        .bind(growth)
        .bind(leadership)
        .bind(i64::from(record.is_completed))
        .bind(record.started_at)
        .bind(record.finished_at)
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn list_sessions_by_student(
        &self,
        student: StudentId,
    ) -> Result<Vec<ChatSession>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    student_id, module_id, chapter_id, conversation,
                    ssi_overall, ssi_self_awareness, ssi_understanding,
                    ssi_resilience, ssi_growth, ssi_leadership,
                    is_completed, started_at, finished_at
                FROM chat_sessions
                WHERE student_id = ?1
                ORDER BY module_id ASC, chapter_id ASC
            ",
        )
        .bind(student.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(map_session_row(row)?);
        }
        Ok(out)
    }
}
