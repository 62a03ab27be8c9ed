use async_trait::async_trait;

use surge_core::model::{ChapterId, ChapterProgress, ModuleId, StudentId};

use crate::repository::{ProgressRepository, StorageError};

use super::SqliteRepository;
use super::mapping::map_progress_row;

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        student: StudentId,
        module: ModuleId,
        chapter: ChapterId,
    ) -> Result<Option<ChapterProgress>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT student_id, module_id, chapter_id, completed_at
                FROM chapter_progress
                WHERE student_id = ?1 AND module_id = ?2 AND chapter_id = ?3
            ",
        )
        .bind(student.to_string())
        .bind(module.to_string())
        .bind(chapter.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn upsert_progress(&self, progress: &ChapterProgress) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO chapter_progress (student_id, module_id, chapter_id, completed_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (student_id, module_id, chapter_id) DO UPDATE SET
                    completed_at = excluded.completed_at
            ",
        )
        .bind(progress.student().to_string())
        .bind(progress.module().to_string())
        .bind(progress.chapter().to_string())
        .bind(progress.completed_at())
        .execute(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn list_progress_by_student(
        &self,
        student: StudentId,
    ) -> Result<Vec<ChapterProgress>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT student_id, module_id, chapter_id, completed_at
                FROM chapter_progress
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
            out.push(map_progress_row(row)?);
        }
        Ok(out)
    }
}
