//! Chapter unlock tracking. Marking a chapter complete is what opens its
//! reflective AI chat.

use std::sync::Arc;

use storage::repository::{ModuleRepository, ProgressRepository};
use surge_core::model::{ChapterId, ChapterProgress, ModuleId, StudentId};
use surge_core::time::Clock;

use crate::error::ProgressError;

#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
    modules: Arc<dyn ModuleRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        modules: Arc<dyn ModuleRepository>,
    ) -> Self {
        Self {
            clock,
            progress,
            modules,
        }
    }

    /// Marks a chapter complete for a student, creating the progress record
    /// on first touch. Idempotent: repeating the call keeps the original
    /// completion timestamp.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownModule` or
    /// `ProgressError::UnknownChapter` when the pair is not in the catalog,
    /// and `ProgressError::Storage` on repository failures.
    pub async fn mark_chapter_complete(
        &self,
        student: StudentId,
        module: ModuleId,
        chapter: ChapterId,
    ) -> Result<ChapterProgress, ProgressError> {
        if self.modules.get_module(module).await?.is_none() {
            return Err(ProgressError::UnknownModule);
        }
        let chapters = self.modules.list_chapters(module).await?;
        if !chapters.iter().any(|c| c.id() == chapter) {
            return Err(ProgressError::UnknownChapter);
        }

        let mut record = self
            .progress
            .get_progress(student, module, chapter)
            .await?
            .unwrap_or_else(|| ChapterProgress::locked(student, module, chapter));
        record.mark_complete(self.clock.now());
        self.progress.upsert_progress(&record).await?;
        Ok(record)
    }

    /// All progress records for a student, any module.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` on repository failures.
    pub async fn list_progress(
        &self,
        student: StudentId,
    ) -> Result<Vec<ChapterProgress>, ProgressError> {
        Ok(self.progress.list_progress_by_student(student).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use storage::repository::InMemoryRepository;
    use surge_core::model::{Chapter, Module};
    use surge_core::time::{fixed_clock, fixed_now};

    async fn seeded() -> (InMemoryRepository, ModuleId, ChapterId) {
        let repo = InMemoryRepository::new();
        let module = Module::new(ModuleId::new(), "Foundations").unwrap();
        repo.insert_module(&module).await.unwrap();
        let chapter = Chapter::new(ChapterId::new(), module.id(), "Intro", 0, false).unwrap();
        repo.insert_chapter(&chapter).await.unwrap();
        (repo, module.id(), chapter.id())
    }

    fn service(repo: &InMemoryRepository, clock: Clock) -> ProgressService {
        ProgressService::new(clock, Arc::new(repo.clone()), Arc::new(repo.clone()))
    }

    #[tokio::test]
    async fn marks_chapter_complete_with_clock_time() {
        let (repo, module, chapter) = seeded().await;
        let student = StudentId::new();
        let record = service(&repo, fixed_clock())
            .mark_chapter_complete(student, module, chapter)
            .await
            .unwrap();
        assert!(record.unlocked_complete());
        assert_eq!(record.completed_at(), Some(fixed_now()));
    }

    #[tokio::test]
    async fn repeat_completion_keeps_first_timestamp() {
        let (repo, module, chapter) = seeded().await;
        let student = StudentId::new();
        let svc = service(&repo, fixed_clock());
        svc.mark_chapter_complete(student, module, chapter)
            .await
            .unwrap();

        let later = Clock::fixed(fixed_now() + Duration::hours(3));
        let svc = service(&repo, later);
        let record = svc
            .mark_chapter_complete(student, module, chapter)
            .await
            .unwrap();
        assert_eq!(record.completed_at(), Some(fixed_now()));
    }

    #[tokio::test]
    async fn unknown_chapter_is_rejected() {
        let (repo, module, _) = seeded().await;
        let err = service(&repo, fixed_clock())
            .mark_chapter_complete(StudentId::new(), module, ChapterId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::UnknownChapter));
    }

    #[tokio::test]
    async fn unknown_module_is_rejected() {
        let repo = InMemoryRepository::new();
        let err = service(&repo, fixed_clock())
            .mark_chapter_complete(StudentId::new(), ModuleId::new(), ChapterId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::UnknownModule));
    }
}
