//! Aggregates per-chapter progress and chat-session state into module and
//! student completion views.

use std::sync::Arc;

use serde::Serialize;

use storage::repository::{ModuleRepository, ProgressRepository, SessionRepository};
use surge_core::model::{ModuleId, SessionKey, SessionScope, StudentId};

use crate::error::CompletionError;

/// Completion summary of one module for one student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleCompletion {
    pub completed_chapters: u32,
    pub total_chapters: u32,
    /// Floor of `completed * 100 / total`; 0 for an empty module.
    pub completion_percentage: u8,
}

/// Per-module row of a student-wide completion report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleCompletionDetail {
    pub module_id: ModuleId,
    pub module_title: String,
    pub completed_chapters: u32,
    pub total_chapters: u32,
    pub completion_percentage: u8,
    pub is_complete: bool,
}

/// Student-wide completion status across every module they have touched.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionStatus {
    pub all_completed: bool,
    pub details: Vec<ModuleCompletionDetail>,
}

/// Read-only aggregation over the catalog, progress, and session
/// repositories. Cheap to clone; other services embed one.
#[derive(Clone)]
pub struct CompletionService {
    modules: Arc<dyn ModuleRepository>,
    progress: Arc<dyn ProgressRepository>,
    sessions: Arc<dyn SessionRepository>,
}

impl CompletionService {
    #[must_use]
    pub fn new(
        modules: Arc<dyn ModuleRepository>,
        progress: Arc<dyn ProgressRepository>,
        sessions: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            modules,
            progress,
            sessions,
        }
    }

    /// Chapter-completion counts for one module. Only persisted unlock
    /// records count as complete; the denominator always comes from the
    /// catalog, so an untouched module reads as 0 of N.
    ///
    /// # Errors
    ///
    /// Returns `CompletionError::Storage` on repository failures.
    pub async fn module_completion(
        &self,
        student: StudentId,
        module: ModuleId,
    ) -> Result<ModuleCompletion, CompletionError> {
        let chapters = self.modules.list_chapters(module).await?;
        let total_chapters = u32::try_from(chapters.len()).unwrap_or(u32::MAX);

        let mut completed_chapters = 0_u32;
        for chapter in &chapters {
            let record = self
                .progress
                .get_progress(student, module, chapter.id())
                .await?;
            if record.is_some_and(|p| p.unlocked_complete()) {
                completed_chapters += 1;
            }
        }

        let completion_percentage = if total_chapters == 0 {
            0
        } else {
            u8::try_from(u64::from(completed_chapters) * 100 / u64::from(total_chapters))
                .unwrap_or(100)
        };

        Ok(ModuleCompletion {
            completed_chapters,
            total_chapters,
            completion_percentage,
        })
    }

    /// Full completion status for a student.
    ///
    /// Only modules the student has progress records for are evaluated; a
    /// student with no recorded progress is never "all completed". A module
    /// counts as complete when every catalog chapter is unlocked AND every
    /// AI-enabled chapter's chat session has been finished.
    ///
    /// # Errors
    ///
    /// Returns `CompletionError::Storage` on repository failures.
    pub async fn student_completion(
        &self,
        student: StudentId,
    ) -> Result<CompletionStatus, CompletionError> {
        let records = self.progress.list_progress_by_student(student).await?;
        if records.is_empty() {
            return Ok(CompletionStatus {
                all_completed: false,
                details: Vec::new(),
            });
        }

        let mut module_ids: Vec<ModuleId> = Vec::new();
        for record in &records {
            if !module_ids.contains(&record.module()) {
                module_ids.push(record.module());
            }
        }

        let mut details = Vec::with_capacity(module_ids.len());
        for module_id in module_ids {
            let module_title = self
                .modules
                .get_module(module_id)
                .await?
                .map(|m| m.title().to_string())
                .unwrap_or_default();
            let counts = self.module_completion(student, module_id).await?;
            let chapters_done =
                counts.total_chapters > 0 && counts.completed_chapters == counts.total_chapters;
            let chats_done = self.ai_chats_finished(student, module_id).await?;
            details.push(ModuleCompletionDetail {
                module_id,
                module_title,
                completed_chapters: counts.completed_chapters,
                total_chapters: counts.total_chapters,
                completion_percentage: counts.completion_percentage,
                is_complete: chapters_done && chats_done,
            });
        }

        let all_completed = !details.is_empty() && details.iter().all(|d| d.is_complete);
        Ok(CompletionStatus {
            all_completed,
            details,
        })
    }

    /// Whether every AI-enabled chapter of the module has a finished chat
    /// session. Modules without AI chapters pass trivially.
    async fn ai_chats_finished(
        &self,
        student: StudentId,
        module: ModuleId,
    ) -> Result<bool, CompletionError> {
        let chapters = self.modules.list_chapters(module).await?;
        for chapter in chapters
            .iter()
            .filter(|c| c.ai_interaction_enabled())
        {
            let key = SessionKey::new(student, SessionScope::chapter(module, chapter.id()));
            let finished = self
                .sessions
                .get_session(&key)
                .await?
                .is_some_and(|s| s.is_completed());
            if !finished {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use storage::repository::InMemoryRepository;
    use surge_core::model::{Chapter, ChapterId, ChapterProgress, Module};
    use surge_core::time::fixed_now;

    fn service(repo: &InMemoryRepository) -> CompletionService {
        CompletionService::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    async fn seed_module(repo: &InMemoryRepository, chapters: u32) -> (ModuleId, Vec<ChapterId>) {
        let module = Module::new(ModuleId::new(), "Foundations").unwrap();
        repo.insert_module(&module).await.unwrap();
        let mut ids = Vec::new();
        for position in 0..chapters {
            let chapter = Chapter::new(
                ChapterId::new(),
                module.id(),
                format!("Chapter {position}"),
                position,
                false,
            )
            .unwrap();
            repo.insert_chapter(&chapter).await.unwrap();
            ids.push(chapter.id());
        }
        (module.id(), ids)
    }

    #[tokio::test]
    async fn untouched_module_is_zero_percent() {
        let repo = InMemoryRepository::new();
        let (module, _) = seed_module(&repo, 4).await;
        let completion = service(&repo)
            .module_completion(StudentId::new(), module)
            .await
            .unwrap();
        assert_eq!(completion.completed_chapters, 0);
        assert_eq!(completion.total_chapters, 4);
        assert_eq!(completion.completion_percentage, 0);
    }

    #[tokio::test]
    async fn percentage_floors_partial_progress() {
        let repo = InMemoryRepository::new();
        let (module, chapters) = seed_module(&repo, 3).await;
        let student = StudentId::new();

        let mut progress = ChapterProgress::locked(student, module, chapters[0]);
        progress.mark_complete(fixed_now());
        repo.upsert_progress(&progress).await.unwrap();

        let completion = service(&repo)
            .module_completion(student, module)
            .await
            .unwrap();
        assert_eq!(completion.completed_chapters, 1);
        // 1/3 floors to 33, never rounds up.
        assert_eq!(completion.completion_percentage, 33);
    }

    #[tokio::test]
    async fn locked_progress_record_does_not_count() {
        let repo = InMemoryRepository::new();
        let (module, chapters) = seed_module(&repo, 2).await;
        let student = StudentId::new();

        let progress = ChapterProgress::locked(student, module, chapters[0]);
        repo.upsert_progress(&progress).await.unwrap();

        let completion = service(&repo)
            .module_completion(student, module)
            .await
            .unwrap();
        assert_eq!(completion.completed_chapters, 0);
    }

    #[tokio::test]
    async fn student_with_no_progress_is_not_all_completed() {
        let repo = InMemoryRepository::new();
        seed_module(&repo, 2).await;
        let status = service(&repo)
            .student_completion(StudentId::new())
            .await
            .unwrap();
        assert!(!status.all_completed);
        assert!(status.details.is_empty());
    }

    #[tokio::test]
    async fn all_chapters_unlocked_completes_module_without_ai_chapters() {
        let repo = InMemoryRepository::new();
        let (module, chapters) = seed_module(&repo, 2).await;
        let student = StudentId::new();
        for chapter in chapters {
            let mut progress = ChapterProgress::locked(student, module, chapter);
            progress.mark_complete(fixed_now());
            repo.upsert_progress(&progress).await.unwrap();
        }

        let status = service(&repo).student_completion(student).await.unwrap();
        assert!(status.all_completed);
        assert_eq!(status.details.len(), 1);
        assert!(status.details[0].is_complete);
        assert_eq!(status.details[0].completion_percentage, 100);
    }
}
