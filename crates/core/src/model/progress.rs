use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ChapterId, ModuleId, StudentId};

/// Per-(student, module, chapter) unlock record.
///
/// `unlocked_complete` is flipped by the explicit "mark complete" student
/// action and is orthogonal to chat completion: finishing the chat never
/// implies the chapter was unlocked, but chat access requires the unlock
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterProgress {
    student: StudentId,
    module: ModuleId,
    chapter: ChapterId,
    unlocked_complete: bool,
    completed_at: Option<DateTime<Utc>>,
}

impl ChapterProgress {
    /// A fresh, still-locked progress record.
    #[must_use]
    pub fn locked(student: StudentId, module: ModuleId, chapter: ChapterId) -> Self {
        Self {
            student,
            module,
            chapter,
            unlocked_complete: false,
            completed_at: None,
        }
    }

    /// Rehydrates from storage; the flag and timestamp travel together.
    #[must_use]
    pub fn from_persisted(
        student: StudentId,
        module: ModuleId,
        chapter: ChapterId,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            student,
            module,
            chapter,
            unlocked_complete: completed_at.is_some(),
            completed_at,
        }
    }

    /// Marks the chapter complete. Idempotent: the first completion
    /// timestamp wins.
    pub fn mark_complete(&mut self, at: DateTime<Utc>) {
        if !self.unlocked_complete {
            self.unlocked_complete = true;
            self.completed_at = Some(at);
        }
    }

    #[must_use]
    pub fn student(&self) -> StudentId {
        self.student
    }

    #[must_use]
    pub fn module(&self) -> ModuleId {
        self.module
    }

    #[must_use]
    pub fn chapter(&self) -> ChapterId {
        self.chapter
    }

    #[must_use]
    pub fn unlocked_complete(&self) -> bool {
        self.unlocked_complete
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}
