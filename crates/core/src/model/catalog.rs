use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ChapterId, ModuleId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("title must not be empty")]
    EmptyTitle,
}

/// A paid learning module: an ordered collection of chapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    id: ModuleId,
    title: String,
}

impl Module {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle` for a blank title.
    pub fn new(id: ModuleId, title: impl Into<String>) -> Result<Self, CatalogError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CatalogError::EmptyTitle);
        }
        Ok(Self { id, title })
    }

    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }
}

/// One chapter inside a module, keyed by explicit foreign key rather than
/// embedded in the module document so the per-chapter unlock flag and chat
/// session stay independently queryable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    id: ChapterId,
    module_id: ModuleId,
    title: String,
    position: u32,
    ai_interaction_enabled: bool,
}

impl Chapter {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle` for a blank title.
    pub fn new(
        id: ChapterId,
        module_id: ModuleId,
        title: impl Into<String>,
        position: u32,
        ai_interaction_enabled: bool,
    ) -> Result<Self, CatalogError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CatalogError::EmptyTitle);
        }
        Ok(Self {
            id,
            module_id,
            title,
            position,
            ai_interaction_enabled,
        })
    }

    #[must_use]
    pub fn id(&self) -> ChapterId {
        self.id
    }

    #[must_use]
    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Whether this chapter carries a reflective AI conversation. Only
    /// AI-enabled chapters contribute a chat-completion gate to the
    /// student-level completion check.
    #[must_use]
    pub fn ai_interaction_enabled(&self) -> bool {
        self.ai_interaction_enabled
    }
}
