use async_trait::async_trait;
use sqlx::Row;

use surge_core::model::{Chapter, Module, ModuleId};

use crate::repository::{ModuleRepository, StorageError};

use super::SqliteRepository;
use super::mapping::{chapter_id_from_text, module_id_from_text, ser};

fn map_module_row(row: &sqlx::sqlite::SqliteRow) -> Result<Module, StorageError> {
    let id = module_id_from_text(&row.try_get::<String, _>("id").map_err(ser)?)?;
    let title: String = row.try_get("title").map_err(ser)?;
    Module::new(id, title).map_err(ser)
}

fn map_chapter_row(row: &sqlx::sqlite::SqliteRow) -> Result<Chapter, StorageError> {
    let id = chapter_id_from_text(&row.try_get::<String, _>("id").map_err(ser)?)?;
    let module_id = module_id_from_text(&row.try_get::<String, _>("module_id").map_err(ser)?)?;
    let title: String = row.try_get("title").map_err(ser)?;
    let position_raw: i64 = row.try_get("position").map_err(ser)?;
    let position = u32::try_from(position_raw)
        .map_err(|_| StorageError::Serialization(format!("invalid position: {position_raw}")))?;
    let ai_enabled: i64 = row.try_get("ai_interaction_enabled").map_err(ser)?;
    Chapter::new(id, module_id, title, position, ai_enabled != 0).map_err(ser)
}

fn classify_insert_error(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StorageError::NotFound,
        _ => StorageError::Connection(e.to_string()),
    }
}

#[async_trait]
impl ModuleRepository for SqliteRepository {
    async fn insert_module(&self, module: &Module) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO modules (id, title) VALUES (?1, ?2)")
            .bind(module.id().to_string())
            .bind(module.title())
            .execute(self.pool())
            .await
            .map_err(classify_insert_error)?;
        Ok(())
    }

    async fn insert_chapter(&self, chapter: &Chapter) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO chapters (id, module_id, title, position, ai_interaction_enabled)
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(chapter.id().to_string())
        .bind(chapter.module_id().to_string())
        .bind(chapter.title())
        .bind(i64::from(chapter.position()))
        .bind(i64::from(chapter.ai_interaction_enabled()))
        .execute(self.pool())
        .await
        .map_err(classify_insert_error)?;
        Ok(())
    }

    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>, StorageError> {
        let row = sqlx::query("SELECT id, title FROM modules WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_module_row).transpose()
    }

    async fn list_modules(&self) -> Result<Vec<Module>, StorageError> {
        let rows = sqlx::query("SELECT id, title FROM modules ORDER BY title ASC, id ASC")
            .fetch_all(self.pool())
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(map_module_row(row)?);
        }
        Ok(out)
    }

    async fn list_chapters(&self, module: ModuleId) -> Result<Vec<Chapter>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, module_id, title, position, ai_interaction_enabled
                FROM chapters
                WHERE module_id = ?1
                ORDER BY position ASC
            ",
        )
        .bind(module.to_string())
        .fetch_all(self.pool())
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            out.push(map_chapter_row(row)?);
        }
        Ok(out)
    }
}
