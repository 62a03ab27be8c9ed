use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the full schema: module/chapter catalog, chat sessions with the
/// embedded conversation JSON and flattened SSI columns, per-chapter unlock
/// records, and lookup indexes.
///
/// The session key columns use `''` (not NULL) to mark the global scope so
/// the composite primary key keeps one row per (student, module, chapter):
/// SQLite treats NULLs in a primary key as distinct from each other.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS modules (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS chapters (
                    id TEXT PRIMARY KEY,
                    module_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    ai_interaction_enabled INTEGER NOT NULL CHECK (ai_interaction_enabled IN (0, 1)),
                    FOREIGN KEY (module_id) REFERENCES modules(id) ON DELETE CASCADE,
                    UNIQUE (module_id, position)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS chat_sessions (
                    student_id TEXT NOT NULL,
                    module_id TEXT NOT NULL DEFAULT '',
                    chapter_id TEXT NOT NULL DEFAULT '',
                    conversation TEXT NOT NULL,
                    ssi_overall INTEGER CHECK (ssi_overall BETWEEN 0 AND 100),
                    ssi_self_awareness INTEGER CHECK (ssi_self_awareness BETWEEN 0 AND 100),
                    ssi_understanding INTEGER CHECK (ssi_understanding BETWEEN 0 AND 100),
                    ssi_resilience INTEGER CHECK (ssi_resilience BETWEEN 0 AND 100),
                    ssi_growth INTEGER CHECK (ssi_growth BETWEEN 0 AND 100),
                    ssi_leadership INTEGER CHECK (ssi_leadership BETWEEN 0 AND 100),
                    is_completed INTEGER NOT NULL DEFAULT 0 CHECK (is_completed IN (0, 1)),
                    started_at TEXT,
                    finished_at TEXT,
                    PRIMARY KEY (student_id, module_id, chapter_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS chapter_progress (
                    student_id TEXT NOT NULL,
                    module_id TEXT NOT NULL,
                    chapter_id TEXT NOT NULL,
                    completed_at TEXT,
                    PRIMARY KEY (student_id, module_id, chapter_id),
                    FOREIGN KEY (chapter_id) REFERENCES chapters(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_chapters_module_position
                    ON chapters (module_id, position);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_chat_sessions_student
                    ON chat_sessions (student_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_chapter_progress_student
                    ON chapter_progress (student_id, module_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
    }

    Ok(())
}
