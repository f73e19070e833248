use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the full schema (canonical assessments, finalized results, and the
/// tab-scoped session state table).
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
                CREATE TABLE IF NOT EXISTS assessments (
                    id INTEGER PRIMARY KEY,
                    week TEXT,
                    time_limit_minutes INTEGER CHECK (time_limit_minutes > 0),
                    questions TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS results (
                    id TEXT NOT NULL,
                    student_id INTEGER NOT NULL,
                    assessment_id INTEGER NOT NULL,
                    week TEXT,
                    percentage INTEGER NOT NULL CHECK (percentage BETWEEN 0 AND 100),
                    correct_line TEXT NOT NULL,
                    answers TEXT NOT NULL,
                    started_at_display TEXT NOT NULL,
                    ended_at_display TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    PRIMARY KEY (student_id, assessment_id)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS session_state (
                    assessment_id INTEGER PRIMARY KEY,
                    started_at_ms INTEGER,
                    remaining_seconds INTEGER CHECK (remaining_seconds >= 0),
                    answers TEXT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)")
            .bind(1_i64)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
    }

    Ok(())
}
