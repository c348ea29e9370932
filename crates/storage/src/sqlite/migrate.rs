use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Applies versioned schema migrations.
///
/// Version 1 creates `topic_mastery` and `test_summaries` with their indexes.
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

    if is_applied(pool, 1).await? {
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS topic_mastery (
                user_id INTEGER NOT NULL,
                topic_id INTEGER NOT NULL,
                progress INTEGER NOT NULL CHECK (progress BETWEEN 0 AND 100),
                label TEXT NOT NULL
                    CHECK (label IN ('mastered', 'in_progress', 'weak', 'not_attempted')),
                last_practiced_at TEXT NOT NULL,
                PRIMARY KEY (user_id, topic_id)
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS test_summaries (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                started_at TEXT NOT NULL,
                completed_at TEXT NOT NULL,
                total_answered INTEGER NOT NULL CHECK (total_answered >= 0),
                correct INTEGER NOT NULL CHECK (correct >= 0 AND correct <= total_answered),
                final_difficulty INTEGER NOT NULL CHECK (final_difficulty BETWEEN 1 AND 3),
                peak_difficulty INTEGER NOT NULL CHECK (peak_difficulty BETWEEN 1 AND 3)
            );
        ",
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r"
            CREATE INDEX IF NOT EXISTS idx_test_summaries_user_completed
                ON test_summaries (user_id, completed_at);
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
    tracing::info!(version = 1, "applied schema migration");

    Ok(())
}
