use async_trait::async_trait;
use tutor_core::model::{TestSessionSummary, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_summary_row};
use crate::repository::{StorageError, SummaryRow, TestSummaryRepository};

#[async_trait]
impl TestSummaryRepository for SqliteRepository {
    async fn append_summary(&self, summary: &TestSessionSummary) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO test_summaries (
                    user_id, started_at, completed_at, total_answered,
                    correct, final_difficulty, peak_difficulty
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(id_to_i64("user_id", summary.user_id().value())?)
        .bind(summary.started_at())
        .bind(summary.completed_at())
        .bind(i64::from(summary.total_answered()))
        .bind(i64::from(summary.correct()))
        .bind(i64::from(summary.final_difficulty().value()))
        .bind(i64::from(summary.peak_difficulty().value()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn get_summary(&self, id: i64) -> Result<TestSessionSummary, StorageError> {
        let row = sqlx::query(
            r"
                SELECT
                    id, user_id, started_at, completed_at, total_answered,
                    correct, final_difficulty, peak_difficulty
                FROM test_summaries
                WHERE id = ?1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        Ok(map_summary_row(&row)?.summary)
    }

    async fn list_summaries(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<SummaryRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    id, user_id, started_at, completed_at, total_answered,
                    correct, final_difficulty, peak_difficulty
                FROM test_summaries
                WHERE user_id = ?1
                ORDER BY completed_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_summary_row).collect()
    }
}
