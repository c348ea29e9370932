use async_trait::async_trait;
use tutor_core::model::{TopicId, TopicMasteryRecord, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_mastery_row};
use crate::repository::{MasteryRepository, StorageError};

#[async_trait]
impl MasteryRepository for SqliteRepository {
    async fn get_mastery(
        &self,
        user_id: UserId,
        topic_id: TopicId,
    ) -> Result<Option<TopicMasteryRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT user_id, topic_id, progress, label, last_practiced_at
                FROM topic_mastery
                WHERE user_id = ?1 AND topic_id = ?2
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .bind(id_to_i64("topic_id", topic_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_mastery_row).transpose()
    }

    async fn upsert_mastery(&self, record: &TopicMasteryRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO topic_mastery (user_id, topic_id, progress, label, last_practiced_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(user_id, topic_id) DO UPDATE SET
                    progress = excluded.progress,
                    label = excluded.label,
                    last_practiced_at = excluded.last_practiced_at
            ",
        )
        .bind(id_to_i64("user_id", record.user_id().value())?)
        .bind(id_to_i64("topic_id", record.topic_id().value())?)
        .bind(i64::from(record.progress().value()))
        .bind(record.label().as_str())
        .bind(record.last_practiced_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn list_mastery(&self, user_id: UserId) -> Result<Vec<TopicMasteryRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT user_id, topic_id, progress, label, last_practiced_at
                FROM topic_mastery
                WHERE user_id = ?1
                ORDER BY topic_id ASC
            ",
        )
        .bind(id_to_i64("user_id", user_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_mastery_row).collect()
    }
}
