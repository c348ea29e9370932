use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tutor_core::model::{TestSessionSummary, TopicId, TopicMasteryRecord, UserId};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// A persisted test summary together with its row id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub id: i64,
    pub summary: TestSessionSummary,
}

impl SummaryRow {
    #[must_use]
    pub fn new(id: i64, summary: TestSessionSummary) -> Self {
        Self { id, summary }
    }
}

/// Repository contract for per-(user, topic) mastery records.
///
/// Writes are last-write-wins: two sessions updating the same topic at the
/// same time both succeed and the later write is what remains.
#[async_trait]
pub trait MasteryRepository: Send + Sync {
    /// Fetch the record for a user and topic, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn get_mastery(
        &self,
        user_id: UserId,
        topic_id: TopicId,
    ) -> Result<Option<TopicMasteryRecord>, StorageError>;

    /// Insert or replace the record for its (user, topic) pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_mastery(&self, record: &TopicMasteryRecord) -> Result<(), StorageError>;

    /// All records for a user, ordered by topic id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_mastery(&self, user_id: UserId) -> Result<Vec<TopicMasteryRecord>, StorageError>;
}

#[async_trait]
pub trait TestSummaryRepository: Send + Sync {
    /// Append a completed test summary and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the summary cannot be stored.
    async fn append_summary(&self, summary: &TestSessionSummary) -> Result<i64, StorageError>;

    /// Fetch a summary by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_summary(&self, id: i64) -> Result<TestSessionSummary, StorageError>;

    /// Most recent summaries for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_summaries(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<SummaryRow>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    mastery: Arc<Mutex<HashMap<(UserId, TopicId), TopicMasteryRecord>>>,
    summaries: Arc<Mutex<Vec<SummaryRow>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl MasteryRepository for InMemoryRepository {
    async fn get_mastery(
        &self,
        user_id: UserId,
        topic_id: TopicId,
    ) -> Result<Option<TopicMasteryRecord>, StorageError> {
        let guard = self.mastery.lock().map_err(poisoned)?;
        Ok(guard.get(&(user_id, topic_id)).cloned())
    }

    async fn upsert_mastery(&self, record: &TopicMasteryRecord) -> Result<(), StorageError> {
        let mut guard = self.mastery.lock().map_err(poisoned)?;
        guard.insert((record.user_id(), record.topic_id()), record.clone());
        Ok(())
    }

    async fn list_mastery(&self, user_id: UserId) -> Result<Vec<TopicMasteryRecord>, StorageError> {
        let guard = self.mastery.lock().map_err(poisoned)?;
        let mut records: Vec<_> = guard
            .values()
            .filter(|record| record.user_id() == user_id)
            .cloned()
            .collect();
        records.sort_by_key(TopicMasteryRecord::topic_id);
        Ok(records)
    }
}

#[async_trait]
impl TestSummaryRepository for InMemoryRepository {
    async fn append_summary(&self, summary: &TestSessionSummary) -> Result<i64, StorageError> {
        let mut guard = self.summaries.lock().map_err(poisoned)?;
        let id = i64::try_from(guard.len())
            .map_err(|_| StorageError::Serialization("summary id overflow".into()))?
            + 1;
        guard.push(SummaryRow::new(id, summary.clone()));
        Ok(id)
    }

    async fn get_summary(&self, id: i64) -> Result<TestSessionSummary, StorageError> {
        let guard = self.summaries.lock().map_err(poisoned)?;
        guard
            .iter()
            .find(|row| row.id == id)
            .map(|row| row.summary.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn list_summaries(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<SummaryRow>, StorageError> {
        let guard = self.summaries.lock().map_err(poisoned)?;
        let mut rows: Vec<_> = guard
            .iter()
            .filter(|row| row.summary.user_id() == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.summary
                .completed_at()
                .cmp(&a.summary.completed_at())
                .then(b.id.cmp(&a.id))
        });
        rows.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(rows)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub mastery: Arc<dyn MasteryRepository>,
    pub test_summaries: Arc<dyn TestSummaryRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let mastery: Arc<dyn MasteryRepository> = Arc::new(repo.clone());
        let test_summaries: Arc<dyn TestSummaryRepository> = Arc::new(repo);
        Self {
            mastery,
            test_summaries,
        }
    }
}
