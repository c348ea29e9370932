use std::collections::HashMap;
use std::sync::Arc;

use storage::repository::{MasteryRepository, StorageError};
use tracing::{debug, info};
use tutor_core::model::{TopicEstimate, TopicId, TopicMasteryRecord, UserId};

use crate::Clock;
use crate::error::MasteryServiceError;

/// Folds externally produced topic estimates into persisted mastery records.
///
/// Each call performs one read and one write per distinct topic. There is no
/// locking across the read and the write; concurrent batches for the same
/// (user, topic) are last-write-wins.
#[derive(Clone)]
pub struct MasteryService {
    clock: Clock,
    repo: Arc<dyn MasteryRepository>,
}

impl MasteryService {
    #[must_use]
    pub fn new(clock: Clock, repo: Arc<dyn MasteryRepository>) -> Self {
        Self { clock, repo }
    }

    /// Blend a batch of estimates into the user's records and persist them.
    ///
    /// Estimates for the same topic within one batch are applied in order
    /// before the single write for that topic. Returned records follow the
    /// order in which topics first appear in `estimates`.
    ///
    /// # Errors
    ///
    /// Returns `MasteryServiceError::Storage` if a read or write fails. Topics
    /// written before the failure keep their new values.
    pub async fn apply_estimates(
        &self,
        user_id: UserId,
        estimates: &[TopicEstimate],
    ) -> Result<Vec<TopicMasteryRecord>, MasteryServiceError> {
        let now = self.clock.now();
        let mut merged: Vec<TopicMasteryRecord> = Vec::new();
        let mut index: HashMap<TopicId, usize> = HashMap::new();

        for estimate in estimates {
            if let Some(&i) = index.get(&estimate.topic_id) {
                merged[i] = merged[i].blend(estimate.percentage, now);
                continue;
            }

            let existing = self.repo.get_mastery(user_id, estimate.topic_id).await?;
            let record = TopicMasteryRecord::observe(
                existing.as_ref(),
                user_id,
                estimate.topic_id,
                estimate.percentage,
                now,
            );
            index.insert(estimate.topic_id, merged.len());
            merged.push(record);
        }

        for record in &merged {
            self.repo.upsert_mastery(record).await?;
            debug!(
                user = %user_id,
                topic = %record.topic_id(),
                progress = %record.progress(),
                label = %record.label(),
                "stored topic mastery"
            );
        }

        info!(user = %user_id, topics = merged.len(), "applied mastery estimates");
        Ok(merged)
    }

    /// Convenience wrapper for a single topic.
    ///
    /// # Errors
    ///
    /// Returns `MasteryServiceError::Storage` on persistence failures.
    pub async fn apply_estimate(
        &self,
        user_id: UserId,
        estimate: TopicEstimate,
    ) -> Result<TopicMasteryRecord, MasteryServiceError> {
        self.apply_estimates(user_id, &[estimate])
            .await?
            .into_iter()
            .next()
            .ok_or(MasteryServiceError::Storage(StorageError::NotFound))
    }

    /// # Errors
    ///
    /// Returns `MasteryServiceError::Storage` on persistence failures.
    pub async fn topic_mastery(
        &self,
        user_id: UserId,
        topic_id: TopicId,
    ) -> Result<Option<TopicMasteryRecord>, MasteryServiceError> {
        Ok(self.repo.get_mastery(user_id, topic_id).await?)
    }

    /// All of a user's topic records, ordered by topic id.
    ///
    /// # Errors
    ///
    /// Returns `MasteryServiceError::Storage` on persistence failures.
    pub async fn mastery_overview(
        &self,
        user_id: UserId,
    ) -> Result<Vec<TopicMasteryRecord>, MasteryServiceError> {
        Ok(self.repo.list_mastery(user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;
    use tutor_core::mastery::{MasteryLabel, MasteryPercentage};
    use tutor_core::time::{fixed_clock, fixed_now};

    fn pct(value: u8) -> MasteryPercentage {
        MasteryPercentage::try_new(value).unwrap()
    }

    fn service(repo: &InMemoryRepository) -> MasteryService {
        MasteryService::new(fixed_clock(), Arc::new(repo.clone()))
    }

    #[tokio::test]
    async fn first_batch_stores_estimates_verbatim() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let user = UserId::new(1);

        let records = svc
            .apply_estimates(
                user,
                &[
                    TopicEstimate::new(TopicId::new(1), pct(70)),
                    TopicEstimate::new(TopicId::new(2), pct(0)),
                ],
            )
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].progress(), pct(70));
        assert_eq!(records[0].label(), MasteryLabel::InProgress);
        assert_eq!(records[1].label(), MasteryLabel::NotAttempted);
        assert_eq!(records[0].last_practiced_at(), fixed_now());
        assert_eq!(svc.mastery_overview(user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn later_batch_blends_with_stored_value() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let user = UserId::new(1);
        let topic = TopicId::new(4);

        svc.apply_estimate(user, TopicEstimate::new(topic, pct(40)))
            .await
            .unwrap();
        let updated = svc
            .apply_estimate(user, TopicEstimate::new(topic, pct(90)))
            .await
            .unwrap();

        assert_eq!(updated.progress(), pct(70));
        let stored = svc.topic_mastery(user, topic).await.unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn duplicate_topics_in_batch_fold_in_order() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let user = UserId::new(2);
        let topic = TopicId::new(1);

        let records = svc
            .apply_estimates(
                user,
                &[
                    TopicEstimate::new(topic, pct(40)),
                    TopicEstimate::new(topic, pct(90)),
                ],
            )
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].progress(), pct(70));
    }

    #[tokio::test]
    async fn fractional_estimates_are_rounded_after_blending() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let user = UserId::new(3);
        let topic = TopicId::new(8);

        svc.apply_estimate(user, TopicEstimate::new(topic, pct(0)))
            .await
            .unwrap();
        let updated = svc
            .apply_estimate(user, TopicEstimate::new(topic, 0.8))
            .await
            .unwrap();

        assert_eq!(updated.progress(), pct(0));
        assert_eq!(updated.label(), MasteryLabel::NotAttempted);
    }

    #[tokio::test]
    async fn users_do_not_share_records() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo);
        let topic = TopicId::new(1);

        svc.apply_estimate(UserId::new(1), TopicEstimate::new(topic, pct(90)))
            .await
            .unwrap();
        let other = svc
            .apply_estimate(UserId::new(2), TopicEstimate::new(topic, pct(10)))
            .await
            .unwrap();

        assert_eq!(other.progress(), pct(10));
    }

    struct FailingRepo;

    #[async_trait::async_trait]
    impl MasteryRepository for FailingRepo {
        async fn get_mastery(
            &self,
            _user_id: UserId,
            _topic_id: TopicId,
        ) -> Result<Option<TopicMasteryRecord>, StorageError> {
            Ok(None)
        }

        async fn upsert_mastery(&self, _record: &TopicMasteryRecord) -> Result<(), StorageError> {
            Err(StorageError::Connection("offline".into()))
        }

        async fn list_mastery(
            &self,
            _user_id: UserId,
        ) -> Result<Vec<TopicMasteryRecord>, StorageError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn write_failures_propagate() {
        let svc = MasteryService::new(fixed_clock(), Arc::new(FailingRepo));
        let err = svc
            .apply_estimate(UserId::new(1), TopicEstimate::new(TopicId::new(1), pct(50)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MasteryServiceError::Storage(StorageError::Connection(_))
        ));
    }
}
