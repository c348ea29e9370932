use std::sync::Arc;

use storage::repository::Storage;
use tutor_core::model::{AnswerEvent, TopicMasteryRecord, UserId};

use crate::Clock;
use crate::adaptive_test::AdaptiveTestService;
use crate::ai::MasteryAnalysisClient;
use crate::error::TutorServicesError;
use crate::mastery_service::MasteryService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct TutorServices {
    mastery: Arc<MasteryService>,
    adaptive_tests: Arc<AdaptiveTestService>,
    analysis: Arc<MasteryAnalysisClient>,
}

impl TutorServices {
    /// Build services backed by `SQLite` storage, with the analysis client
    /// configured from the environment.
    ///
    /// # Errors
    ///
    /// Returns `TutorServicesError::Sqlite` if the database cannot be opened or
    /// migrated.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, TutorServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock, MasteryAnalysisClient::from_env()))
    }

    /// In-memory services with analysis disabled.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(&Storage::in_memory(), clock, MasteryAnalysisClient::new(None))
    }

    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock, analysis: MasteryAnalysisClient) -> Self {
        let mastery = Arc::new(MasteryService::new(clock, Arc::clone(&storage.mastery)));
        let adaptive_tests = Arc::new(AdaptiveTestService::new(
            clock,
            Arc::clone(&storage.test_summaries),
            Arc::clone(&storage.mastery),
        ));

        Self {
            mastery,
            adaptive_tests,
            analysis: Arc::new(analysis),
        }
    }

    #[must_use]
    pub fn mastery(&self) -> Arc<MasteryService> {
        Arc::clone(&self.mastery)
    }

    #[must_use]
    pub fn adaptive_tests(&self) -> Arc<AdaptiveTestService> {
        Arc::clone(&self.adaptive_tests)
    }

    #[must_use]
    pub fn analysis(&self) -> Arc<MasteryAnalysisClient> {
        Arc::clone(&self.analysis)
    }

    /// Ask the analysis client for estimates and fold them into mastery.
    ///
    /// # Errors
    ///
    /// Returns `TutorServicesError::Analysis` if the client is disabled or the
    /// call fails, or `TutorServicesError::Mastery` on persistence failures.
    pub async fn analyze_and_apply(
        &self,
        user_id: UserId,
        events: &[AnswerEvent],
    ) -> Result<Vec<TopicMasteryRecord>, TutorServicesError> {
        let estimates = self.analysis.analyze(events).await?;
        if estimates.is_empty() {
            tracing::info!(user = %user_id, "mastery analysis returned no topics");
            return Ok(Vec::new());
        }
        Ok(self.mastery.apply_estimates(user_id, &estimates).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::difficulty::DifficultyLevel;
    use tutor_core::model::{QuestionId, TopicId};
    use tutor_core::time::fixed_clock;

    use crate::adaptive_test::{Question, QuestionPool};
    use crate::error::AnalysisError;

    #[tokio::test]
    async fn analyze_and_apply_requires_configured_client() {
        let services = TutorServices::in_memory(fixed_clock());
        assert!(!services.analysis().enabled());

        let err = services
            .analyze_and_apply(UserId::new(1), &[AnswerEvent::new(TopicId::new(1), true)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TutorServicesError::Analysis(AnalysisError::Disabled)
        ));
    }

    #[tokio::test]
    async fn services_share_one_backend() {
        let services = TutorServices::in_memory(fixed_clock());
        let user = UserId::new(1);
        let pool = QuestionPool::new(vec![Question::new(
            QuestionId::new(1),
            TopicId::new(5),
            DifficultyLevel::EASY,
        )]);

        let tests = services.adaptive_tests();
        let mut runner = tests.start(user, &pool).unwrap();
        let result = tests
            .answer(&mut runner, &pool, QuestionId::new(1), true, None)
            .await
            .unwrap();
        assert!(result.is_complete);

        let overview = services.mastery().mastery_overview(user).await.unwrap();
        assert_eq!(overview.len(), 1);
        assert_eq!(overview[0].progress().value(), 100);
    }
}
