use std::sync::Arc;

use storage::repository::{MasteryRepository, SummaryRow, TestSummaryRepository};
use tutor_core::difficulty::{DEFAULT_QUESTION_LIMIT, DifficultyState};
use tutor_core::mastery::observed_accuracy;
use tutor_core::model::{QuestionId, TopicMasteryRecord, UserId};

use super::pool::QuestionPool;
use super::runner::AdaptiveTestRunner;
use crate::Clock;
use crate::error::AdaptiveTestError;
use crate::mastery_service::MasteryService;

/// Result of answering a single question in an adaptive test.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveAnswerResult {
    pub state: DifficultyState,
    pub is_complete: bool,
    pub summary_id: Option<i64>,
    /// Mastery records written when the test completed; empty otherwise.
    pub mastery: Vec<TopicMasteryRecord>,
}

/// Orchestrates adaptive test start and persisted answering.
#[derive(Clone)]
pub struct AdaptiveTestService {
    clock: Clock,
    summaries: Arc<dyn TestSummaryRepository>,
    mastery: MasteryService,
    question_limit: u32,
    mastery_from_answers: bool,
}

impl AdaptiveTestService {
    #[must_use]
    pub fn new(
        clock: Clock,
        summaries: Arc<dyn TestSummaryRepository>,
        mastery: Arc<dyn MasteryRepository>,
    ) -> Self {
        Self {
            clock,
            summaries,
            mastery: MasteryService::new(clock, mastery),
            question_limit: DEFAULT_QUESTION_LIMIT,
            mastery_from_answers: true,
        }
    }

    #[must_use]
    pub fn with_question_limit(mut self, question_limit: u32) -> Self {
        self.question_limit = question_limit;
        self
    }

    /// Whether per-topic accuracy from a finished test is folded into mastery.
    #[must_use]
    pub fn with_mastery_from_answers(mut self, enabled: bool) -> Self {
        self.mastery_from_answers = enabled;
        self
    }

    #[must_use]
    pub fn question_limit(&self) -> u32 {
        self.question_limit
    }

    /// Start a new test for `user_id` over `pool`.
    ///
    /// # Errors
    ///
    /// Returns `AdaptiveTestError::EmptyPool` if there is nothing to ask, or
    /// `AdaptiveTestError::InvalidQuestionLimit` for a zero limit.
    pub fn start(
        &self,
        user_id: UserId,
        pool: &QuestionPool,
    ) -> Result<AdaptiveTestRunner, AdaptiveTestError> {
        if pool.is_empty() {
            return Err(AdaptiveTestError::EmptyPool);
        }
        let runner = AdaptiveTestRunner::new(user_id, self.question_limit, self.clock.now())?;
        tracing::info!(
            user = %user_id,
            pool = pool.len(),
            limit = self.question_limit,
            "started adaptive test"
        );
        Ok(runner)
    }

    /// Answer a question and persist the outcome once the test completes.
    ///
    /// The test also completes when the pool has no unasked question left.
    ///
    /// # Errors
    ///
    /// Returns `AdaptiveTestError::UnknownQuestion` if `question_id` is not in
    /// `pool`, runner errors for invalid answers, or storage errors while
    /// persisting the summary and mastery.
    pub async fn answer(
        &self,
        runner: &mut AdaptiveTestRunner,
        pool: &QuestionPool,
        question_id: QuestionId,
        is_correct: bool,
        time_taken_secs: Option<u32>,
    ) -> Result<AdaptiveAnswerResult, AdaptiveTestError> {
        let question = *pool
            .get(question_id)
            .ok_or(AdaptiveTestError::UnknownQuestion(question_id))?;
        let answered_at = self.clock.now();
        let state = runner.answer(&question, is_correct, answered_at, time_taken_secs)?;

        if !runner.is_complete() && runner.next_question(pool).is_none() {
            runner.finish_early(answered_at);
        }

        let mastery = if runner.is_complete() {
            self.complete(runner).await?
        } else {
            Vec::new()
        };

        Ok(AdaptiveAnswerResult {
            state,
            is_complete: runner.is_complete(),
            summary_id: runner.summary_id(),
            mastery,
        })
    }

    /// Persist a completed test.
    ///
    /// The summary is appended only once per runner and the answers are
    /// folded into mastery only once. If the mastery write fails, calling this
    /// again retries the mastery step without storing a second summary. Once
    /// both steps succeeded it returns an empty list.
    ///
    /// # Errors
    ///
    /// Returns `AdaptiveTestError::NotComplete` for a running test, or storage
    /// errors.
    pub async fn complete(
        &self,
        runner: &mut AdaptiveTestRunner,
    ) -> Result<Vec<TopicMasteryRecord>, AdaptiveTestError> {
        let summary = runner.summary()?;
        if runner.summary_id().is_none() {
            let id = self.summaries.append_summary(&summary).await?;
            runner.set_summary_id(id);
            tracing::info!(
                user = %summary.user_id(),
                summary_id = id,
                answered = summary.total_answered(),
                correct = summary.correct(),
                final_difficulty = %summary.final_difficulty(),
                "stored adaptive test summary"
            );
        }

        if !self.mastery_from_answers || runner.mastery_applied() {
            return Ok(Vec::new());
        }
        let estimates = observed_accuracy(runner.events());
        let records = self
            .mastery
            .apply_estimates(runner.user_id(), &estimates)
            .await?;
        runner.mark_mastery_applied();
        Ok(records)
    }

    /// Most recent test summaries for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AdaptiveTestError::Storage` on persistence failures.
    pub async fn recent_summaries(
        &self,
        user_id: UserId,
        limit: u32,
    ) -> Result<Vec<SummaryRow>, AdaptiveTestError> {
        Ok(self.summaries.list_summaries(user_id, limit).await?)
    }
}
