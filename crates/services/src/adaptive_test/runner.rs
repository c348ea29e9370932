use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;

use tutor_core::difficulty::{DifficultyLevel, DifficultyState, init_session};
use tutor_core::model::{AnswerEvent, QuestionId, TestSessionSummary, UserId};

use super::pool::{Question, QuestionPool};
use super::progress::TestProgress;
use crate::error::AdaptiveTestError;

//
// ─── RUNNER ────────────────────────────────────────────────────────────────────
//

/// In-memory adaptive mini-test for one learner.
///
/// Holds the difficulty state between answers and records every answer as an
/// `AnswerEvent`. The test completes when `question_limit` answers have been
/// recorded or when the caller ends it early because the pool ran dry.
pub struct AdaptiveTestRunner {
    user_id: UserId,
    state: DifficultyState,
    question_limit: u32,
    events: Vec<AnswerEvent>,
    asked: HashSet<QuestionId>,
    peak_difficulty: DifficultyLevel,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    summary_id: Option<i64>,
    mastery_applied: bool,
}

impl AdaptiveTestRunner {
    /// Start a test at the easiest tier.
    ///
    /// # Errors
    ///
    /// Returns `AdaptiveTestError::InvalidQuestionLimit` if `question_limit` is zero.
    pub fn new(
        user_id: UserId,
        question_limit: u32,
        started_at: DateTime<Utc>,
    ) -> Result<Self, AdaptiveTestError> {
        if question_limit == 0 {
            return Err(AdaptiveTestError::InvalidQuestionLimit);
        }

        let state = init_session();
        Ok(Self {
            user_id,
            state,
            question_limit,
            events: Vec::new(),
            asked: HashSet::new(),
            peak_difficulty: state.difficulty(),
            started_at,
            completed_at: None,
            summary_id: None,
            mastery_applied: false,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn state(&self) -> DifficultyState {
        self.state
    }

    #[must_use]
    pub fn question_limit(&self) -> u32 {
        self.question_limit
    }

    #[must_use]
    pub fn events(&self) -> &[AnswerEvent] {
        &self.events
    }

    #[must_use]
    pub fn peak_difficulty(&self) -> DifficultyLevel {
        self.peak_difficulty
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn summary_id(&self) -> Option<i64> {
        self.summary_id
    }

    /// True once the answers of a completed test were folded into mastery.
    #[must_use]
    pub fn mastery_applied(&self) -> bool {
        self.mastery_applied
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    #[must_use]
    pub fn was_asked(&self, id: QuestionId) -> bool {
        self.asked.contains(&id)
    }

    #[must_use]
    pub fn progress(&self) -> TestProgress {
        let answered = self.state.total_answered();
        TestProgress {
            question_limit: self.question_limit,
            answered,
            remaining: self.question_limit.saturating_sub(answered),
            score: self.state.score(),
            difficulty: self.state.difficulty(),
            is_complete: self.is_complete(),
        }
    }

    /// Question to show next, at (or nearest to) the current tier.
    ///
    /// Returns `None` once the test is complete or the pool has nothing left.
    #[must_use]
    pub fn next_question<'p>(&self, pool: &'p QuestionPool) -> Option<&'p Question> {
        if self.is_complete() {
            return None;
        }
        pool.next_for(self.state.difficulty(), &self.asked)
    }

    /// Record an answer to `question` and advance the difficulty state.
    ///
    /// # Errors
    ///
    /// Returns `AdaptiveTestError::Completed` if the test already finished, or
    /// `AdaptiveTestError::AlreadyAnswered` if the question was answered before.
    pub fn answer(
        &mut self,
        question: &Question,
        is_correct: bool,
        answered_at: DateTime<Utc>,
        time_taken_secs: Option<u32>,
    ) -> Result<DifficultyState, AdaptiveTestError> {
        if self.is_complete() {
            return Err(AdaptiveTestError::Completed);
        }
        if !self.asked.insert(question.id) {
            return Err(AdaptiveTestError::AlreadyAnswered(question.id));
        }

        let mut event = AnswerEvent::new(question.topic_id, is_correct).with_answered_at(answered_at);
        if let Some(secs) = time_taken_secs {
            event = event.with_time_taken(secs);
        }
        self.events.push(event);

        let before = self.state.difficulty();
        self.state = self.state.record_answer(is_correct);
        self.peak_difficulty = self.peak_difficulty.max(self.state.difficulty());

        tracing::debug!(
            question = %question.id,
            correct = is_correct,
            from = %before,
            to = %self.state.difficulty(),
            score = self.state.score(),
            "recorded adaptive answer"
        );

        if self.state.is_finished(self.question_limit) {
            self.completed_at = Some(answered_at.max(self.started_at));
        }

        Ok(self.state)
    }

    /// End the test before the limit, e.g. when the pool is exhausted.
    ///
    /// Has no effect on a test that is already complete.
    pub fn finish_early(&mut self, at: DateTime<Utc>) {
        if self.completed_at.is_none() {
            tracing::info!(
                answered = self.state.total_answered(),
                limit = self.question_limit,
                "adaptive test ended early"
            );
            self.completed_at = Some(at.max(self.started_at));
        }
    }

    /// Summary of a completed test.
    ///
    /// # Errors
    ///
    /// Returns `AdaptiveTestError::NotComplete` while the test is running.
    pub fn summary(&self) -> Result<TestSessionSummary, AdaptiveTestError> {
        let completed_at = self.completed_at.ok_or(AdaptiveTestError::NotComplete)?;
        Ok(TestSessionSummary::from_events(
            self.user_id,
            self.started_at,
            completed_at,
            &self.events,
            self.state.difficulty(),
            self.peak_difficulty,
        )?)
    }

    pub(crate) fn set_summary_id(&mut self, id: i64) {
        self.summary_id = Some(id);
    }

    pub(crate) fn mark_mastery_applied(&mut self) {
        self.mastery_applied = true;
    }
}

impl fmt::Debug for AdaptiveTestRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveTestRunner")
            .field("user_id", &self.user_id)
            .field("state", &self.state)
            .field("question_limit", &self.question_limit)
            .field("events_len", &self.events.len())
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .field("summary_id", &self.summary_id)
            .field("mastery_applied", &self.mastery_applied)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
