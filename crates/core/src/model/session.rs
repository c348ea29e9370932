use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::difficulty::DifficultyLevel;
use crate::mastery::MasteryPercentage;
use crate::model::{AnswerEvent, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TestSummaryError {
    #[error("completed_at is before started_at")]
    InvalidTimeRange,

    #[error("too many answers for a single test: {len}")]
    TooManyEvents { len: usize },

    #[error("correct answers ({correct}) exceed total answered ({total})")]
    CountMismatch { total: u32, correct: u32 },

    #[error("peak difficulty {peak} is below final difficulty {final_difficulty}")]
    PeakBelowFinal {
        peak: DifficultyLevel,
        final_difficulty: DifficultyLevel,
    },
}

/// Aggregate summary for a completed adaptive mini-test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestSessionSummary {
    user_id: UserId,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    total_answered: u32,
    correct: u32,
    final_difficulty: DifficultyLevel,
    peak_difficulty: DifficultyLevel,
}

impl TestSessionSummary {
    /// Rehydrate a summary from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `TestSummaryError` if the time range, counts or difficulties
    /// are inconsistent.
    pub fn from_persisted(
        user_id: UserId,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        total_answered: u32,
        correct: u32,
        final_difficulty: DifficultyLevel,
        peak_difficulty: DifficultyLevel,
    ) -> Result<Self, TestSummaryError> {
        if completed_at < started_at {
            return Err(TestSummaryError::InvalidTimeRange);
        }
        if correct > total_answered {
            return Err(TestSummaryError::CountMismatch {
                total: total_answered,
                correct,
            });
        }
        if peak_difficulty < final_difficulty {
            return Err(TestSummaryError::PeakBelowFinal {
                peak: peak_difficulty,
                final_difficulty,
            });
        }

        Ok(Self {
            user_id,
            started_at,
            completed_at,
            total_answered,
            correct,
            final_difficulty,
            peak_difficulty,
        })
    }

    /// Build a summary from the answers given during a test.
    ///
    /// # Errors
    ///
    /// Returns `TestSummaryError::InvalidTimeRange` if `completed_at` is before `started_at`.
    /// Returns `TestSummaryError::TooManyEvents` if the answer count cannot fit in `u32`.
    pub fn from_events(
        user_id: UserId,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        events: &[AnswerEvent],
        final_difficulty: DifficultyLevel,
        peak_difficulty: DifficultyLevel,
    ) -> Result<Self, TestSummaryError> {
        let total_answered = u32::try_from(events.len())
            .map_err(|_| TestSummaryError::TooManyEvents { len: events.len() })?;
        let correct = events.iter().filter(|e| e.is_correct).count();
        let correct = u32::try_from(correct).unwrap_or(total_answered);

        Self::from_persisted(
            user_id,
            started_at,
            completed_at,
            total_answered,
            correct,
            final_difficulty,
            peak_difficulty,
        )
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn total_answered(&self) -> u32 {
        self.total_answered
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn final_difficulty(&self) -> DifficultyLevel {
        self.final_difficulty
    }

    #[must_use]
    pub fn peak_difficulty(&self) -> DifficultyLevel {
        self.peak_difficulty
    }

    /// Share of correct answers; zero for an empty test.
    #[must_use]
    pub fn accuracy_percentage(&self) -> MasteryPercentage {
        if self.total_answered == 0 {
            return MasteryPercentage::ZERO;
        }
        MasteryPercentage::clamped(
            f64::from(self.correct) * 100.0 / f64::from(self.total_answered),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TopicId;
    use crate::time::fixed_now;
    use chrono::Duration;

    #[test]
    fn summary_counts_correct_answers() {
        let now = fixed_now();
        let topic = TopicId::new(1);
        let events = vec![
            AnswerEvent::new(topic, true),
            AnswerEvent::new(topic, true),
            AnswerEvent::new(topic, false),
            AnswerEvent::new(topic, true),
        ];

        let summary = TestSessionSummary::from_events(
            UserId::new(5),
            now,
            now + Duration::minutes(4),
            &events,
            DifficultyLevel::EASY,
            DifficultyLevel::MEDIUM,
        )
        .unwrap();

        assert_eq!(summary.total_answered(), 4);
        assert_eq!(summary.correct(), 3);
        assert_eq!(summary.accuracy_percentage().value(), 75);
    }

    #[test]
    fn rejects_reversed_time_range() {
        let now = fixed_now();
        let err = TestSessionSummary::from_events(
            UserId::new(1),
            now,
            now - Duration::seconds(1),
            &[],
            DifficultyLevel::EASY,
            DifficultyLevel::EASY,
        )
        .unwrap_err();
        assert_eq!(err, TestSummaryError::InvalidTimeRange);
    }

    #[test]
    fn from_persisted_rejects_impossible_counts() {
        let now = fixed_now();
        let err = TestSessionSummary::from_persisted(
            UserId::new(1),
            now,
            now,
            2,
            3,
            DifficultyLevel::EASY,
            DifficultyLevel::EASY,
        )
        .unwrap_err();
        assert_eq!(err, TestSummaryError::CountMismatch { total: 2, correct: 3 });
    }

    #[test]
    fn from_persisted_rejects_peak_below_final() {
        let now = fixed_now();
        let err = TestSessionSummary::from_persisted(
            UserId::new(1),
            now,
            now,
            8,
            8,
            DifficultyLevel::HARD,
            DifficultyLevel::MEDIUM,
        )
        .unwrap_err();
        assert!(matches!(err, TestSummaryError::PeakBelowFinal { .. }));
    }

    #[test]
    fn empty_summary_has_zero_accuracy() {
        let now = fixed_now();
        let summary = TestSessionSummary::from_events(
            UserId::new(1),
            now,
            now,
            &[],
            DifficultyLevel::EASY,
            DifficultyLevel::EASY,
        )
        .unwrap();
        assert_eq!(summary.accuracy_percentage(), MasteryPercentage::ZERO);
    }
}
