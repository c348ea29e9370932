use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mastery::{MasteryEstimate, MasteryLabel, MasteryPercentage, classify, update_mastery};
use crate::model::{TopicId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MasteryRecordError {
    #[error("stored label {stored} does not match {progress} (expected {expected})")]
    LabelMismatch {
        progress: MasteryPercentage,
        stored: MasteryLabel,
        expected: MasteryLabel,
    },
}

/// An externally produced mastery estimate for one topic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopicEstimate {
    pub topic_id: TopicId,
    pub percentage: MasteryEstimate,
}

impl TopicEstimate {
    #[must_use]
    pub fn new(topic_id: TopicId, percentage: impl Into<MasteryEstimate>) -> Self {
        Self {
            topic_id,
            percentage: percentage.into(),
        }
    }
}

/// Persisted mastery for one (user, topic) pair.
///
/// The label is derived from `progress` by every constructor, so a record
/// never carries a label that disagrees with its percentage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicMasteryRecord {
    user_id: UserId,
    topic_id: TopicId,
    progress: MasteryPercentage,
    label: MasteryLabel,
    last_practiced_at: DateTime<Utc>,
}

impl TopicMasteryRecord {
    /// Record created from the first estimate seen for a topic.
    #[must_use]
    pub fn first_observation(
        user_id: UserId,
        topic_id: TopicId,
        estimate: impl Into<MasteryEstimate>,
        practiced_at: DateTime<Utc>,
    ) -> Self {
        let update = update_mastery(None, estimate);
        Self {
            user_id,
            topic_id,
            progress: update.percentage,
            label: update.label,
            last_practiced_at: practiced_at,
        }
    }

    /// Blend a new estimate into this record and return the updated record.
    #[must_use]
    pub fn blend(&self, estimate: impl Into<MasteryEstimate>, practiced_at: DateTime<Utc>) -> Self {
        let update = update_mastery(Some(self.progress), estimate);
        Self {
            user_id: self.user_id,
            topic_id: self.topic_id,
            progress: update.percentage,
            label: update.label,
            last_practiced_at: practiced_at,
        }
    }

    /// Fold an estimate into an optional existing record.
    #[must_use]
    pub fn observe(
        existing: Option<&Self>,
        user_id: UserId,
        topic_id: TopicId,
        estimate: impl Into<MasteryEstimate>,
        practiced_at: DateTime<Utc>,
    ) -> Self {
        match existing {
            Some(record) => record.blend(estimate, practiced_at),
            None => Self::first_observation(user_id, topic_id, estimate, practiced_at),
        }
    }

    /// Rehydrate a record from storage, checking the stored label.
    ///
    /// # Errors
    ///
    /// Returns `MasteryRecordError::LabelMismatch` if `label` is not what
    /// `progress` classifies to.
    pub fn from_persisted(
        user_id: UserId,
        topic_id: TopicId,
        progress: MasteryPercentage,
        label: MasteryLabel,
        last_practiced_at: DateTime<Utc>,
    ) -> Result<Self, MasteryRecordError> {
        let expected = classify(progress);
        if expected != label {
            return Err(MasteryRecordError::LabelMismatch {
                progress,
                stored: label,
                expected,
            });
        }

        Ok(Self {
            user_id,
            topic_id,
            progress,
            label,
            last_practiced_at,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    #[must_use]
    pub fn progress(&self) -> MasteryPercentage {
        self.progress
    }

    #[must_use]
    pub fn label(&self) -> MasteryLabel {
        self.label
    }

    #[must_use]
    pub fn last_practiced_at(&self) -> DateTime<Utc> {
        self.last_practiced_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn pct(value: u8) -> MasteryPercentage {
        MasteryPercentage::try_new(value).unwrap()
    }

    #[test]
    fn first_observation_takes_estimate() {
        let record =
            TopicMasteryRecord::first_observation(UserId::new(1), TopicId::new(3), pct(85), fixed_now());
        assert_eq!(record.progress(), pct(85));
        assert_eq!(record.label(), MasteryLabel::Mastered);
        assert_eq!(record.last_practiced_at(), fixed_now());
    }

    #[test]
    fn blend_updates_progress_label_and_timestamp() {
        let earlier = fixed_now();
        let later = earlier + Duration::days(2);
        let record =
            TopicMasteryRecord::first_observation(UserId::new(1), TopicId::new(3), pct(40), earlier);

        let updated = record.blend(pct(90), later);
        assert_eq!(updated.progress(), pct(70));
        assert_eq!(updated.label(), MasteryLabel::InProgress);
        assert_eq!(updated.last_practiced_at(), later);
        assert_eq!(updated.topic_id(), record.topic_id());
        // the original value is untouched
        assert_eq!(record.progress(), pct(40));
    }

    #[test]
    fn observe_picks_first_or_blend() {
        let user = UserId::new(1);
        let topic = TopicId::new(9);
        let first = TopicMasteryRecord::observe(None, user, topic, pct(60), fixed_now());
        assert_eq!(first.progress(), pct(60));

        let second = TopicMasteryRecord::observe(Some(&first), user, topic, pct(10), fixed_now());
        assert_eq!(second.progress(), pct(30));
        assert_eq!(second.label(), MasteryLabel::Weak);
    }

    #[test]
    fn fractional_estimate_is_rounded_after_blend() {
        let record = TopicMasteryRecord::first_observation(
            UserId::new(1),
            TopicId::new(2),
            pct(0),
            fixed_now(),
        );
        let updated = record.blend(MasteryEstimate::clamped(0.8), fixed_now());
        assert_eq!(updated.progress(), pct(0));
        assert_eq!(updated.label(), MasteryLabel::NotAttempted);

        let estimate = TopicEstimate::new(TopicId::new(2), 0.8);
        assert_eq!(estimate.percentage.value(), 0.8);
    }

    #[test]
    fn from_persisted_rejects_inconsistent_label() {
        let err = TopicMasteryRecord::from_persisted(
            UserId::new(1),
            TopicId::new(1),
            pct(80),
            MasteryLabel::InProgress,
            fixed_now(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            MasteryRecordError::LabelMismatch {
                progress: pct(80),
                stored: MasteryLabel::InProgress,
                expected: MasteryLabel::Mastered,
            }
        );
    }
}
