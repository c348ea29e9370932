use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::TopicId;

/// One graded answer produced by a quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerEvent {
    pub topic_id: TopicId,
    pub is_correct: bool,
    pub answered_at: Option<DateTime<Utc>>,
    pub time_taken_secs: Option<u32>,
}

impl AnswerEvent {
    #[must_use]
    pub fn new(topic_id: TopicId, is_correct: bool) -> Self {
        Self {
            topic_id,
            is_correct,
            answered_at: None,
            time_taken_secs: None,
        }
    }

    #[must_use]
    pub fn with_answered_at(mut self, at: DateTime<Utc>) -> Self {
        self.answered_at = Some(at);
        self
    }

    #[must_use]
    pub fn with_time_taken(mut self, secs: u32) -> Self {
        self.time_taken_secs = Some(secs);
        self
    }
}
