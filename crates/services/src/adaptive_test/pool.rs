use rand::rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use tutor_core::difficulty::DifficultyLevel;
use tutor_core::model::{QuestionId, TopicId};

/// A question available to an adaptive test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub topic_id: TopicId,
    pub difficulty: DifficultyLevel,
}

impl Question {
    #[must_use]
    pub fn new(id: QuestionId, topic_id: TopicId, difficulty: DifficultyLevel) -> Self {
        Self {
            id,
            topic_id,
            difficulty,
        }
    }
}

/// Pre-filtered set of questions for one test, tagged by difficulty tier.
#[derive(Debug, Clone, Default)]
pub struct QuestionPool {
    questions: Vec<Question>,
}

impl QuestionPool {
    /// Build a pool. Later duplicates of a question id are dropped.
    #[must_use]
    pub fn new(questions: Vec<Question>) -> Self {
        let mut seen = HashSet::new();
        let questions = questions
            .into_iter()
            .filter(|q| seen.insert(q.id))
            .collect();
        Self { questions }
    }

    /// Randomize the order in which same-tier questions are served.
    #[must_use]
    pub fn shuffled(mut self) -> Self {
        self.questions.shuffle(&mut rng());
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    #[must_use]
    pub fn count_at(&self, difficulty: DifficultyLevel) -> usize {
        self.questions
            .iter()
            .filter(|q| q.difficulty == difficulty)
            .count()
    }

    /// Next unasked question for the requested tier.
    ///
    /// Falls back to the nearest tier when the requested one is used up,
    /// preferring the easier tier on a tie. Within a tier, pool order wins.
    #[must_use]
    pub fn next_for(
        &self,
        difficulty: DifficultyLevel,
        asked: &HashSet<QuestionId>,
    ) -> Option<&Question> {
        self.questions
            .iter()
            .filter(|q| !asked.contains(&q.id))
            .min_by_key(|q| (q.difficulty.distance(difficulty), q.difficulty))
    }
}
