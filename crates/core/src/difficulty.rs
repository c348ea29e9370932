use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of questions in a standard adaptive mini-test.
///
/// The controller never stops a session on its own; callers compare
/// `total_answered` against this (or their own) limit.
pub const DEFAULT_QUESTION_LIMIT: u32 = 8;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DifficultyError {
    #[error("difficulty must be between 1 and 3, got {provided}")]
    OutOfRange { provided: u8 },
}

//
// ─── DIFFICULTY LEVEL ──────────────────────────────────────────────────────────
//

/// Question difficulty tier, always in `1..=3`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DifficultyLevel(u8);

impl DifficultyLevel {
    pub const EASY: Self = Self(1);
    pub const MEDIUM: Self = Self(2);
    pub const HARD: Self = Self(3);

    /// Validate a raw tier value.
    ///
    /// # Errors
    ///
    /// Returns `DifficultyError::OutOfRange` unless `value` is 1, 2 or 3.
    pub fn try_new(value: u8) -> Result<Self, DifficultyError> {
        if (Self::EASY.0..=Self::HARD.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DifficultyError::OutOfRange { provided: value })
        }
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// One tier harder, saturating at `HARD`.
    #[must_use]
    pub fn step_up(self) -> Self {
        if self < Self::HARD { Self(self.0 + 1) } else { self }
    }

    /// One tier easier, saturating at `EASY`.
    #[must_use]
    pub fn step_down(self) -> Self {
        if self > Self::EASY { Self(self.0 - 1) } else { self }
    }

    /// Number of tiers between two levels.
    #[must_use]
    pub fn distance(self, other: Self) -> u8 {
        self.0.abs_diff(other.0)
    }

    #[must_use]
    pub fn all() -> [Self; 3] {
        [Self::EASY, Self::MEDIUM, Self::HARD]
    }
}

impl Default for DifficultyLevel {
    fn default() -> Self {
        Self::EASY
    }
}

impl TryFrom<u8> for DifficultyLevel {
    type Error = DifficultyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<DifficultyLevel> for u8 {
    fn from(level: DifficultyLevel) -> Self {
        level.0
    }
}

impl fmt::Debug for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DifficultyLevel({})", self.0)
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// Running state of one adaptive test session.
///
/// This is a plain value: every transition consumes the old state and returns
/// a new one, so the caller decides where it lives between answers.
///
/// # Examples
///
/// ```
/// # use tutor_core::difficulty::{DifficultyLevel, init_session, record_answer};
/// let state = init_session();
/// let state = record_answer(state, true);
/// let state = record_answer(state, true);
/// assert_eq!(state.difficulty(), DifficultyLevel::MEDIUM);
/// assert_eq!(state.score(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DifficultyState {
    difficulty: DifficultyLevel,
    score: u32,
    total_answered: u32,
}

impl DifficultyState {
    /// Fresh session: easiest tier, nothing answered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a state captured earlier (e.g. from a paused session).
    #[must_use]
    pub fn from_parts(difficulty: DifficultyLevel, score: u32, total_answered: u32) -> Self {
        Self {
            difficulty,
            score,
            total_answered,
        }
    }

    #[must_use]
    pub fn difficulty(&self) -> DifficultyLevel {
        self.difficulty
    }

    /// Cumulative number of correct answers.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn total_answered(&self) -> u32 {
        self.total_answered
    }

    /// Apply one answer and return the next state.
    ///
    /// A correct answer bumps the score; whenever the *cumulative* score lands
    /// on an even number the tier goes up one step. A wrong answer drops the
    /// tier one step. Wrong answers never reset the score, so the tier can
    /// climb again at score 4, 6, ... after a miss.
    #[must_use]
    pub fn record_answer(self, is_correct: bool) -> Self {
        let total_answered = self.total_answered.saturating_add(1);

        if is_correct {
            let score = self.score.saturating_add(1);
            let difficulty = if self.difficulty < DifficultyLevel::HARD
                && score > 0
                && score % 2 == 0
            {
                self.difficulty.step_up()
            } else {
                self.difficulty
            };
            Self {
                difficulty,
                score,
                total_answered,
            }
        } else {
            Self {
                difficulty: self.difficulty.step_down(),
                score: self.score,
                total_answered,
            }
        }
    }

    /// True once `limit` answers have been recorded.
    #[must_use]
    pub fn is_finished(&self, limit: u32) -> bool {
        self.total_answered >= limit
    }
}

/// Start a new session at difficulty 1 with zero score.
#[must_use]
pub fn init_session() -> DifficultyState {
    DifficultyState::new()
}

/// Free-function form of [`DifficultyState::record_answer`].
#[must_use]
pub fn record_answer(state: DifficultyState, is_correct: bool) -> DifficultyState {
    state.record_answer(is_correct)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
