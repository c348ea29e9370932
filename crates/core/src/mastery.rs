use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{AnswerEvent, TopicEstimate, TopicId};

/// Lowest percentage labelled `Mastered`.
pub const MASTERED_THRESHOLD: u8 = 80;
/// Lowest percentage labelled `InProgress`.
pub const IN_PROGRESS_THRESHOLD: u8 = 50;

// Blend weights in tenths: 40% existing, 60% new.
const EXISTING_WEIGHT: f64 = 4.0;
const NEW_WEIGHT: f64 = 6.0;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MasteryError {
    #[error("mastery percentage must be at most 100, got {provided}")]
    OutOfRange { provided: u8 },
    #[error("unknown mastery label: {0}")]
    UnknownLabel(String),
}

//
// ─── PERCENTAGE ────────────────────────────────────────────────────────────────
//

/// Whole-number mastery estimate in `0..=100`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct MasteryPercentage(u8);

impl MasteryPercentage {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(100);

    /// # Errors
    ///
    /// Returns `MasteryError::OutOfRange` if `value` is above 100.
    pub fn try_new(value: u8) -> Result<Self, MasteryError> {
        if value <= Self::MAX.0 {
            Ok(Self(value))
        } else {
            Err(MasteryError::OutOfRange { provided: value })
        }
    }

    /// Round and clamp an externally produced estimate. NaN maps to zero.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.round().clamp(0.0, 100.0) as u8)
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for MasteryPercentage {
    type Error = MasteryError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}

impl From<MasteryPercentage> for u8 {
    fn from(value: MasteryPercentage) -> Self {
        value.0
    }
}

impl fmt::Display for MasteryPercentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

//
// ─── ESTIMATE ──────────────────────────────────────────────────────────────────
//

/// Incoming mastery estimate, clamped to `0.0..=100.0` but not rounded.
///
/// Fractional estimates stay fractional until they are blended, so the
/// stored percentage is rounded exactly once.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct MasteryEstimate(f64);

impl MasteryEstimate {
    /// Clamp an externally produced estimate. NaN maps to zero.
    #[must_use]
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 100.0))
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Nearest whole percentage, halves rounding up.
    #[must_use]
    pub fn rounded(self) -> MasteryPercentage {
        MasteryPercentage::clamped(self.0)
    }
}

impl From<f64> for MasteryEstimate {
    fn from(value: f64) -> Self {
        Self::clamped(value)
    }
}

impl From<MasteryEstimate> for f64 {
    fn from(estimate: MasteryEstimate) -> Self {
        estimate.0
    }
}

impl From<MasteryPercentage> for MasteryEstimate {
    fn from(percentage: MasteryPercentage) -> Self {
        Self(f64::from(percentage.0))
    }
}

//
// ─── LABEL ─────────────────────────────────────────────────────────────────────
//

/// Categorical bucket derived from a mastery percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MasteryLabel {
    Mastered,
    InProgress,
    Weak,
    NotAttempted,
}

impl MasteryLabel {
    /// Stable storage representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MasteryLabel::Mastered => "mastered",
            MasteryLabel::InProgress => "in_progress",
            MasteryLabel::Weak => "weak",
            MasteryLabel::NotAttempted => "not_attempted",
        }
    }
}

impl FromStr for MasteryLabel {
    type Err = MasteryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mastered" => Ok(MasteryLabel::Mastered),
            "in_progress" => Ok(MasteryLabel::InProgress),
            "weak" => Ok(MasteryLabel::Weak),
            "not_attempted" => Ok(MasteryLabel::NotAttempted),
            other => Err(MasteryError::UnknownLabel(other.to_string())),
        }
    }
}

impl fmt::Display for MasteryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a percentage onto its label. Threshold values belong to the higher band.
#[must_use]
pub fn classify(percentage: MasteryPercentage) -> MasteryLabel {
    match percentage.value() {
        p if p >= MASTERED_THRESHOLD => MasteryLabel::Mastered,
        p if p >= IN_PROGRESS_THRESHOLD => MasteryLabel::InProgress,
        p if p > 0 => MasteryLabel::Weak,
        _ => MasteryLabel::NotAttempted,
    }
}

//
// ─── BLEND ─────────────────────────────────────────────────────────────────────
//

/// Result of folding a new estimate into a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasteryUpdate {
    pub percentage: MasteryPercentage,
    pub label: MasteryLabel,
}

/// Blend a fresh estimate into the stored percentage.
///
/// With no stored value the estimate is rounded and taken as-is. Otherwise
/// the result is `round(existing * 0.4 + new * 0.6)`, rounded once after
/// blending. Repeating the call with the same
/// estimate moves the value further toward it; `existing == new` is a fixed
/// point.
///
/// # Examples
///
/// ```
/// # use tutor_core::mastery::{MasteryLabel, MasteryPercentage, update_mastery};
/// let existing = MasteryPercentage::try_new(40)?;
/// let new = MasteryPercentage::try_new(90)?;
/// let update = update_mastery(Some(existing), new);
/// assert_eq!(update.percentage.value(), 70);
/// assert_eq!(update.label, MasteryLabel::InProgress);
/// # Ok::<(), tutor_core::mastery::MasteryError>(())
/// ```
#[must_use]
pub fn update_mastery(
    existing: Option<MasteryPercentage>,
    new: impl Into<MasteryEstimate>,
) -> MasteryUpdate {
    let new = new.into();
    let percentage = match existing {
        None => new.rounded(),
        Some(existing) => {
            // For whole inputs 4e + 6n is an even integer, so the tenths never land on a tie.
            let weighted = f64::from(existing.value()) * EXISTING_WEIGHT + new.value() * NEW_WEIGHT;
            MasteryPercentage::clamped(weighted / 10.0)
        }
    };

    MasteryUpdate {
        percentage,
        label: classify(percentage),
    }
}

/// Per-topic share of correct answers, as whole percentages.
///
/// Topics come back ordered by id. Topics with no answers do not appear.
#[must_use]
pub fn observed_accuracy(events: &[AnswerEvent]) -> Vec<TopicEstimate> {
    let mut tallies: BTreeMap<TopicId, (u64, u64)> = BTreeMap::new();
    for event in events {
        let (answered, correct) = tallies.entry(event.topic_id).or_default();
        *answered += 1;
        if event.is_correct {
            *correct += 1;
        }
    }

    tallies
        .into_iter()
        .map(|(topic_id, (answered, correct))| {
            let rounded = (correct * 200 + answered) / (answered * 2);
            let percentage =
                MasteryPercentage(u8::try_from(rounded).unwrap_or(MasteryPercentage::MAX.0));
            TopicEstimate::new(topic_id, percentage)
        })
        .collect()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
