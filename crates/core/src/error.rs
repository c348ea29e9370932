use thiserror::Error;

use crate::difficulty::DifficultyError;
use crate::mastery::MasteryError;
use crate::model::{MasteryRecordError, TestSummaryError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Difficulty(#[from] DifficultyError),
    #[error(transparent)]
    Mastery(#[from] MasteryError),
    #[error(transparent)]
    MasteryRecord(#[from] MasteryRecordError),
    #[error(transparent)]
    TestSummary(#[from] TestSummaryError),
}
