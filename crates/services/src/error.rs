//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use tutor_core::model::{QuestionId, TestSummaryError};

/// Errors emitted by `MasteryService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MasteryServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the adaptive test runner and workflow.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AdaptiveTestError {
    #[error("question pool is empty")]
    EmptyPool,
    #[error("question limit must be at least 1")]
    InvalidQuestionLimit,
    #[error("test already completed")]
    Completed,
    #[error("test is still in progress")]
    NotComplete,
    #[error("question {0} was already answered in this test")]
    AlreadyAnswered(QuestionId),
    #[error("question {0} is not in the pool")]
    UnknownQuestion(QuestionId),
    #[error(transparent)]
    Summary(#[from] TestSummaryError),
    #[error(transparent)]
    Mastery(#[from] MasteryServiceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `MasteryAnalysisClient`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AnalysisError {
    #[error("mastery analysis is not configured")]
    Disabled,
    #[error("mastery analysis returned an empty response")]
    EmptyResponse,
    #[error("mastery analysis request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("mastery analysis returned an invalid payload: {0}")]
    InvalidPayload(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted while bootstrapping or running `TutorServices`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TutorServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Mastery(#[from] MasteryServiceError),
}
