#![forbid(unsafe_code)]

pub mod adaptive_test;
pub mod ai;
pub mod app_services;
pub mod error;
pub mod mastery_service;

pub use tutor_core::Clock;

pub use adaptive_test::{
    AdaptiveAnswerResult, AdaptiveTestRunner, AdaptiveTestService, Question, QuestionPool,
    TestProgress,
};
pub use ai::{AnalysisConfig, MasteryAnalysisClient};
pub use app_services::TutorServices;
pub use error::{AdaptiveTestError, AnalysisError, MasteryServiceError, TutorServicesError};
pub use mastery_service::MasteryService;
