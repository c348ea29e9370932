mod pool;
mod progress;
mod runner;
mod workflow;

// Public API of the adaptive mini-test subsystem.
pub use crate::error::AdaptiveTestError;
pub use pool::{Question, QuestionPool};
pub use progress::TestProgress;
pub use runner::AdaptiveTestRunner;
pub use workflow::{AdaptiveAnswerResult, AdaptiveTestService};
