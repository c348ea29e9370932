mod answer;
mod ids;
mod mastery_record;
pub mod session;

pub use answer::AnswerEvent;
pub use ids::{ParseIdError, QuestionId, TopicId, UserId};
pub use mastery_record::{MasteryRecordError, TopicEstimate, TopicMasteryRecord};
pub use session::{TestSessionSummary, TestSummaryError};
