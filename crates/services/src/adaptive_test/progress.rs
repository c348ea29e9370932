use tutor_core::difficulty::DifficultyLevel;

/// Snapshot of a running test, for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestProgress {
    pub question_limit: u32,
    pub answered: u32,
    pub remaining: u32,
    pub score: u32,
    pub difficulty: DifficultyLevel,
    pub is_complete: bool,
}
