use std::collections::BTreeMap;

use crate::error::ExamResult;
use crate::quiz::{AttemptRecord, AttemptSummary, QuestionFeedback, Quiz};

/// Append-only persistence for quizzes and the attempts made against
/// them. No update or delete is exposed: both entities are immutable
/// history once written.
pub trait AttemptStore {
    /// Store a quiz verbatim; returns the assigned quiz id.
    fn save_quiz(&self, subject: &str, quiz: &Quiz) -> ExamResult<i64>;

    /// Store one graded attempt against an existing quiz; returns the
    /// assigned attempt id.
    fn save_attempt(
        &self,
        quiz_id: i64,
        answers: &BTreeMap<String, String>,
        score: u32,
        feedback: &[QuestionFeedback],
    ) -> ExamResult<i64>;

    /// Load a quiz by id.
    fn load_quiz(&self, quiz_id: i64) -> ExamResult<Option<Quiz>>;

    /// Recent attempts, newest first, at most `limit` rows. Subject
    /// is joined from the parent quiz.
    fn list_attempts(&self, limit: usize) -> ExamResult<Vec<AttemptSummary>>;

    /// Full attempt record joined with its parent quiz, or `None`
    /// when the id is unknown.
    fn load_attempt(&self, attempt_id: i64) -> ExamResult<Option<AttemptRecord>>;
}
