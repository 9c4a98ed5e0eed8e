pub mod error;
pub mod generator;
pub mod grader;
pub mod model;
pub mod quiz;
pub mod retriever;
pub mod store;
pub mod validate;

pub use error::{ExamError, ExamResult};
pub use generator::{GenerateRequest, QuizGenerator};
pub use grader::grade;
pub use model::CompletionModel;
pub use quiz::{
    AttemptRecord, AttemptSummary, Difficulty, Graded, Question, QuestionFeedback, Quiz,
    OPTION_KEYS,
};
pub use retriever::Retriever;
pub use store::AttemptStore;
pub use validate::parse_quiz;
