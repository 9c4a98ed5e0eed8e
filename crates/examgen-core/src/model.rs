use crate::error::ExamResult;

/// Black-box text-completion capability: one prompt in, one text
/// blob out. Output-format enforcement lives entirely on our side.
pub trait CompletionModel {
    fn complete(&self, prompt: &str) -> ExamResult<String>;
}
