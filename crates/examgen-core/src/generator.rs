//! Retrieval-augmented quiz generation.
//!
//! One `generate` call is a single pass: retrieve context, build the
//! prompt, invoke the model once, validate. There is no retry or
//! self-correction loop — a validation failure surfaces to the caller,
//! which may simply run the generation again.

use tracing::debug;

use crate::error::{ExamError, ExamResult};
use crate::model::CompletionModel;
use crate::quiz::{Difficulty, Quiz};
use crate::retriever::Retriever;
use crate::validate::parse_quiz;

/// Corpus chunks fetched per generation call.
pub const DEFAULT_TOP_K: usize = 8;

/// Upper bound on the context embedded into the prompt, in chars.
/// Bounds prompt size regardless of corpus size.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 12_000;

/// Everything one generation call needs. Each interaction carries its
/// own request object; the generator holds no per-session state.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub subject: String,
    pub n_questions: usize,
    pub difficulty: Difficulty,
}

pub struct QuizGenerator<'a> {
    retriever: &'a dyn Retriever,
    model: &'a dyn CompletionModel,
    top_k: usize,
    max_context_chars: usize,
}

impl<'a> QuizGenerator<'a> {
    pub fn new(retriever: &'a dyn Retriever, model: &'a dyn CompletionModel) -> Self {
        Self {
            retriever,
            model,
            top_k: DEFAULT_TOP_K,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }

    pub fn with_limits(mut self, top_k: usize, max_context_chars: usize) -> Self {
        self.top_k = top_k;
        self.max_context_chars = max_context_chars;
        self
    }

    /// Run the full pipeline for one request. Persists nothing; the
    /// caller saves the quiz once generation succeeds.
    pub fn generate(&self, request: &GenerateRequest) -> ExamResult<Quiz> {
        let query = format!(
            "{} practice exam questions, {} difficulty, multiple choice",
            request.subject, request.difficulty
        );
        let chunks = self
            .retriever
            .retrieve(&request.subject, &query, self.top_k)?;
        if chunks.is_empty() {
            return Err(ExamError::Retrieval(format!(
                "no corpus content for subject {:?}",
                request.subject
            )));
        }
        debug!(subject = %request.subject, chunks = chunks.len(), "retrieved context");

        let context = truncate_chars(&chunks.join("\n\n"), self.max_context_chars);
        let prompt = build_prompt(request, &context);
        debug!(prompt_chars = prompt.len(), "invoking model");

        let raw = self.model.complete(&prompt)?;
        let quiz = parse_quiz(raw.trim(), &request.subject)?;

        if quiz.questions.len() != request.n_questions {
            return Err(ExamError::Schema(format!(
                "requested {} questions, model returned {}",
                request.n_questions,
                quiz.questions.len()
            )));
        }
        Ok(quiz)
    }
}

/// Truncate on a char boundary; byte slicing would panic on
/// multi-byte corpus text.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

fn build_prompt(request: &GenerateRequest, context: &str) -> String {
    let subject = &request.subject;
    let difficulty = &request.difficulty;
    let n = request.n_questions;

    format!(
        r#"You are a practice-exam question writer for the subject "{subject}".
Use ONLY the context below as a reference for style and content.
Do not copy long passages literally. Write original but similar questions.

Rules:
- Write EXACTLY {n} questions.
- Every question has the options A, B, C, D, E, all filled in.
- Exactly one option is correct.
- Return ONLY valid JSON (no markdown, no extra text).

JSON format:
{{
  "subject": "{subject}",
  "questions": [
    {{
      "id": "Q1",
      "subject": "{subject}",
      "topic": "short topic",
      "difficulty": "{difficulty}",
      "stem": "question text",
      "options": {{"A": "...", "B": "...", "C": "...", "D": "...", "E": "..."}},
      "correct": "A",
      "explanation": "short rationale for the answer key"
    }}
  ]
}}

Context:
"""{context}"""
"#
    )
}
