//! Parsing and validation of raw model output into a [`Quiz`].
//!
//! The model is never trusted to honor the prompt: its text is parsed
//! into an untyped `serde_json::Value` first and every field is
//! checked and coerced individually before anything reaches the typed
//! shape. Any failure aborts the whole quiz; there is no partial or
//! best-effort result.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{ExamError, ExamResult};
use crate::quiz::{Question, Quiz, OPTION_KEYS};

/// Parse, validate, and normalize a candidate quiz payload.
///
/// `subject` is the canonical requested subject; it overwrites
/// whatever label the model echoed back, and seeds the assigned
/// question ids (`MAT-1-x7k2qf` style: subject prefix, 1-based
/// ordinal, random suffix).
pub fn parse_quiz(raw: &str, subject: &str) -> ExamResult<Quiz> {
    let value: Value =
        serde_json::from_str(raw.trim()).map_err(|e| ExamError::Parse(e.to_string()))?;

    let root = value
        .as_object()
        .ok_or_else(|| ExamError::Schema("top-level payload is not an object".into()))?;

    if !root.get("subject").is_some_and(Value::is_string) {
        return Err(ExamError::Schema("missing string field `subject`".into()));
    }

    let raw_questions = root
        .get("questions")
        .and_then(Value::as_array)
        .ok_or_else(|| ExamError::Schema("missing array field `questions`".into()))?;

    let prefix: String = subject.chars().take(3).collect::<String>().to_uppercase();

    let mut questions = Vec::with_capacity(raw_questions.len());
    for (idx, candidate) in raw_questions.iter().enumerate() {
        let ordinal = idx + 1;
        let q = validate_question(candidate, ordinal)?;

        let suffix = random_suffix();
        questions.push(Question {
            id: format!("{prefix}-{ordinal}-{suffix}"),
            subject: subject.to_string(),
            ..q
        });
    }

    Ok(Quiz {
        subject: subject.to_string(),
        questions,
    })
}

/// Check one candidate question field-by-field. The returned
/// `Question` still carries the model's id and subject; the caller
/// replaces both.
fn validate_question(candidate: &Value, ordinal: usize) -> ExamResult<Question> {
    let obj = candidate
        .as_object()
        .ok_or_else(|| ExamError::Schema(format!("question {ordinal} is not an object")))?;

    let field = |name: &str| -> ExamResult<String> {
        obj.get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ExamError::Schema(format!("question {ordinal}: missing string field `{name}`"))
            })
    };

    let raw_options = obj
        .get("options")
        .and_then(Value::as_object)
        .ok_or_else(|| {
            ExamError::Schema(format!("question {ordinal}: missing object field `options`"))
        })?;

    let mut options = BTreeMap::new();
    for (key, text) in raw_options {
        let text = text.as_str().ok_or_else(|| {
            ExamError::Schema(format!("question {ordinal}: option {key} is not a string"))
        })?;
        options.insert(key.clone(), text.to_string());
    }

    // Exactly the keys A–E: nothing missing, nothing extra.
    for key in options.keys() {
        if !OPTION_KEYS.iter().any(|l| l.to_string() == *key) {
            return Err(ExamError::Schema(format!(
                "question {ordinal}: unexpected option key {key:?}"
            )));
        }
    }
    for letter in OPTION_KEYS {
        let populated = options
            .get(&letter.to_string())
            .is_some_and(|text| !text.trim().is_empty());
        if !populated {
            return Err(ExamError::IncompleteOptions(ordinal, letter));
        }
    }

    let correct = field("correct")?;
    if !OPTION_KEYS.iter().any(|l| l.to_string() == correct) {
        return Err(ExamError::InvalidAnswerKey(ordinal, correct));
    }

    Ok(Question {
        id: field("id")?,
        subject: field("subject")?,
        topic: field("topic")?,
        difficulty: field("difficulty")?,
        stem: field("stem")?,
        options,
        correct,
        explanation: field("explanation")?,
    })
}

/// Six characters of ULID randomness, enough to keep ids distinct
/// across repeated generation calls sharing a rendering surface.
fn random_suffix() -> String {
    let ulid = ulid::Ulid::new().to_string();
    ulid[ulid.len() - 6..].to_lowercase()
}
