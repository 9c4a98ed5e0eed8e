use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The five option keys every question must carry, in display order.
pub const OPTION_KEYS: [char; 5] = ['A', 'B', 'C', 'D', 'E'];

/// One validated multiple-choice question.
///
/// `id` is always system-assigned (see `validate::parse_quiz`); the
/// model-supplied id is only trusted for its ordinal position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub subject: String,
    pub topic: String,
    pub difficulty: String,
    pub stem: String,
    /// Exactly the keys A–E, all non-empty.
    pub options: BTreeMap<String, String>,
    /// One of A–E.
    pub correct: String,
    pub explanation: String,
}

/// An ordered, immutable set of questions for one generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub subject: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Easy => write!(f, "easy"),
            Self::Medium => write!(f, "medium"),
            Self::Hard => write!(f, "hard"),
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(format!("invalid difficulty: {s}")),
        }
    }
}

/// Per-question grading detail. Stem and explanation are duplicated
/// from the question so historical review never re-joins the quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionFeedback {
    pub id: String,
    /// The letter the user marked; `None` when unanswered.
    pub marked: Option<String>,
    pub correct: String,
    pub is_correct: bool,
    pub explanation: String,
    pub stem: String,
}

/// Result of grading one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graded {
    pub score: u32,
    pub feedback: Vec<QuestionFeedback>,
}

/// One row of the attempt history listing.
#[derive(Debug, Clone)]
pub struct AttemptSummary {
    pub attempt_id: i64,
    pub quiz_id: i64,
    pub submitted_at: DateTime<Utc>,
    pub score: u32,
    pub subject: String,
}

/// A fully loaded attempt joined with its parent quiz, as needed for
/// review.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub attempt_id: i64,
    pub quiz_id: i64,
    pub submitted_at: DateTime<Utc>,
    pub score: u32,
    pub answers: BTreeMap<String, String>,
    pub feedback: Vec<QuestionFeedback>,
    pub quiz: Quiz,
    pub subject: String,
}
