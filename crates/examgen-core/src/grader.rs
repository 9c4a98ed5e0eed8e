//! Deterministic grading of submitted answers against a quiz's
//! answer key.

use std::collections::BTreeMap;

use crate::quiz::{Graded, QuestionFeedback, Quiz};

/// Grade one attempt. Pure and total: identical input always yields
/// identical output, and no shape of `answers` can make it fail —
/// missing entries are unanswered, letters outside the options are
/// simply wrong. Feedback order matches question order.
pub fn grade(quiz: &Quiz, answers: &BTreeMap<String, String>) -> Graded {
    let mut score = 0;
    let mut feedback = Vec::with_capacity(quiz.questions.len());

    for q in &quiz.questions {
        let marked = answers.get(&q.id).cloned();
        let is_correct = marked.as_deref() == Some(q.correct.as_str());
        if is_correct {
            score += 1;
        }

        feedback.push(QuestionFeedback {
            id: q.id.clone(),
            marked,
            correct: q.correct.clone(),
            is_correct,
            explanation: q.explanation.clone(),
            stem: q.stem.clone(),
        });
    }

    Graded { score, feedback }
}
