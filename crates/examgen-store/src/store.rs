use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use examgen_core::{
    AttemptRecord, AttemptStore, AttemptSummary, ExamError, ExamResult, QuestionFeedback, Quiz,
    Retriever,
};

use crate::schema::init_db;

/// SQLite-backed persistence for quizzes/attempts plus the corpus
/// store behind the [`Retriever`] seam.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn new(path: &Path) -> ExamResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ExamError::Database(format!("cannot create db directory: {e}")))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| ExamError::Database(format!("cannot open database: {e}")))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| ExamError::Database(e.to_string()))?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> ExamResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ExamError::Database(format!("cannot open in-memory db: {e}")))?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| ExamError::Database(e.to_string()))?;
        init_db(&conn)?;
        Ok(Self { conn })
    }

    // --- Corpus chunks ---

    /// Append chunks to a subject partition. Returns the number of
    /// chunks stored. Partition labels are lowercased so ingestion
    /// and generation agree on the partition regardless of how the
    /// subject was typed.
    pub fn add_chunks(&self, subject: &str, source: &str, texts: &[String]) -> ExamResult<usize> {
        let subject = subject.to_lowercase();
        let now = Utc::now().to_rfc3339();
        let mut stored = 0;
        for text in texts {
            if text.trim().is_empty() {
                continue;
            }
            self.conn
                .execute(
                    "INSERT INTO chunks (subject, source, content, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![subject, source, text, now],
                )
                .map_err(|e| ExamError::Database(e.to_string()))?;
            stored += 1;
        }
        Ok(stored)
    }

    pub fn count_chunks(&self, subject: &str) -> ExamResult<usize> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM chunks WHERE subject = ?1",
                params![subject.to_lowercase()],
                |row| row.get::<_, usize>(0),
            )
            .map_err(|e| ExamError::Database(e.to_string()))
    }

    /// Subject partitions present in the corpus with their chunk
    /// counts.
    pub fn list_subjects(&self) -> ExamResult<Vec<(String, usize)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT subject, COUNT(*) FROM chunks GROUP BY subject ORDER BY subject")
            .map_err(|e| ExamError::Database(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, usize>(1)?))
            })
            .map_err(|e| ExamError::Database(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| ExamError::Database(e.to_string()))?);
        }
        Ok(results)
    }

    /// Most recent chunks for a subject, used when the FTS query
    /// matches nothing.
    fn recent_chunks(&self, subject: &str, k: usize) -> ExamResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT content FROM chunks WHERE subject = ?1 ORDER BY id DESC LIMIT ?2")
            .map_err(|e| ExamError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![subject.to_lowercase(), k as i64], |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| ExamError::Database(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| ExamError::Database(e.to_string()))?);
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Timestamps are always store-written RFC-3339, so a parse failure
/// means the row is corrupt; surface it rather than inventing a time.
fn parse_dt(s: &str) -> ExamResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| ExamError::Database(format!("bad stored timestamp {s:?}: {e}")))
}

/// Turn a free-text query into an FTS5 MATCH expression. Bare
/// punctuation breaks MATCH syntax, so every word is quoted and the
/// words are OR-ed together.
fn fts_match_expr(query: &str) -> Option<String> {
    let words: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1)
        .map(|w| format!("\"{}\"", w.to_lowercase()))
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" OR "))
    }
}

// ---------------------------------------------------------------------------
// Retriever impl
// ---------------------------------------------------------------------------

impl Retriever for SqliteStore {
    fn retrieve(&self, subject: &str, query: &str, k: usize) -> ExamResult<Vec<String>> {
        let Some(expr) = fts_match_expr(query) else {
            return self.recent_chunks(subject, k);
        };

        let mut stmt = self
            .conn
            .prepare(
                "SELECT c.content
                 FROM chunks_fts
                 JOIN chunks c ON c.id = chunks_fts.rowid
                 WHERE chunks_fts MATCH ?1 AND c.subject = ?2
                 ORDER BY rank
                 LIMIT ?3",
            )
            .map_err(|e| ExamError::Retrieval(e.to_string()))?;

        let rows = stmt
            .query_map(params![expr, subject.to_lowercase(), k as i64], |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| ExamError::Retrieval(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| ExamError::Retrieval(e.to_string()))?);
        }

        if results.is_empty() {
            debug!(subject, "FTS matched nothing, falling back to recent chunks");
            return self.recent_chunks(subject, k);
        }
        Ok(results)
    }
}

// ---------------------------------------------------------------------------
// AttemptStore impl
// ---------------------------------------------------------------------------

impl AttemptStore for SqliteStore {
    fn save_quiz(&self, subject: &str, quiz: &Quiz) -> ExamResult<i64> {
        let quiz_json = serde_json::to_string(quiz)?;
        self.conn
            .execute(
                "INSERT INTO quizzes (subject, created_at, quiz_json) VALUES (?1, ?2, ?3)",
                params![subject, Utc::now().to_rfc3339(), quiz_json],
            )
            .map_err(|e| ExamError::Database(e.to_string()))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn save_attempt(
        &self,
        quiz_id: i64,
        answers: &BTreeMap<String, String>,
        score: u32,
        feedback: &[QuestionFeedback],
    ) -> ExamResult<i64> {
        let answers_json = serde_json::to_string(answers)?;
        let feedback_json = serde_json::to_string(feedback)?;
        self.conn
            .execute(
                "INSERT INTO attempts (quiz_id, submitted_at, answers_json, score, feedback_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    quiz_id,
                    Utc::now().to_rfc3339(),
                    answers_json,
                    score,
                    feedback_json,
                ],
            )
            .map_err(|e| ExamError::Database(e.to_string()))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn load_quiz(&self, quiz_id: i64) -> ExamResult<Option<Quiz>> {
        let quiz_json: Option<String> = self
            .conn
            .query_row(
                "SELECT quiz_json FROM quizzes WHERE id = ?1",
                params![quiz_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| ExamError::Database(e.to_string()))?;

        match quiz_json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn list_attempts(&self, limit: usize) -> ExamResult<Vec<AttemptSummary>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT a.id, a.quiz_id, a.submitted_at, a.score, q.subject
                 FROM attempts a
                 JOIN quizzes q ON q.id = a.quiz_id
                 ORDER BY a.id DESC
                 LIMIT ?1",
            )
            .map_err(|e| ExamError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .map_err(|e| ExamError::Database(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            let (attempt_id, quiz_id, submitted_at, score, subject) =
                row.map_err(|e| ExamError::Database(e.to_string()))?;
            results.push(AttemptSummary {
                attempt_id,
                quiz_id,
                submitted_at: parse_dt(&submitted_at)?,
                score,
                subject,
            });
        }
        Ok(results)
    }

    fn load_attempt(&self, attempt_id: i64) -> ExamResult<Option<AttemptRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT a.id, a.quiz_id, a.submitted_at, a.score,
                        a.answers_json, a.feedback_json, q.quiz_json, q.subject
                 FROM attempts a
                 JOIN quizzes q ON q.id = a.quiz_id
                 WHERE a.id = ?1",
                params![attempt_id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| ExamError::Database(e.to_string()))?;

        let Some((id, quiz_id, submitted_at, score, answers_json, feedback_json, quiz_json, subject)) =
            row
        else {
            return Ok(None);
        };

        Ok(Some(AttemptRecord {
            attempt_id: id,
            quiz_id,
            submitted_at: parse_dt(&submitted_at)?,
            score,
            answers: serde_json::from_str(&answers_json)?,
            feedback: serde_json::from_str(&feedback_json)?,
            quiz: serde_json::from_str(&quiz_json)?,
            subject,
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use examgen_core::{grade, CompletionModel, Difficulty, GenerateRequest, Question, QuizGenerator, OPTION_KEYS};

    fn test_store() -> SqliteStore {
        SqliteStore::in_memory().unwrap()
    }

    fn make_question(id: &str, correct: &str) -> Question {
        let options = OPTION_KEYS
            .iter()
            .map(|l| (l.to_string(), format!("option {l}")))
            .collect();
        Question {
            id: id.into(),
            subject: "Matemática".into(),
            topic: "fractions".into(),
            difficulty: "medium".into(),
            stem: format!("stem {id}"),
            options,
            correct: correct.into(),
            explanation: format!("explanation {id}"),
        }
    }

    fn make_quiz(n: usize) -> Quiz {
        Quiz {
            subject: "Matemática".into(),
            questions: (1..=n).map(|i| make_question(&format!("q{i}"), "B")).collect(),
        }
    }

    fn answers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // === Quiz / attempt persistence ===

    #[test]
    fn test_save_and_load_quiz() {
        let store = test_store();
        let quiz = make_quiz(3);

        let id = store.save_quiz("Matemática", &quiz).unwrap();
        assert!(id >= 1);

        let loaded = store.load_quiz(id).unwrap().unwrap();
        assert_eq!(loaded.subject, "Matemática");
        assert_eq!(loaded.questions.len(), 3);
        assert_eq!(loaded.questions[0].stem, quiz.questions[0].stem);
    }

    #[test]
    fn test_load_quiz_not_found() {
        let store = test_store();
        assert!(store.load_quiz(42).unwrap().is_none());
    }

    #[test]
    fn test_quiz_ids_monotonic() {
        let store = test_store();
        let a = store.save_quiz("Matemática", &make_quiz(1)).unwrap();
        let b = store.save_quiz("Humanas", &make_quiz(1)).unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_attempt_round_trip() {
        let store = test_store();
        let quiz = make_quiz(2);
        let quiz_id = store.save_quiz("Matemática", &quiz).unwrap();

        let marked = answers(&[("q1", "B"), ("q2", "A")]);
        let graded = grade(&quiz, &marked);
        let attempt_id = store
            .save_attempt(quiz_id, &marked, graded.score, &graded.feedback)
            .unwrap();
        assert!(attempt_id >= 1);

        let record = store.load_attempt(attempt_id).unwrap().unwrap();
        assert_eq!(record.quiz_id, quiz_id);
        assert_eq!(record.score, 1);
        assert_eq!(record.answers, marked);
        assert_eq!(record.feedback, graded.feedback);
        assert_eq!(record.subject, "Matemática");
        assert_eq!(record.quiz.questions.len(), 2);
    }

    #[test]
    fn test_load_attempt_not_found() {
        let store = test_store();
        assert!(store.load_attempt(999).unwrap().is_none());
    }

    #[test]
    fn test_attempt_requires_existing_quiz() {
        let store = test_store();
        let result = store.save_attempt(123, &BTreeMap::new(), 0, &[]);
        assert!(matches!(result, Err(ExamError::Database(_))));
    }

    #[test]
    fn test_many_attempts_per_quiz() {
        let store = test_store();
        let quiz = make_quiz(1);
        let quiz_id = store.save_quiz("Matemática", &quiz).unwrap();

        for _ in 0..3 {
            let graded = grade(&quiz, &BTreeMap::new());
            store
                .save_attempt(quiz_id, &BTreeMap::new(), graded.score, &graded.feedback)
                .unwrap();
        }

        let listed = store.list_attempts(10).unwrap();
        assert_eq!(listed.len(), 3);
        assert!(listed.iter().all(|a| a.quiz_id == quiz_id));
    }

    #[test]
    fn test_list_attempts_newest_first_and_bounded() {
        let store = test_store();
        let quiz = make_quiz(1);
        let quiz_id = store.save_quiz("Matemática", &quiz).unwrap();

        let mut ids = Vec::new();
        for _ in 0..5 {
            let graded = grade(&quiz, &BTreeMap::new());
            ids.push(
                store
                    .save_attempt(quiz_id, &BTreeMap::new(), graded.score, &graded.feedback)
                    .unwrap(),
            );
        }

        let listed = store.list_attempts(3).unwrap();
        assert_eq!(listed.len(), 3);
        let listed_ids: Vec<i64> = listed.iter().map(|a| a.attempt_id).collect();
        ids.reverse();
        assert_eq!(listed_ids, ids[..3].to_vec());
    }

    #[test]
    fn test_list_attempts_joins_subject() {
        let store = test_store();
        let quiz = make_quiz(1);
        let quiz_id = store.save_quiz("Humanas", &quiz).unwrap();
        let graded = grade(&quiz, &BTreeMap::new());
        store
            .save_attempt(quiz_id, &BTreeMap::new(), graded.score, &graded.feedback)
            .unwrap();

        let listed = store.list_attempts(10).unwrap();
        assert_eq!(listed[0].subject, "Humanas");
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("examgen.db");

        let quiz_id = {
            let store = SqliteStore::new(&path).unwrap();
            store.save_quiz("Matemática", &make_quiz(2)).unwrap()
        };

        let store = SqliteStore::new(&path).unwrap();
        let loaded = store.load_quiz(quiz_id).unwrap().unwrap();
        assert_eq!(loaded.questions.len(), 2);
    }

    #[test]
    fn test_corrupt_timestamp_surfaces_error() {
        let store = test_store();
        let quiz = make_quiz(1);
        let quiz_id = store.save_quiz("Matemática", &quiz).unwrap();
        let graded = grade(&quiz, &BTreeMap::new());
        let attempt_id = store
            .save_attempt(quiz_id, &BTreeMap::new(), graded.score, &graded.feedback)
            .unwrap();

        // Mangle the row behind the API's back.
        store
            .conn
            .execute("UPDATE attempts SET submitted_at = 'yesterday'", [])
            .unwrap();

        assert!(matches!(
            store.list_attempts(10),
            Err(ExamError::Database(_))
        ));
        assert!(matches!(
            store.load_attempt(attempt_id),
            Err(ExamError::Database(_))
        ));
    }

    // === Corpus chunks / retrieval ===

    #[test]
    fn test_subject_partition_case_insensitive() {
        let store = test_store();
        store
            .add_chunks("Matemática", "a.txt", &["fractions and decimals".into()])
            .unwrap();

        let chunks = store.retrieve("matemática", "fractions", 8).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(store.count_chunks("MATEMÁTICA").unwrap(), 1);

        let subjects = store.list_subjects().unwrap();
        assert_eq!(subjects, vec![("matemática".to_string(), 1)]);
    }

    #[test]
    fn test_add_and_count_chunks() {
        let store = test_store();
        let n = store
            .add_chunks(
                "matematica",
                "algebra.txt",
                &["chunk one".into(), "chunk two".into(), "  ".into()],
            )
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(store.count_chunks("matematica").unwrap(), 2);
        assert_eq!(store.count_chunks("humanas").unwrap(), 0);
    }

    #[test]
    fn test_list_subjects() {
        let store = test_store();
        store
            .add_chunks("matematica", "a.txt", &["x".into(), "y".into()])
            .unwrap();
        store.add_chunks("humanas", "b.txt", &["z".into()]).unwrap();

        let subjects = store.list_subjects().unwrap();
        assert_eq!(subjects.len(), 2);
        assert!(subjects.contains(&("matematica".into(), 2)));
        assert!(subjects.contains(&("humanas".into(), 1)));
    }

    #[test]
    fn test_retrieve_matches_query() {
        let store = test_store();
        store
            .add_chunks(
                "matematica",
                "a.txt",
                &[
                    "quadratic equations and their roots".into(),
                    "history of ancient rome".into(),
                ],
            )
            .unwrap();

        let chunks = store
            .retrieve("matematica", "quadratic equations", 8)
            .unwrap();
        assert_eq!(chunks[0], "quadratic equations and their roots");
    }

    #[test]
    fn test_retrieve_filters_by_subject() {
        let store = test_store();
        store
            .add_chunks("matematica", "a.txt", &["fractions and decimals".into()])
            .unwrap();
        store
            .add_chunks("humanas", "b.txt", &["fractions of society".into()])
            .unwrap();

        let chunks = store.retrieve("matematica", "fractions", 8).unwrap();
        assert_eq!(chunks, vec!["fractions and decimals".to_string()]);
    }

    #[test]
    fn test_retrieve_respects_k() {
        let store = test_store();
        let texts: Vec<String> = (0..10).map(|i| format!("algebra lesson {i}")).collect();
        store.add_chunks("matematica", "a.txt", &texts).unwrap();

        let chunks = store.retrieve("matematica", "algebra", 3).unwrap();
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_retrieve_falls_back_when_no_match() {
        let store = test_store();
        store
            .add_chunks("matematica", "a.txt", &["fractions and decimals".into()])
            .unwrap();

        // Nothing in the corpus mentions this; recent chunks still flow.
        let chunks = store
            .retrieve("matematica", "zzzunmatchable wordzzz", 8)
            .unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_retrieve_punctuation_only_query() {
        let store = test_store();
        store
            .add_chunks("matematica", "a.txt", &["some content".into()])
            .unwrap();

        let chunks = store.retrieve("matematica", "?!, - .", 8).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_retrieve_empty_subject_partition() {
        let store = test_store();
        let chunks = store.retrieve("natureza", "anything at all", 8).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_fts_match_expr() {
        assert_eq!(
            fts_match_expr("Questões de Matemática!").as_deref(),
            Some("\"questões\" OR \"de\" OR \"matemática\"")
        );
        assert_eq!(fts_match_expr("?! ."), None);
    }

    // === End-to-end pipeline ===

    struct FixedModel(String);

    impl CompletionModel for FixedModel {
        fn complete(&self, _prompt: &str) -> ExamResult<String> {
            Ok(self.0.clone())
        }
    }

    fn fixed_payload() -> String {
        let question = |stem: &str| {
            serde_json::json!({
                "id": "Q1",
                "subject": "Matemática",
                "topic": "fractions",
                "difficulty": "medium",
                "stem": stem,
                "options": {"A": "1", "B": "2", "C": "3", "D": "4", "E": "5"},
                "correct": "B",
                "explanation": "The answer is B."
            })
        };
        serde_json::json!({
            "subject": "Matemática",
            "questions": [question("one"), question("two"), question("three")]
        })
        .to_string()
    }

    #[test]
    fn test_full_pipeline_generate_grade_review() {
        let store = test_store();
        store
            .add_chunks(
                "Matemática",
                "fractions.txt",
                &["fractions, decimals and percentages".into()],
            )
            .unwrap();

        let model = FixedModel(fixed_payload());
        let generator = QuizGenerator::new(&store, &model);
        let quiz = generator
            .generate(&GenerateRequest {
                subject: "Matemática".into(),
                n_questions: 3,
                difficulty: Difficulty::Medium,
            })
            .unwrap();

        assert_eq!(quiz.questions.len(), 3);
        for (i, q) in quiz.questions.iter().enumerate() {
            assert!(q.id.starts_with(&format!("MAT-{}-", i + 1)), "id {}", q.id);
        }

        let quiz_id = store.save_quiz(&quiz.subject, &quiz).unwrap();
        assert!(quiz_id >= 1);

        let marked = answers(&[
            (quiz.questions[0].id.as_str(), "B"),
            (quiz.questions[1].id.as_str(), "A"),
            (quiz.questions[2].id.as_str(), "B"),
        ]);
        let graded = grade(&quiz, &marked);
        assert_eq!(graded.score, 2);
        assert!(!graded.feedback[1].is_correct);

        let attempt_id = store
            .save_attempt(quiz_id, &marked, graded.score, &graded.feedback)
            .unwrap();
        assert!(attempt_id >= 1);

        let record = store.load_attempt(attempt_id).unwrap().unwrap();
        assert_eq!(record.score, 2);
        assert_eq!(record.feedback.len(), 3);
        assert_eq!(record.feedback, graded.feedback);
        assert_eq!(record.subject, "Matemática");
    }
}
