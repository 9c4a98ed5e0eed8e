use rusqlite::Connection;

use examgen_core::ExamError;

pub fn init_db(conn: &Connection) -> Result<(), ExamError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS quizzes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            subject TEXT NOT NULL,
            created_at TEXT NOT NULL,
            quiz_json TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_quizzes_subject ON quizzes(subject);

        CREATE TABLE IF NOT EXISTS attempts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            quiz_id INTEGER NOT NULL REFERENCES quizzes(id),
            submitted_at TEXT NOT NULL,
            answers_json TEXT NOT NULL,
            score INTEGER NOT NULL CHECK(score >= 0),
            feedback_json TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_attempts_quiz ON attempts(quiz_id);

        -- Corpus chunks, one subject partition per subject label
        CREATE TABLE IF NOT EXISTS chunks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            subject TEXT NOT NULL,
            source TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_subject ON chunks(subject);
        ",
    )
    .map_err(|e| ExamError::Database(e.to_string()))?;

    // Check if the chunks FTS table already exists
    let fts_exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='chunks_fts'",
            [],
            |row| row.get(0),
        )
        .map_err(|e| ExamError::Database(e.to_string()))?;

    if !fts_exists {
        // chunks are append-only, so only the insert trigger is needed
        conn.execute_batch(
            "
            CREATE VIRTUAL TABLE chunks_fts USING fts5(
                subject,
                content,
                content='chunks',
                content_rowid='id'
            );

            CREATE TRIGGER chunks_ai AFTER INSERT ON chunks BEGIN
                INSERT INTO chunks_fts(rowid, subject, content)
                VALUES (new.id, new.subject, new.content);
            END;
            ",
        )
        .map_err(|e| ExamError::Database(e.to_string()))?;
    }

    Ok(())
}
