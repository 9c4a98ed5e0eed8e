use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExamError {
    #[error("retrieval error: {0}")]
    Retrieval(String),

    #[error("model invocation error: {0}")]
    Model(String),

    #[error("model output is not valid JSON: {0}")]
    Parse(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("question {0}: option {1} is missing or empty")]
    IncompleteOptions(usize, char),

    #[error("question {0} has invalid answer key {1:?}")]
    InvalidAnswerKey(usize, String),

    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

pub type ExamResult<T> = Result<T, ExamError>;
