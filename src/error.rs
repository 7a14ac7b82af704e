use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Intent detection failed: {0}")]
    Classification(String),

    #[error("SQL generation failed: {0}")]
    Synthesis(String),

    #[error("Generated SQL failed safety checks ({reason}): {statement}")]
    SafetyRejection { statement: String, reason: String },

    #[error("Database error: {0}")]
    Execution(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueryError {
    /// Stable category string reported to callers alongside the message.
    pub fn category(&self) -> &'static str {
        match self {
            QueryError::Input(_) => "input_error",
            QueryError::Classification(_) => "classification_error",
            QueryError::Synthesis(_) => "synthesis_error",
            QueryError::SafetyRejection { .. } => "safety_rejection",
            QueryError::Execution(_) | QueryError::Database(_) => "execution_error",
            QueryError::Llm(_) => "llm_error",
            QueryError::Config(_) => "config_error",
            QueryError::Io(_) => "io_error",
            QueryError::Json(_) => "json_error",
        }
    }

    /// True for errors caused by the request itself rather than a collaborator.
    pub fn is_client_error(&self) -> bool {
        matches!(self, QueryError::Input(_) | QueryError::SafetyRejection { .. })
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        QueryError::Database(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
