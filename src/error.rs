//! Error types for the intake service

use thiserror::Error;

/// Result type alias for intake operations
pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Error, Debug)]
pub enum AssistantError {

    // =============================
    // Core Pipeline Errors
    // =============================

    /// Completion service unreachable or returned something unusable.
    #[error("Extraction failed: {0}")]
    ExtractionFailure(String),

    /// Parsed payload violates the record schema.
    #[error("Schema violation: {0}")]
    ValidationFailure(String),

    /// Pending record refused at confirm time.
    #[error("Commit refused: {0}")]
    CommitValidationFailure(String),

    #[error("Persistence error: {0}")]
    PersistenceFailure(String),

    #[error("Sync error: {0}")]
    SyncFailure(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    #[error("UUID parse error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
