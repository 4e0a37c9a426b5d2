//! Error types shared across the manuscript analysis workspace.

use thiserror::Error;

/// Main error type for the manuscript engine.
#[derive(Error, Debug)]
pub enum ManuscriptError {
    /// IO related errors.
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Serialization/deserialization errors.
    #[error("serialization error: {source}")]
    Serialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Invalid input provided to a function.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Item not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A request conflicts with current state (e.g. identity gate rejection).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Database errors (connection, schema, query).
    #[error("database error: {0}")]
    Database(String),

    /// A capability (LLM, embeddings, ANN, grammar checker) is unavailable.
    ///
    /// This is explicitly *not* fatal: callers should treat it as an
    /// instruction to omit the method/feature rather than abort.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// The heavy-task scheduler rejected or timed out a task.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Lock acquisition errors (poisoned mutex, project-scoped lock contention).
    #[error("lock error: {0}")]
    Lock(String),

    /// Fatal internal error: should be logged with full context and surfaced
    /// to callers as a generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors specific to the heavy-task scheduler (see `manuscript-infra::scheduler`).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("heavy task '{0}' timed out")]
    Timeout(String),
    #[error("heavy task '{0}' rejected: scheduler at capacity")]
    Rejected(String),
    #[error("heavy task '{0}' failed: {1}")]
    Internal(String, String),
}

impl From<serde_json::Error> for ManuscriptError {
    fn from(error: serde_json::Error) -> Self {
        ManuscriptError::Serialization {
            source: Box::new(error),
        }
    }
}

impl From<anyhow::Error> for ManuscriptError {
    fn from(error: anyhow::Error) -> Self {
        ManuscriptError::Internal(error.to_string())
    }
}

/// Result type used throughout the manuscript engine.
pub type Result<T> = std::result::Result<T, ManuscriptError>;
