//! Error types for rqlc.

use thiserror::Error;

/// The main error type for parsing and compiling resource queries.
#[derive(Debug, Error)]
pub enum RqlError {
    /// The clause could not be tokenized or parsed.
    #[error("Query syntax error in '{clause}': {message}")]
    Syntax { clause: String, message: String },

    /// The clause parsed but is not a valid query.
    #[error("Invalid query term '{term}': {message}")]
    Validation { term: String, message: String },

    /// The target backend cannot express the operator.
    #[error("Operator '{operator}' is not supported by the {backend} backend")]
    Unsupported { backend: String, operator: String },

    /// A term could not be turned into backend query text.
    #[error("Query compile error at '{term}': {message}")]
    Compile { term: String, message: String },

    /// An internal invariant was violated.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RqlError {
    /// Create a syntax error for the given clause text.
    pub fn syntax(clause: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Syntax {
            clause: clause.into(),
            message: message.into(),
        }
    }

    /// Create a validation error for the given term text.
    pub fn validation(term: impl ToString, message: impl Into<String>) -> Self {
        Self::Validation {
            term: term.to_string(),
            message: message.into(),
        }
    }

    /// Create a backend capability error.
    pub fn unsupported(backend: impl ToString, operator: impl Into<String>) -> Self {
        Self::Unsupported {
            backend: backend.to_string(),
            operator: operator.into(),
        }
    }

    /// Create a compile error for the given term text.
    pub fn compile(term: impl ToString, message: impl Into<String>) -> Self {
        Self::Compile {
            term: term.to_string(),
            message: message.into(),
        }
    }

    /// Report a broken invariant. These are defects, not bad input, so the
    /// full context is logged before the error is handed back.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(%message, "rqlc invariant violated");
        Self::Internal(message)
    }

    /// HTTP status code a request layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Syntax { .. } => 400,
            Self::Validation { .. } => 400,
            Self::Unsupported { .. } => 400,
            Self::Compile { .. } => 400,
            Self::Internal(_) => 500,
            Self::Database(_) => 503,
            Self::Config(_) => 500,
            Self::Io(_) => 500,
        }
    }

    /// True for errors caused by the request itself.
    pub fn is_bad_request(&self) -> bool {
        self.status_code() == 400
    }
}

/// Result type alias for rqlc operations.
pub type RqlResult<T> = Result<T, RqlError>;
