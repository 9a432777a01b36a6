//! Error types for the de-identification compiler.

use thiserror::Error;

/// The main error type for deid operations.
#[derive(Debug, Error)]
pub enum DeidError {
    /// Unknown dialect, unknown rule type, unusable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A citation names a rule that the cache cannot provide.
    #[error("Reference error in '{citation}': {message}")]
    Reference { citation: String, message: String },

    /// A rule cannot be rendered with the selected dialect.
    #[error("Template error ({label}): {message}")]
    Template { label: String, message: String },

    /// No valid SQL can be produced for the table.
    #[error("Assembly error for {table}: {message}")]
    Assembly { table: String, message: String },

    /// Malformed input document.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// The query engine reported errors for a job.
    #[error("Execution error in job {job}: {}", .messages.join("; "))]
    Execution { job: String, messages: Vec<String> },

    /// Jobs still running after the backoff budget was spent.
    #[error("Job timeout: {} job(s) did not complete: {}", .jobs.len(), .jobs.join(", "))]
    JobTimeout { jobs: Vec<String> },

    /// The executor cancelled a job; its compiled query is dropped.
    #[error("Job {job} was cancelled")]
    Abandoned { job: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeidError {
    /// Create a reference error for the given citation.
    pub fn reference(citation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Reference {
            citation: citation.into(),
            message: message.into(),
        }
    }

    /// Create a template error for the given rule label.
    pub fn template(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Template {
            label: label.into(),
            message: message.into(),
        }
    }

    /// Create an assembly error for the given table.
    pub fn assembly(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Assembly {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Whether the compiler may skip the offending citation and continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Reference { .. } | Self::Template { .. })
    }
}

/// Result type alias for deid operations.
pub type DeidResult<T> = Result<T, DeidError>;
