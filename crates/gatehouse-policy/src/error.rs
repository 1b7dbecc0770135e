//! Error types for policy loading and evaluation.

use thiserror::Error;

/// Errors that can occur while loading, preparing or evaluating a policy.
///
/// `Compile` and `Query` happen at startup and must stop the process.
/// `Evaluation` happens per request and callers treat it as a denial.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The rule text could not be parsed.
    #[error("policy {name} failed to compile: {message}")]
    Compile { name: String, message: String },

    /// The query expression does not bind to the document.
    #[error("invalid query {query:?}: {message}")]
    Query { query: String, message: String },

    /// Running the rules against a fact set failed.
    #[error("evaluation of {query:?} failed: {message}")]
    Evaluation { query: String, message: String },

    /// IO error (reading policy files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PolicyError {
    pub(crate) fn compile(name: &str, message: impl Into<String>) -> Self {
        Self::Compile {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn query(query: &str, message: impl Into<String>) -> Self {
        Self::Query {
            query: query.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn evaluation(query: &str, message: impl ToString) -> Self {
        Self::Evaluation {
            query: query.to_string(),
            message: message.to_string(),
        }
    }
}
