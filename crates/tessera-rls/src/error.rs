//! Error types for the rewrite crate.

use thiserror::Error;

/// Errors that can occur while rewriting a virtual-schema statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    /// SQL parsing failed.
    #[error("failed to parse SQL: {0}")]
    Parse(String),

    /// Statement references a table that is not in the virtual schema.
    #[error("No such table found.")]
    UnknownTable { identifier: String },

    /// Statement references a column that is not visible in its table.
    #[error("No such column found.")]
    UnknownColumn { identifier: String },

    /// Statement calls a function that reads outside the virtual schema.
    #[error("Function not allowed.")]
    ForbiddenFunction { identifier: String },

    /// Only single read-only queries are rewritten.
    #[error("only read-only queries are allowed, got {operation}")]
    NotReadOnly { operation: String },

    #[error("expected exactly one statement, got {count}")]
    MultipleStatements { count: usize },

    #[error("empty SQL statement")]
    Empty,
}

impl RewriteError {
    /// The offending identifier for unknown references and forbidden calls.
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::UnknownTable { identifier }
            | Self::UnknownColumn { identifier }
            | Self::ForbiddenFunction { identifier } => Some(identifier),
            _ => None,
        }
    }
}
