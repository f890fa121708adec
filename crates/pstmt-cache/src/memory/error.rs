//! Errors reported by the in-memory backend

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("backend is closed")]
    Closed,

    #[error("operation cancelled")]
    Cancelled,

    #[error("backend temporarily unavailable")]
    Unavailable,

    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("no such table: {0}")]
    UnknownTable(String),

    #[error("table already exists: {0}")]
    TableExists(String),

    #[error("no such column: {0}")]
    UnknownColumn(String),

    #[error("expected {expected} arguments, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },

    #[error("no rows in result set")]
    NoRows,

    #[error("decode error: {0}")]
    Decode(String),
}

impl MemoryError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            offset,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    #[must_use]
    pub const fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }

    #[must_use]
    pub const fn is_no_rows(&self) -> bool {
        matches!(self, Self::NoRows)
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = MemoryError::syntax(0, "unknown statement SELEKT");
        assert!(err.is_syntax());
        assert!(err.to_string().contains("offset 0"));
        assert!(err.to_string().contains("SELEKT"));
    }

    #[test]
    fn test_argument_count_display() {
        let err = MemoryError::ArgumentCount {
            expected: 2,
            actual: 1,
        };
        assert_eq!(err.to_string(), "expected 2 arguments, got 1");
    }

    #[test]
    fn test_predicates() {
        assert!(MemoryError::Closed.is_closed());
        assert!(MemoryError::NoRows.is_no_rows());
        assert!(MemoryError::Cancelled.is_cancelled());
        assert!(!MemoryError::Unavailable.is_closed());
    }
}
