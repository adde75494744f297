//! Structured error types for the molstack workspace.

use thiserror::Error;

/// Unified error type for all molstack operations.
#[derive(Debug, Error)]
pub enum MolError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (malformed PDBx or PDB text)
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input (bad arguments, mismatched mask lengths, ragged columns)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Requested data block, category or key does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal consistency check failed on otherwise valid input
    #[error("invariant violated: {0}")]
    Invariant(String),

    /// Catch-all for other errors
    #[error("{0}")]
    Other(String),
}

impl MolError {
    /// Parse error tagged with a 1-based line number.
    pub fn parse_at(line: usize, details: impl core::fmt::Display) -> Self {
        MolError::Parse(format!("line {}: {}", line, details))
    }
}

/// Convenience alias used throughout the molstack workspace.
pub type Result<T> = std::result::Result<T, MolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_at_includes_line() {
        let err = MolError::parse_at(12, "unterminated text field");
        assert_eq!(
            err.to_string(),
            "parse error: line 12: unterminated text field"
        );
    }

    #[test]
    fn io_errors_convert() {
        fn open() -> Result<String> {
            Ok(std::fs::read_to_string("/nonexistent/molstack/file.cif")?)
        }
        assert!(matches!(open(), Err(MolError::Io(_))));
    }
}
