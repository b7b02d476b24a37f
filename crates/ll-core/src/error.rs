//! Error types for llflow

use thiserror::Error;

/// llflow error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Input table or file could not be opened or decoded
    #[error("resource error: {0}")]
    Resource(String),

    /// Required columns are absent from the input table
    #[error("missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Column exists but its element type is not usable
    #[error("column '{column}' has wrong type: expected {expected}, got {actual}")]
    WrongType {
        /// Column name.
        column: String,
        /// Accepted type(s).
        expected: String,
        /// Type found in the table.
        actual: String,
    },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_lists_every_name() {
        let err = Error::MissingColumns(vec!["nElectron".into(), "PuppiMET_pt".into()]);
        assert_eq!(err.to_string(), "missing required column(s): nElectron, PuppiMET_pt");
    }
}
