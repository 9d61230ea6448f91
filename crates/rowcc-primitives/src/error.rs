//! Common error types for primitives

use thiserror::Error;

/// Primitive operation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    /// Row index outside of the store
    #[error("row {row} out of range (row count {row_count})")]
    RowOutOfRange {
        /// Offending row index
        row: usize,
        /// Number of rows in the store
        row_count: usize,
    },

    /// Identifier could not be parsed
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}
