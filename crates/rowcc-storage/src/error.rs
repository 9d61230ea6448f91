//! Storage error types

use rowcc_primitives::PrimitiveError;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Row index outside of the store
    #[error(transparent)]
    OutOfRange(#[from] PrimitiveError),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
