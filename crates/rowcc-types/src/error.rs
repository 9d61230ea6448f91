//! Type validation errors

use rowcc_primitives::{PrimitiveError, TxId};
use thiserror::Error;

/// Errors raised while building transactions and batches
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    /// Two transactions in one batch share an id
    #[error("duplicate transaction id {0} in batch")]
    DuplicateTransaction(TxId),

    /// Id 0 belongs to the pipeline sentinel
    #[error("transaction id {0} is reserved for the pipeline sentinel")]
    ReservedTransactionId(TxId),

    /// Operation tagged with another transaction's id
    #[error("operation of {found} added to transaction {expected}")]
    ForeignOperation {
        /// Transaction being built
        expected: TxId,
        /// Id carried by the operation
        found: TxId,
    },

    /// Operation addresses a row outside the store
    #[error("transaction {tx}: {source}")]
    RowOutOfRange {
        /// Transaction holding the operation
        tx: TxId,
        /// Underlying range error
        #[source]
        source: PrimitiveError,
    },
}

/// Result type for type construction
pub type TypeResult<T> = Result<T, TypeError>;
