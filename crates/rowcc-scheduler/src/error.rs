//! Error types for the scheduler

use crate::lock::LockMode;
use rowcc_primitives::{PartitionId, PrimitiveError, RowId, TxId};
use rowcc_storage::StorageError;
use thiserror::Error;

/// Scheduler errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Cancelled while waiting for (or about to wait for) a row lock
    #[error("transaction {tx} interrupted while acquiring lock on {row}")]
    LockAcquisitionInterrupted {
        /// Interrupted transaction
        tx: TxId,
        /// Row being locked
        row: RowId,
    },

    /// Cancelled while waiting at the admission gate
    #[error("transaction {tx} interrupted while waiting for admission")]
    AdmissionInterrupted {
        /// Interrupted transaction
        tx: TxId,
    },

    /// Pipeline worker cancelled while waiting on its queue
    #[error("pipeline partition {partition} interrupted")]
    PipelineInterrupted {
        /// Interrupted partition
        partition: PartitionId,
    },

    /// Partition count does not fit the row space
    #[error("invalid partition count {partitions} for {row_count} rows")]
    InvalidPartitionCount {
        /// Requested partitions
        partitions: usize,
        /// Rows in the store
        row_count: usize,
    },

    /// Row accessed without holding a sufficient lock
    #[error("transaction {tx} accessed {row} without holding a {mode:?} lock")]
    RowNotHeld {
        /// Accessing transaction
        tx: TxId,
        /// Row accessed
        row: RowId,
        /// Mode the access required
        mode: LockMode,
    },

    /// Operation reached a partition that does not own its row
    #[error("transaction {tx}: {row} is not owned by partition {partition}")]
    RowOutOfPartition {
        /// Transaction holding the operation
        tx: TxId,
        /// Target row
        row: RowId,
        /// Partition that received it
        partition: PartitionId,
    },

    /// Two partitions claimed the same row
    #[error("ownership conflict: {row} owned by {owner}, requested by {requester}")]
    OwnershipConflict {
        /// Row in dispute
        row: RowId,
        /// Current owner
        owner: PartitionId,
        /// Partition requesting ownership
        requester: PartitionId,
    },

    /// Transaction cancelled before all of its operations ran
    #[error("transaction {tx} cancelled")]
    TransactionCancelled {
        /// Cancelled transaction
        tx: TxId,
    },

    /// A worker thread could not be started
    #[error("failed to spawn worker {0}")]
    WorkerSpawn(String),

    /// A worker thread panicked
    #[error("worker {0} panicked")]
    WorkerPanicked(String),

    /// Strategy string could not be parsed
    #[error("invalid strategy: {0}")]
    InvalidStrategy(String),

    /// Row index outside of the lock table
    #[error(transparent)]
    RowOutOfRange(#[from] PrimitiveError),

    /// Row store failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SchedulerError {
    /// Whether the error comes from a cancelled blocking wait
    pub fn is_interruption(&self) -> bool {
        matches!(
            self,
            SchedulerError::LockAcquisitionInterrupted { .. }
                | SchedulerError::AdmissionInterrupted { .. }
                | SchedulerError::PipelineInterrupted { .. }
                | SchedulerError::TransactionCancelled { .. }
        )
    }
}

/// Result type for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
