//! Engine error types

use rowcc_scheduler::SchedulerError;
use rowcc_storage::StorageError;
use rowcc_types::TypeError;
use thiserror::Error;

/// Engine errors
///
/// Worker failures during a run are not errors at this level; they are
/// collected in the run report.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration rejected
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Batch does not fit the engine
    #[error("invalid batch: {0}")]
    InvalidBatch(#[from] TypeError),

    /// Strategy does not fit the engine
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Row store failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
