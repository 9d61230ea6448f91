//! # rowcc-scheduler
//!
//! Concurrency control for RowCC.
//!
//! This crate executes batches of transactions against a shared
//! [`RowStore`](rowcc_storage::RowStore) and checks the resulting history.
//!
//! Features:
//! - Row-level read/write locks acquired in ascending row order
//! - Append-only execution log shared by every worker
//! - Three strategies: serial, ordered two-phase locking and a
//!   partitioned pipeline
//! - Conflict graph construction and serializability verification

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access_set;
pub mod cancel;
pub mod dependency;
pub mod error;
pub mod events;
pub mod gate;
pub mod lock;
pub mod log;
pub mod ordered;
pub mod ownership;
pub mod partition;
pub mod pipeline;
pub mod scheduler;
pub mod serial;
pub mod verifier;

pub use access_set::AccessSet;
pub use cancel::CancellationToken;
pub use dependency::{ConflictEdge, ConflictGraph, ConflictKind};
pub use error::{SchedulerError, SchedulerResult};
pub use events::{EventSink, MemorySink, SchedulerEvent, TracingSink, WorkerState};
pub use gate::{AdmissionGate, AdmissionTurn};
pub use lock::{HeldLocks, LockManager, LockMode};
pub use log::ExecutionLog;
pub use ordered::OrderedTwoPhaseScheduler;
pub use ownership::OwnershipTable;
pub use partition::PartitionMap;
pub use pipeline::PartitionedPipelineScheduler;
pub use scheduler::{ExecutionContext, RunReport, Scheduler, Strategy, TxOutcome};
pub use serial::SerialScheduler;
pub use verifier::{verify_serializability, SerializabilityVerifier, Verdict};

/// Default interval at which blocked waits re-check cancellation
pub const DEFAULT_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(5);
