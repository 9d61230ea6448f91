//! # rowcc-core
//!
//! Engine API for RowCC.
//!
//! An [`Engine`] owns the rows, the lock table and the execution log. It
//! runs batches under a chosen [`Strategy`] and hands the resulting
//! history to the serializability verifier.
//!
//! ```
//! use rowcc_core::{verify_serializability, Batch, Engine, Strategy, Transaction, TxId};
//!
//! let engine = Engine::new(10);
//! let batch = Batch::new(vec![
//!     Transaction::new(TxId::new(1)).write(3, 30),
//!     Transaction::new(TxId::new(2)).read(3),
//! ])
//! .unwrap();
//!
//! let report = engine.run(batch, Strategy::OrderedTwoPhase).unwrap();
//! assert!(report.is_clean());
//! assert!(verify_serializability(&engine.log()).is_serializable());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;

pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};

pub use rowcc_metrics::MetricsSnapshot;
pub use rowcc_primitives::{PartitionId, RowId, TxId, Value, DEFAULT_ROW_COUNT};
pub use rowcc_scheduler::{
    verify_serializability, CancellationToken, ConflictGraph, EventSink, MemorySink, RunReport,
    SchedulerError, SchedulerEvent, Strategy, TracingSink, TxOutcome, Verdict, WorkerState,
};
pub use rowcc_types::{Batch, OpKind, Operation, Transaction};
