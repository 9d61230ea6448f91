//! Worker events
//!
//! Workers report what they do through an injected [`EventSink`] instead of
//! printing. [`TracingSink`] forwards to `tracing`; [`MemorySink`] keeps
//! events in memory for tests.

use crate::lock::LockMode;
use parking_lot::Mutex;
use rowcc_primitives::{PartitionId, RowId, TxId};
use rowcc_types::Operation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one transaction worker
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Waiting for the previous transaction to finish acquiring its locks
    WaitingForAdmission,
    /// Acquiring row locks in ascending row order
    AcquiringLocks,
    /// Applying operations in program order
    Executing,
    /// Releasing every held lock
    ReleasingLocks,
    /// Finished normally
    Done,
    /// Interrupted; no further operations will run
    Aborted,
}

impl WorkerState {
    /// Whether no further transition can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Done | WorkerState::Aborted)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::WaitingForAdmission => "waiting-for-admission",
            WorkerState::AcquiringLocks => "acquiring-locks",
            WorkerState::Executing => "executing",
            WorkerState::ReleasingLocks => "releasing-locks",
            WorkerState::Done => "done",
            WorkerState::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Something a worker did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A batch run started
    RunStarted {
        /// Strategy name
        strategy: String,
        /// Transactions in the batch
        transactions: usize,
    },
    /// A transaction worker changed state
    StateChanged {
        /// Transaction
        tx: TxId,
        /// New state
        state: WorkerState,
    },
    /// Every lock of a transaction is held
    LocksAcquired {
        /// Transaction
        tx: TxId,
        /// Rows and modes, ascending by row
        rows: Vec<(RowId, LockMode)>,
    },
    /// Every lock of a transaction was released
    LocksReleased {
        /// Transaction
        tx: TxId,
        /// Number of rows released
        count: usize,
    },
    /// An operation was applied and logged
    OperationExecuted {
        /// The operation, with the observed value for reads
        op: Operation,
        /// Executing partition, for the pipeline strategy
        partition: Option<PartitionId>,
    },
    /// A transaction moved to the next pipeline partition
    Forwarded {
        /// Transaction
        tx: TxId,
        /// Sending partition
        from: PartitionId,
        /// Operations still to run downstream
        remaining: usize,
    },
    /// A pipeline partition worker exited
    PartitionStopped {
        /// Partition
        partition: PartitionId,
        /// Whether it exited because of cancellation
        interrupted: bool,
    },
    /// A batch run finished
    RunFinished {
        /// Transactions that reached `Done`
        committed: usize,
        /// Transactions that reached `Aborted`
        aborted: usize,
        /// Wall-clock duration in microseconds
        elapsed_us: u64,
    },
}

/// Receiver of worker events, shared by every worker of a run
pub trait EventSink: Send + Sync {
    /// Handle one event
    fn emit(&self, event: SchedulerEvent);
}

/// Sink that forwards events to `tracing`
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: SchedulerEvent) {
        match event {
            SchedulerEvent::RunStarted { strategy, transactions } => {
                tracing::info!(%strategy, transactions, "run started");
            }
            // aborts and interruptions are warned by the worker, with the error
            SchedulerEvent::StateChanged { tx, state } => {
                tracing::debug!(%tx, %state, "state changed");
            }
            SchedulerEvent::LocksAcquired { tx, rows } => {
                tracing::debug!(%tx, ?rows, "locks acquired");
            }
            SchedulerEvent::LocksReleased { tx, count } => {
                tracing::debug!(%tx, count, "locks released");
            }
            SchedulerEvent::OperationExecuted { op, partition } => {
                tracing::debug!(?partition, "executed {}", op);
            }
            SchedulerEvent::Forwarded { tx, from, remaining } => {
                tracing::trace!(%tx, %from, remaining, "forwarded");
            }
            SchedulerEvent::PartitionStopped { partition, interrupted } => {
                tracing::debug!(%partition, interrupted, "partition stopped");
            }
            SchedulerEvent::RunFinished { committed, aborted, elapsed_us } => {
                tracing::info!(committed, aborted, elapsed_us, "run finished");
            }
        }
    }
}

/// Sink that records every event, in emission order
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SchedulerEvent>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every recorded event
    pub fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().clone()
    }

    /// States a transaction went through, in order
    pub fn states_of(&self, tx: TxId) -> Vec<WorkerState> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SchedulerEvent::StateChanged { tx: t, state } if *t == tx => Some(*state),
                _ => None,
            })
            .collect()
    }

    /// Forget every recorded event
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: SchedulerEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(WorkerState::Done.is_terminal());
        assert!(WorkerState::Aborted.is_terminal());
        assert!(!WorkerState::Executing.is_terminal());
    }

    #[test]
    fn test_memory_sink_states() {
        let sink = MemorySink::new();
        let t1 = TxId::new(1);
        sink.emit(SchedulerEvent::StateChanged { tx: t1, state: WorkerState::WaitingForAdmission });
        sink.emit(SchedulerEvent::StateChanged { tx: TxId::new(2), state: WorkerState::Done });
        sink.emit(SchedulerEvent::StateChanged { tx: t1, state: WorkerState::Done });

        assert_eq!(
            sink.states_of(t1),
            vec![WorkerState::WaitingForAdmission, WorkerState::Done]
        );
        assert_eq!(sink.events().len(), 3);

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_tracing_sink_accepts_every_event() {
        let sink = TracingSink;
        sink.emit(SchedulerEvent::RunStarted { strategy: "serial".into(), transactions: 0 });
        sink.emit(SchedulerEvent::RunFinished { committed: 0, aborted: 0, elapsed_us: 0 });
    }
}
