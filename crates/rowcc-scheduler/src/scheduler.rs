//! Scheduler abstraction shared by every strategy

use crate::access_set::AccessSet;
use crate::cancel::CancellationToken;
use crate::error::{SchedulerError, SchedulerResult};
use crate::events::{EventSink, SchedulerEvent, WorkerState};
use crate::lock::{HeldLocks, LockManager};
use crate::log::ExecutionLog;
use crate::ordered::OrderedTwoPhaseScheduler;
use crate::pipeline::PartitionedPipelineScheduler;
use crate::serial::SerialScheduler;
use rowcc_metrics::{Counter, Gauge, Metrics, Timer};
use rowcc_primitives::{PartitionId, TxId};
use rowcc_storage::RowStore;
use rowcc_types::{Batch, OpKind, Operation, Transaction};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Partition count used when a pipeline strategy does not name one
pub const DEFAULT_PARTITIONS: usize = 4;

/// Scheduling strategy for a batch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Strategy {
    /// One transaction at a time on the calling thread
    Serial,
    /// Thread per transaction, ascending-order 2PL, admission in submission order
    #[default]
    OrderedTwoPhase,
    /// Row space split across `partitions` workers chained by queues
    PartitionedPipeline {
        /// Number of partitions
        partitions: usize,
    },
}

impl Strategy {
    /// Pipeline strategy with `partitions` partitions
    pub fn pipeline(partitions: usize) -> Self {
        Strategy::PartitionedPipeline { partitions }
    }

    /// Scheduler implementing this strategy
    pub fn scheduler(&self) -> Box<dyn Scheduler> {
        match *self {
            Strategy::Serial => Box::new(SerialScheduler::new()),
            Strategy::OrderedTwoPhase => Box::new(OrderedTwoPhaseScheduler::new()),
            Strategy::PartitionedPipeline { partitions } => {
                Box::new(PartitionedPipelineScheduler::new(partitions))
            }
        }
    }

    /// Partition count, for the pipeline strategy
    pub fn partitions(&self) -> Option<usize> {
        match self {
            Strategy::PartitionedPipeline { partitions } => Some(*partitions),
            _ => None,
        }
    }

    /// Whether rows are protected by the lock manager under this strategy
    pub fn uses_locks(&self) -> bool {
        !matches!(self, Strategy::PartitionedPipeline { .. })
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Serial => f.write_str("serial"),
            Strategy::OrderedTwoPhase => f.write_str("ordered"),
            Strategy::PartitionedPipeline { partitions } => write!(f, "pipeline:{}", partitions),
        }
    }
}

impl FromStr for Strategy {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "serial" => return Ok(Strategy::Serial),
            "ordered" | "ordered-2pl" | "2pl" => return Ok(Strategy::OrderedTwoPhase),
            "pipeline" => return Ok(Strategy::pipeline(DEFAULT_PARTITIONS)),
            _ => {}
        }
        normalized
            .strip_prefix("pipeline:")
            .and_then(|p| p.parse::<usize>().ok())
            .map(Strategy::pipeline)
            .ok_or_else(|| SchedulerError::InvalidStrategy(s.to_string()))
    }
}

impl TryFrom<String> for Strategy {
    type Error = SchedulerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Strategy> for String {
    fn from(strategy: Strategy) -> Self {
        strategy.to_string()
    }
}

/// Shared resources a scheduler runs against
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    /// Rows
    pub store: &'a RowStore,
    /// Row locks
    pub locks: &'a LockManager,
    /// History of executed operations
    pub log: &'a ExecutionLog,
    /// Event receiver
    pub events: &'a dyn EventSink,
    /// Optional metrics
    pub metrics: Option<&'a Metrics>,
    /// Cancellation for this run
    pub cancel: &'a CancellationToken,
    /// How often blocked waits re-check `cancel`
    pub poll_interval: Duration,
}

impl<'a> ExecutionContext<'a> {
    /// Context with no metrics, a fresh token and the default poll interval
    pub fn new(
        store: &'a RowStore,
        locks: &'a LockManager,
        log: &'a ExecutionLog,
        events: &'a dyn EventSink,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            store,
            locks,
            log,
            events,
            metrics: None,
            cancel,
            poll_interval: crate::DEFAULT_POLL_INTERVAL,
        }
    }

    /// Attach metrics
    pub fn with_metrics(mut self, metrics: &'a Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Override the poll interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Report a worker state change
    pub(crate) fn transition(&self, tx: TxId, state: WorkerState) {
        self.events.emit(SchedulerEvent::StateChanged { tx, state });
    }

    /// Acquire every lock `tx` needs, in ascending row order
    pub(crate) fn acquire_locks(&self, tx: &Transaction) -> SchedulerResult<HeldLocks<'a>> {
        let held = self
            .locks
            .acquire(tx.id(), &AccessSet::from_transaction(tx), self.cancel)?;
        self.events.emit(SchedulerEvent::LocksAcquired {
            tx: tx.id(),
            rows: held.rows().to_vec(),
        });
        Ok(held)
    }

    /// Run `tx` in program order under `held`, then release every lock
    pub(crate) fn execute_holding(&self, tx: &Transaction, held: HeldLocks<'_>) -> SchedulerResult<()> {
        let id = tx.id();
        self.transition(id, WorkerState::Executing);
        for op in tx.operations() {
            self.apply_locked(&held, op.clone())?;
        }
        self.transition(id, WorkerState::ReleasingLocks);
        let count = held.release();
        self.events.emit(SchedulerEvent::LocksReleased { tx: id, count });
        Ok(())
    }

    /// Apply `op` through held locks, then log it
    pub(crate) fn apply_locked(&self, held: &HeldLocks<'_>, mut op: Operation) -> SchedulerResult<()> {
        match op.kind() {
            OpKind::Read => {
                let observed = held.read(self.store, op.row())?;
                op.record_read(observed);
            }
            OpKind::Write => held.write(self.store, op.row(), op.payload())?,
        }
        self.record(op, None);
        Ok(())
    }

    /// Append an executed operation to the log and report it
    pub(crate) fn record(&self, op: Operation, partition: Option<PartitionId>) {
        self.log.append(op.clone());
        if let Some(metrics) = self.metrics {
            metrics.incr(Counter::OpsExecuted, 1);
        }
        self.events.emit(SchedulerEvent::OperationExecuted { op, partition });
    }
}

impl fmt::Debug for ExecutionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("rows", &self.store.len())
            .field("log_len", &self.log.len())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Terminal state of one transaction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutcome {
    /// Transaction
    pub tx: TxId,
    /// `Done` or `Aborted`
    pub state: WorkerState,
}

/// Result of running one batch
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// Strategy that ran the batch
    pub strategy: Strategy,
    /// One outcome per transaction, in submission order
    pub outcomes: Vec<TxOutcome>,
    /// Errors collected from workers
    pub errors: Vec<SchedulerError>,
    /// Operations appended to the log by this run
    pub operations_executed: usize,
    /// Wall-clock duration
    pub elapsed: Duration,
}

impl RunReport {
    /// Empty report for `strategy`
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            outcomes: Vec::new(),
            errors: Vec::new(),
            operations_executed: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Whether no worker reported an error
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Transactions that finished normally
    pub fn committed(&self) -> usize {
        self.count(WorkerState::Done)
    }

    /// Transactions that were interrupted
    pub fn aborted(&self) -> usize {
        self.count(WorkerState::Aborted)
    }

    /// Terminal state of `tx`
    pub fn outcome(&self, tx: TxId) -> Option<WorkerState> {
        self.outcomes.iter().find(|o| o.tx == tx).map(|o| o.state)
    }

    fn count(&self, state: WorkerState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }
}

/// Tracks one run from start to report
pub(crate) struct RunTracker<'c, 'a> {
    ctx: &'c ExecutionContext<'a>,
    strategy: Strategy,
    started: Instant,
    log_start: usize,
}

impl<'c, 'a> RunTracker<'c, 'a> {
    pub(crate) fn start(ctx: &'c ExecutionContext<'a>, strategy: Strategy, batch: &Batch) -> Self {
        ctx.events.emit(SchedulerEvent::RunStarted {
            strategy: strategy.to_string(),
            transactions: batch.len(),
        });
        Self {
            ctx,
            strategy,
            started: Instant::now(),
            log_start: ctx.log.len(),
        }
    }

    pub(crate) fn finish(self, outcomes: Vec<TxOutcome>, errors: Vec<SchedulerError>) -> RunReport {
        let elapsed = self.started.elapsed();
        let report = RunReport {
            strategy: self.strategy,
            outcomes,
            errors,
            operations_executed: self.ctx.log.len().saturating_sub(self.log_start),
            elapsed,
        };

        let elapsed_us = elapsed.as_micros() as u64;
        if let Some(metrics) = self.ctx.metrics {
            metrics.incr(Counter::TxCommitted, report.committed() as u64);
            metrics.incr(Counter::TxAborted, report.aborted() as u64);
            metrics.observe(Timer::RunDuration, elapsed);
            metrics.set(Gauge::LogLen, self.ctx.log.len() as i64);
        }
        self.ctx.events.emit(SchedulerEvent::RunFinished {
            committed: report.committed(),
            aborted: report.aborted(),
            elapsed_us,
        });
        report
    }
}

/// A batch execution strategy.
///
/// `execute` blocks until every worker it started has reached a terminal
/// state. Worker failures never abort siblings; they are collected into the
/// report.
pub trait Scheduler: Send + Sync {
    /// Strategy implemented
    fn strategy(&self) -> Strategy;

    /// Run `batch` against the shared resources in `ctx`
    fn execute(&self, batch: Batch, ctx: &ExecutionContext<'_>) -> RunReport;
}

/// Turn a panic payload from a worker thread into an error
pub(crate) fn panic_error(label: impl fmt::Display, payload: Box<dyn std::any::Any + Send>) -> SchedulerError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    SchedulerError::WorkerPanicked(format!("{}: {}", label, message))
}
