//! Serial reference scheduler

use crate::error::SchedulerResult;
use crate::events::WorkerState;
use crate::scheduler::{ExecutionContext, RunReport, RunTracker, Scheduler, Strategy, TxOutcome};
use rowcc_types::{Batch, Transaction};

/// Runs transactions one at a time, in submission order, on the calling
/// thread.
///
/// Each transaction still takes its locks, so a serial run can share the
/// lock table with other callers. Operations run in program order.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialScheduler;

impl SerialScheduler {
    /// Create a serial scheduler
    pub fn new() -> Self {
        Self
    }

    fn run_one(&self, tx: &Transaction, ctx: &ExecutionContext<'_>) -> SchedulerResult<()> {
        ctx.transition(tx.id(), WorkerState::AcquiringLocks);
        let held = ctx.acquire_locks(tx)?;
        ctx.execute_holding(tx, held)
    }
}

impl Scheduler for SerialScheduler {
    fn strategy(&self) -> Strategy {
        Strategy::Serial
    }

    fn execute(&self, batch: Batch, ctx: &ExecutionContext<'_>) -> RunReport {
        let tracker = RunTracker::start(ctx, Strategy::Serial, &batch);
        let mut outcomes = Vec::with_capacity(batch.len());
        let mut errors = Vec::new();

        for tx in batch.transactions() {
            let state = match self.run_one(tx, ctx) {
                Ok(()) => WorkerState::Done,
                Err(err) => {
                    tracing::warn!(tx = %tx.id(), error = %err, "transaction aborted");
                    errors.push(err);
                    WorkerState::Aborted
                }
            };
            ctx.transition(tx.id(), state);
            outcomes.push(TxOutcome { tx: tx.id(), state });
        }

        tracker.finish(outcomes, errors)
    }
}
