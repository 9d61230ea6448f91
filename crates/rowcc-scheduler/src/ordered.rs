//! Ordered two-phase locking scheduler
//!
//! One worker thread per transaction. Lock acquisition phases are chained
//! through an [`AdmissionGate`] in submission order; execution phases run
//! concurrently once a worker holds its locks.

use crate::error::{SchedulerError, SchedulerResult};
use crate::events::WorkerState;
use crate::gate::AdmissionGate;
use crate::scheduler::{
    panic_error, ExecutionContext, RunReport, RunTracker, Scheduler, Strategy, TxOutcome,
};
use rowcc_primitives::TxId;
use rowcc_types::{Batch, Transaction};
use std::thread;

/// Thread-per-transaction 2PL scheduler with ordered admission
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderedTwoPhaseScheduler;

impl OrderedTwoPhaseScheduler {
    /// Create the scheduler
    pub fn new() -> Self {
        Self
    }
}

fn run_worker(
    index: usize,
    tx: &Transaction,
    gate: &AdmissionGate,
    ctx: &ExecutionContext<'_>,
) -> SchedulerResult<()> {
    let id = tx.id();
    ctx.transition(id, WorkerState::WaitingForAdmission);
    let turn = gate.wait_turn(index, id, ctx.cancel)?;

    ctx.transition(id, WorkerState::AcquiringLocks);
    // an early return drops `turn`, which still admits the next worker
    let held = ctx.acquire_locks(tx)?;
    turn.admit_next();

    ctx.execute_holding(tx, held)
}

fn finish_worker(id: TxId, result: SchedulerResult<()>, ctx: &ExecutionContext<'_>) -> SchedulerResult<()> {
    match &result {
        Ok(()) => ctx.transition(id, WorkerState::Done),
        Err(err) => {
            tracing::warn!(tx = %id, error = %err, "worker aborted");
            ctx.transition(id, WorkerState::Aborted);
        }
    }
    result
}

impl Scheduler for OrderedTwoPhaseScheduler {
    fn strategy(&self) -> Strategy {
        Strategy::OrderedTwoPhase
    }

    fn execute(&self, batch: Batch, ctx: &ExecutionContext<'_>) -> RunReport {
        let tracker = RunTracker::start(ctx, Strategy::OrderedTwoPhase, &batch);
        let transactions = batch.into_transactions();
        let gate = AdmissionGate::new(transactions.len(), ctx.poll_interval);

        let results: Vec<(TxId, SchedulerResult<()>)> = thread::scope(|s| {
            let handles: Vec<_> = transactions
                .iter()
                .enumerate()
                .map(|(index, tx)| {
                    let gate = &gate;
                    let spawned = thread::Builder::new()
                        .name(format!("rowcc-{}", tx.id()))
                        .spawn_scoped(s, move || {
                            finish_worker(tx.id(), run_worker(index, tx, gate, ctx), ctx)
                        });
                    if spawned.is_err() {
                        gate.abandon(index);
                    }
                    (tx.id(), spawned)
                })
                .collect();

            // joining every handle is the completion barrier
            handles
                .into_iter()
                .map(|(id, spawned)| {
                    let result = match spawned {
                        Ok(handle) => handle
                            .join()
                            .unwrap_or_else(|payload| Err(panic_error(id, payload))),
                        Err(err) => Err(SchedulerError::WorkerSpawn(format!("{}: {}", id, err))),
                    };
                    (id, result)
                })
                .collect()
        });

        let mut outcomes = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for (tx, result) in results {
            let state = match result {
                Ok(()) => WorkerState::Done,
                Err(err) => {
                    errors.push(err);
                    WorkerState::Aborted
                }
            };
            outcomes.push(TxOutcome { tx, state });
        }

        tracker.finish(outcomes, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::events::{MemorySink, SchedulerEvent};
    use crate::lock::LockManager;
    use crate::log::ExecutionLog;
    use crate::verifier::verify_serializability;
    use rowcc_storage::RowStore;
    use std::time::Duration;

    struct Fixture {
        store: RowStore,
        locks: LockManager,
        log: ExecutionLog,
        sink: MemorySink,
        cancel: CancellationToken,
    }

    impl Fixture {
        fn new(rows: usize) -> Self {
            Self {
                store: RowStore::new(rows),
                locks: LockManager::new(rows).with_poll_interval(Duration::from_millis(1)),
                log: ExecutionLog::new(),
                sink: MemorySink::new(),
                cancel: CancellationToken::new(),
            }
        }

        fn run(&self, batch: Batch) -> RunReport {
            let ctx = ExecutionContext::new(&self.store, &self.locks, &self.log, &self.sink, &self.cancel)
                .with_poll_interval(Duration::from_millis(1));
            OrderedTwoPhaseScheduler::new().execute(batch, &ctx)
        }
    }

    fn demo_batch() -> Batch {
        let (x, y, z) = (3, 4, 5);
        Batch::new(vec![
            Transaction::new(TxId::new(3)).write(x, 7).read(y).write(z, 9),
            Transaction::new(TxId::new(2)).read(y).read(z).write(y, 8),
            Transaction::new(TxId::new(1)).read(x).read(z).write(x, 6),
        ])
        .unwrap()
    }

    #[test]
    fn test_runs_every_transaction() {
        let f = Fixture::new(10);
        let report = f.run(demo_batch());

        assert!(report.is_clean());
        assert_eq!(report.committed(), 3);
        assert_eq!(report.operations_executed, 9);
        assert_eq!(f.log.len(), 9);
        assert!(f.locks.all_free());
        assert!(verify_serializability(&f.log.snapshot()).is_serializable());
    }

    #[test]
    fn test_lock_phases_follow_submission_order() {
        let f = Fixture::new(10);
        f.run(demo_batch());

        let acquired: Vec<TxId> = f
            .sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                SchedulerEvent::LocksAcquired { tx, .. } => Some(tx),
                _ => None,
            })
            .collect();
        assert_eq!(acquired, vec![TxId::new(3), TxId::new(2), TxId::new(1)]);
    }

    #[test]
    fn test_worker_state_sequence() {
        let f = Fixture::new(10);
        f.run(demo_batch());
        assert_eq!(
            f.sink.states_of(TxId::new(2)),
            vec![
                WorkerState::WaitingForAdmission,
                WorkerState::AcquiringLocks,
                WorkerState::Executing,
                WorkerState::ReleasingLocks,
                WorkerState::Done
            ]
        );
    }

    #[test]
    fn test_cancelled_transaction_does_not_starve_chain() {
        let f = Fixture::new(10);
        f.cancel.cancel_transaction(TxId::new(2));
        let report = f.run(demo_batch());

        assert_eq!(report.outcome(TxId::new(2)), Some(WorkerState::Aborted));
        assert_eq!(report.outcome(TxId::new(1)), Some(WorkerState::Done));
        assert_eq!(report.outcome(TxId::new(3)), Some(WorkerState::Done));
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].is_interruption());
        assert!(f.log.snapshot().iter().all(|op| op.tx_id() != TxId::new(2)));
        assert!(f.locks.all_free());
    }

    #[test]
    fn test_empty_batch() {
        let f = Fixture::new(4);
        let report = f.run(Batch::default());
        assert!(report.outcomes.is_empty());
        assert!(report.is_clean());
    }
}
