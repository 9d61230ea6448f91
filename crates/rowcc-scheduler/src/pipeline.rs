//! Partitioned pipeline scheduler
//!
//! The row space is split into `P` contiguous ranges, each owned by one
//! worker with its own inbound queue. Every transaction enters at
//! partition 0 and flows downstream; each worker executes the operations
//! addressed to its range and forwards the rest. No row locks are taken:
//! exclusive range ownership serializes access.

use crate::error::{SchedulerError, SchedulerResult};
use crate::events::{SchedulerEvent, WorkerState};
use crate::ownership::OwnershipTable;
use crate::partition::PartitionMap;
use crate::scheduler::{
    panic_error, ExecutionContext, RunReport, RunTracker, Scheduler, Strategy, TxOutcome,
};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use rowcc_metrics::Counter;
use rowcc_primitives::{PartitionId, TxId};
use rowcc_storage::{RowReader, RowWriter};
use rowcc_types::{Batch, OpKind, Operation, Transaction};
use std::collections::HashSet;
use std::iter;
use std::thread;

/// Pipeline of `P` partition workers connected by queues
#[derive(Clone, Copy, Debug)]
pub struct PartitionedPipelineScheduler {
    partitions: usize,
}

impl PartitionedPipelineScheduler {
    /// Create a pipeline with `partitions` partitions
    pub fn new(partitions: usize) -> Self {
        Self { partitions }
    }

    /// Number of partitions
    pub fn partitions(&self) -> usize {
        self.partitions
    }
}

/// State shared by every partition worker of one run
struct Shared<'c, 'a> {
    ctx: &'c ExecutionContext<'a>,
    ownership: OwnershipTable,
    completed: Mutex<HashSet<TxId>>,
}

struct PartitionWorker<'s, 'c, 'a> {
    id: PartitionId,
    inbox: Receiver<Transaction>,
    next: Option<Sender<Transaction>>,
    shared: &'s Shared<'c, 'a>,
    errors: Vec<SchedulerError>,
}

impl PartitionWorker<'_, '_, '_> {
    fn run(mut self) -> Vec<SchedulerError> {
        let ctx = self.shared.ctx;
        loop {
            if ctx.cancel.is_cancelled() {
                tracing::warn!(partition = %self.id, "pipeline worker interrupted");
                self.errors.push(SchedulerError::PipelineInterrupted { partition: self.id });
                self.stop(true);
                return self.errors;
            }
            let tx = match self.inbox.recv_timeout(ctx.poll_interval) {
                Ok(tx) => tx,
                Err(RecvTimeoutError::Timeout) => continue,
                // upstream is gone and the queue is drained
                Err(RecvTimeoutError::Disconnected) => break,
            };
            if tx.is_sentinel() {
                break;
            }
            self.process(tx);
        }

        self.stop(false);
        self.errors
    }

    fn process(&mut self, mut tx: Transaction) {
        let ctx = self.shared.ctx;
        let id = tx.id();
        if ctx.cancel.is_transaction_cancelled(id) {
            self.fail(id, SchedulerError::TransactionCancelled { tx: id });
            return;
        }
        if self.id.index() == 0 {
            ctx.transition(id, WorkerState::Executing);
        }

        // stable partition keeps program order within this range
        let ownership = &self.shared.ownership;
        let (mine, rest): (Vec<Operation>, Vec<Operation>) = tx
            .take_operations()
            .into_iter()
            .partition(|op| ownership.is_owner(op.row(), self.id));

        for op in mine {
            if let Err(err) = self.apply(op) {
                self.fail(id, err);
                return;
            }
        }

        if rest.is_empty() {
            self.shared.completed.lock().insert(id);
            return;
        }
        let Some(next) = &self.next else {
            let row = rest[0].row();
            self.fail(
                id,
                SchedulerError::RowOutOfPartition {
                    tx: id,
                    row,
                    partition: self.id,
                },
            );
            return;
        };

        let remaining = rest.len();
        tx.set_operations(rest);
        if next.send(tx).is_err() {
            tracing::warn!(tx = %id, partition = %self.id, "downstream partition is gone");
            return;
        }
        if let Some(metrics) = ctx.metrics {
            metrics.incr(Counter::PipelineForwarded, 1);
        }
        ctx.events.emit(SchedulerEvent::Forwarded {
            tx: id,
            from: self.id,
            remaining,
        });
    }

    /// Apply an operation on a row this partition owns
    fn apply(&self, mut op: Operation) -> SchedulerResult<()> {
        let ctx = self.shared.ctx;
        match op.kind() {
            OpKind::Read => {
                let observed = ctx.store.get(op.row())?;
                op.record_read(observed);
            }
            OpKind::Write => ctx.store.set(op.row(), op.payload())?,
        }
        ctx.record(op, Some(self.id));
        Ok(())
    }

    fn fail(&mut self, tx: TxId, err: SchedulerError) {
        tracing::warn!(%tx, partition = %self.id, error = %err, "transaction dropped");
        self.errors.push(err);
    }

    /// Propagate termination downstream and give up the owned range
    fn stop(&mut self, interrupted: bool) {
        if let Some(next) = self.next.take() {
            let _ = next.send(Transaction::sentinel());
        }
        self.shared.ownership.release_all(self.id);
        self.shared.ctx.events.emit(SchedulerEvent::PartitionStopped {
            partition: self.id,
            interrupted,
        });
    }
}

impl Scheduler for PartitionedPipelineScheduler {
    fn strategy(&self) -> Strategy {
        Strategy::pipeline(self.partitions)
    }

    fn execute(&self, batch: Batch, ctx: &ExecutionContext<'_>) -> RunReport {
        let tracker = RunTracker::start(ctx, self.strategy(), &batch);
        let ids = batch.ids();

        let ownership = OwnershipTable::new();
        // every range is claimed before the first transaction is enqueued
        let claimed = PartitionMap::new(ctx.store.len(), self.partitions).and_then(|map| {
            map.ids()
                .try_for_each(|id| ownership.claim_range(map.range(id), id))
                .map(|()| map)
        });
        let map = match claimed {
            Ok(map) => map,
            Err(err) => {
                let outcomes = ids
                    .into_iter()
                    .map(|tx| TxOutcome {
                        tx,
                        state: WorkerState::Aborted,
                    })
                    .collect();
                return tracker.finish(outcomes, vec![err]);
            }
        };
        let shared = Shared {
            ctx,
            ownership,
            completed: Mutex::new(HashSet::new()),
        };

        let (senders, receivers): (Vec<Sender<Transaction>>, Vec<Receiver<Transaction>>) =
            (0..self.partitions).map(|_| unbounded()).unzip();
        let mut senders = senders.into_iter();
        let Some(head) = senders.next() else {
            return tracker.finish(Vec::new(), Vec::new());
        };
        let downstream = senders.map(Some).chain(iter::once(None));

        let errors: Vec<SchedulerError> = thread::scope(|s| {
            let handles: Vec<_> = map
                .ids()
                .zip(receivers.into_iter().zip(downstream))
                .map(|(id, (inbox, next))| {
                    let worker = PartitionWorker {
                        id,
                        inbox,
                        next,
                        shared: &shared,
                        errors: Vec::new(),
                    };
                    let spawned = thread::Builder::new()
                        .name(format!("rowcc-{}", id))
                        .spawn_scoped(s, move || worker.run());
                    (id, spawned)
                })
                .collect();

            for tx in batch.into_transactions() {
                let id = tx.id();
                if head.send(tx).is_err() {
                    tracing::warn!(tx = %id, "pipeline head is gone");
                }
            }
            for _ in 0..self.partitions {
                let _ = head.send(Transaction::sentinel());
            }
            drop(head);

            let mut errors = Vec::new();
            for (id, spawned) in handles {
                match spawned {
                    Ok(handle) => match handle.join() {
                        Ok(worker_errors) => errors.extend(worker_errors),
                        Err(payload) => errors.push(panic_error(id, payload)),
                    },
                    Err(err) => errors.push(SchedulerError::WorkerSpawn(format!("{}: {}", id, err))),
                }
            }
            errors
        });

        let completed = shared.completed.into_inner();
        let outcomes = ids
            .into_iter()
            .map(|tx| {
                let state = if completed.contains(&tx) {
                    WorkerState::Done
                } else {
                    WorkerState::Aborted
                };
                ctx.transition(tx, state);
                TxOutcome { tx, state }
            })
            .collect();

        tracker.finish(outcomes, errors)
    }
}
