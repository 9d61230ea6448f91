//! Integration tests for rowcc-scheduler
//!
//! Tests cover:
//! - LockManager mutual exclusion under contention
//! - Effects of the ordered two-phase scheduler
//! - Pipeline completeness and partition placement
//! - Verifier determinism and topological validity
//! - Cancellation across strategies

use proptest::prelude::{any, prop, prop_assert, prop_assert_eq, proptest, ProptestConfig};
use proptest::strategy::Strategy as _;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rowcc_primitives::{PartitionId, RowId, TxId};
use rowcc_scheduler::{
    verify_serializability, AccessSet, CancellationToken, ConflictGraph, ExecutionContext,
    ExecutionLog, LockManager, LockMode, MemorySink, PartitionMap, RunReport, SchedulerEvent,
    Strategy, Verdict, WorkerState,
};
use rowcc_storage::RowStore;
use rowcc_types::{Batch, OpKind, Operation, Transaction};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

const POLL: Duration = Duration::from_millis(1);

struct Harness {
    store: RowStore,
    locks: LockManager,
    log: ExecutionLog,
    sink: MemorySink,
    cancel: CancellationToken,
}

impl Harness {
    fn new(rows: usize) -> Self {
        Self {
            store: RowStore::new(rows),
            locks: LockManager::new(rows).with_poll_interval(POLL),
            log: ExecutionLog::new(),
            sink: MemorySink::new(),
            cancel: CancellationToken::new(),
        }
    }

    fn run(&self, batch: Batch, strategy: Strategy) -> RunReport {
        let ctx = ExecutionContext::new(&self.store, &self.locks, &self.log, &self.sink, &self.cancel)
            .with_poll_interval(POLL);
        strategy.scheduler().execute(batch, &ctx)
    }
}

fn random_batch(rng: &mut StdRng, transactions: u32, max_ops: usize, rows: usize) -> Batch {
    let txs = (1..=transactions)
        .map(|id| {
            let mut tx = Transaction::new(TxId::new(id));
            for _ in 0..rng.gen_range(1..=max_ops) {
                let row = rng.gen_range(0..rows);
                tx = if rng.gen_bool(0.5) {
                    tx.write(row, rng.gen_range(0..1000))
                } else {
                    tx.read(row)
                };
            }
            tx
        })
        .collect();
    Batch::new(txs).unwrap()
}

/// Identity of an operation independent of what a read observed
fn op_key(op: &Operation) -> (TxId, OpKind, RowId, i64) {
    let payload = if op.is_write() { op.payload() } else { 0 };
    (op.tx_id(), op.kind(), op.row(), payload)
}

fn multiset(ops: &[Operation]) -> HashMap<(TxId, OpKind, RowId, i64), usize> {
    let mut counts = HashMap::new();
    for op in ops {
        *counts.entry(op_key(op)).or_insert(0) += 1;
    }
    counts
}

// ============================================================================
// LockManager Tests
// ============================================================================

#[test]
fn lock_holds_never_overlap_incompatibly() {
    const ROWS: usize = 6;
    let locks = LockManager::new(ROWS).with_poll_interval(POLL);
    let cancel = CancellationToken::new();
    let writers: Vec<AtomicUsize> = (0..ROWS).map(|_| AtomicUsize::new(0)).collect();
    let readers: Vec<AtomicUsize> = (0..ROWS).map(|_| AtomicUsize::new(0)).collect();
    let violations = AtomicUsize::new(0);

    thread::scope(|s| {
        for worker in 0..8u32 {
            let (locks, cancel, writers, readers, violations) =
                (&locks, &cancel, &writers, &readers, &violations);
            s.spawn(move || {
                let mut rng = StdRng::seed_from_u64(worker as u64);
                for round in 0..50u32 {
                    let tx = TxId::new(worker * 1000 + round + 1);
                    let batch = random_batch(&mut rng, 1, 4, ROWS);
                    let access = AccessSet::from_transaction(&batch.transactions()[0]);
                    let held = locks.acquire(tx, &access, cancel).unwrap();

                    for (row, mode) in held.rows() {
                        let i = row.index();
                        match mode {
                            LockMode::Write => {
                                if writers[i].fetch_add(1, Ordering::SeqCst) != 0
                                    || readers[i].load(Ordering::SeqCst) != 0
                                {
                                    violations.fetch_add(1, Ordering::SeqCst);
                                }
                            }
                            LockMode::Read => {
                                readers[i].fetch_add(1, Ordering::SeqCst);
                                if writers[i].load(Ordering::SeqCst) != 0 {
                                    violations.fetch_add(1, Ordering::SeqCst);
                                }
                            }
                        }
                    }
                    thread::sleep(Duration::from_micros(50));
                    for (row, mode) in held.rows() {
                        match mode {
                            LockMode::Write => writers[row.index()].fetch_sub(1, Ordering::SeqCst),
                            LockMode::Read => readers[row.index()].fetch_sub(1, Ordering::SeqCst),
                        };
                    }
                    held.release();
                }
            });
        }
    });

    assert_eq!(violations.load(Ordering::SeqCst), 0);
    assert!(locks.all_free());
}

#[test]
fn opposite_order_transactions_do_not_deadlock() {
    let h = Harness::new(10);
    let txs = (1..=20u32)
        .map(|id| {
            if id % 2 == 0 {
                Transaction::new(TxId::new(id)).write(1, id as i64).write(8, id as i64)
            } else {
                Transaction::new(TxId::new(id)).write(8, id as i64).write(1, id as i64)
            }
        })
        .collect();
    let report = h.run(Batch::new(txs).unwrap(), Strategy::OrderedTwoPhase);

    assert!(report.is_clean());
    assert_eq!(report.committed(), 20);
    assert!(verify_serializability(&h.log.snapshot()).is_serializable());
}

// ============================================================================
// OrderedTwoPhaseScheduler Tests
// ============================================================================

#[test]
fn ordered_last_write_wins() {
    let h = Harness::new(100);
    let batch = Batch::new(vec![
        Transaction::new(TxId::new(1)).write(10, 111).read(20),
        Transaction::new(TxId::new(2)).write(20, 222).read(10),
        Transaction::new(TxId::new(3)).write(30, 333),
    ])
    .unwrap();
    let report = h.run(batch, Strategy::OrderedTwoPhase);

    assert!(report.is_clean());
    let cells = h.store.snapshot();
    assert_eq!(cells[10], 111);
    assert_eq!(cells[20], 222);
    assert_eq!(cells[30], 333);
    // untouched rows keep their index
    assert_eq!(cells[40], 40);
}

#[test]
fn ordered_random_batches_are_serializable() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..10 {
        let h = Harness::new(12);
        let batch = random_batch(&mut rng, 8, 5, 12);
        let expected = multiset(
            &batch
                .transactions()
                .iter()
                .flat_map(|tx| tx.operations().iter().cloned())
                .collect::<Vec<_>>(),
        );
        let report = h.run(batch, Strategy::OrderedTwoPhase);

        assert!(report.is_clean());
        let history = h.log.snapshot();
        assert_eq!(multiset(&history), expected);
        assert!(verify_serializability(&history).is_serializable());
    }
}

#[test]
fn serial_and_ordered_agree_on_disjoint_writes() {
    let batch = || {
        Batch::new(
            (1..=10u32)
                .map(|id| Transaction::new(TxId::new(id)).write(id as usize, -(id as i64)))
                .collect(),
        )
        .unwrap()
    };
    let serial = Harness::new(20);
    serial.run(batch(), Strategy::Serial);
    let ordered = Harness::new(20);
    ordered.run(batch(), Strategy::OrderedTwoPhase);

    assert_eq!(serial.store.snapshot(), ordered.store.snapshot());
}

// ============================================================================
// PartitionedPipelineScheduler Tests
// ============================================================================

fn assert_pipeline_complete(h: &Harness, batch: &Batch, partitions: usize) {
    let expected = multiset(
        &batch
            .transactions()
            .iter()
            .flat_map(|tx| tx.operations().iter().cloned())
            .collect::<Vec<_>>(),
    );
    assert_eq!(multiset(&h.log.snapshot()), expected);

    let map = PartitionMap::new(h.store.len(), partitions).unwrap();
    for event in h.sink.events() {
        if let SchedulerEvent::OperationExecuted { op, partition } = event {
            let partition: PartitionId = partition.unwrap();
            assert!(map.range(partition).contains(&op.row().index()));
        }
    }
}

#[test]
fn pipeline_runs_demo_batch() {
    let h = Harness::new(100);
    let (x, y, z) = (3, 4, 5);
    let batch = Batch::new(vec![
        Transaction::new(TxId::new(3)).write(x, 7).read(y).write(z, 9),
        Transaction::new(TxId::new(2)).read(y).read(z).write(y, 8),
        Transaction::new(TxId::new(1)).read(x).read(z).write(x, 6),
    ])
    .unwrap();
    let report = h.run(batch.clone(), Strategy::pipeline(4));

    assert!(report.is_clean());
    assert_eq!(report.committed(), 3);
    assert_pipeline_complete(&h, &batch, 4);
}

#[test]
fn pipeline_with_single_partition_is_submission_order() {
    let h = Harness::new(10);
    let batch = Batch::new(vec![
        Transaction::new(TxId::new(2)).write(1, 1),
        Transaction::new(TxId::new(1)).read(1),
    ])
    .unwrap();
    h.run(batch, Strategy::pipeline(1));

    let history = h.log.snapshot();
    assert_eq!(history[0].tx_id(), TxId::new(2));
    assert_eq!(history[1].payload(), 1);
    assert_eq!(
        verify_serializability(&history),
        Verdict::Serializable {
            order: vec![TxId::new(2), TxId::new(1)]
        }
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn pipeline_executes_every_operation_once(seed in any::<u64>(), partitions in 1usize..=6) {
        let mut rng = StdRng::seed_from_u64(seed);
        let h = Harness::new(30);
        let batch = random_batch(&mut rng, 6, 6, 30);
        let report = h.run(batch.clone(), Strategy::pipeline(partitions));

        prop_assert!(report.is_clean());
        prop_assert_eq!(report.committed(), batch.len());
        assert_pipeline_complete(&h, &batch, partitions);
    }
}

// ============================================================================
// SerializabilityVerifier Tests
// ============================================================================

fn arb_log() -> impl proptest::strategy::Strategy<Value = Vec<Operation>> {
    prop::collection::vec((1u32..6, 0usize..5, any::<bool>()), 0..30).prop_map(|ops| {
        ops.into_iter()
            .map(|(tx, row, write)| {
                if write {
                    Operation::write(TxId::new(tx), RowId::new(row), 1)
                } else {
                    Operation::read(TxId::new(tx), RowId::new(row))
                }
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn verifier_is_deterministic(log in arb_log()) {
        prop_assert_eq!(verify_serializability(&log), verify_serializability(&log));
    }

    #[test]
    fn verifier_order_respects_every_edge(log in arb_log()) {
        let graph = ConflictGraph::build(&log);
        match verify_serializability(&log) {
            Verdict::Serializable { order } => {
                prop_assert_eq!(order.len(), graph.len());
                let position: HashMap<TxId, usize> =
                    order.iter().enumerate().map(|(i, tx)| (*tx, i)).collect();
                for edge in graph.edges() {
                    prop_assert!(position[&edge.from] < position[&edge.to]);
                }
            }
            Verdict::NotSerializable { cycle } => {
                prop_assert!(cycle.len() >= 3);
                prop_assert_eq!(cycle.first(), cycle.last());
                for pair in cycle.windows(2) {
                    prop_assert!(graph.has_edge(pair[0], pair[1]));
                }
            }
        }
    }
}

#[test]
fn serial_history_is_always_serializable() {
    let mut rng = StdRng::seed_from_u64(99);
    let h = Harness::new(8);
    let report = h.run(random_batch(&mut rng, 10, 6, 8), Strategy::Serial);

    assert!(report.is_clean());
    let verdict = verify_serializability(&h.log.snapshot());
    let order: Vec<u32> = verdict.order().unwrap().iter().map(|tx| tx.as_u32()).collect();
    assert_eq!(order.len(), 10);
}

// ============================================================================
// Cancellation Tests
// ============================================================================

#[test]
fn cancel_before_run_aborts_everything() {
    for strategy in [Strategy::Serial, Strategy::OrderedTwoPhase, Strategy::pipeline(3)] {
        let h = Harness::new(10);
        h.cancel.cancel();
        let batch = Batch::new(vec![
            Transaction::new(TxId::new(1)).write(1, 1),
            Transaction::new(TxId::new(2)).write(9, 2),
        ])
        .unwrap();
        let report = h.run(batch, strategy);

        assert_eq!(report.aborted(), 2, "{}", strategy);
        assert!(!report.is_clean());
        assert!(report.errors.iter().all(|e| e.is_interruption()));
        assert!(h.log.is_empty());
        assert!(h.locks.all_free());
    }
}

#[test]
fn blocked_worker_unwinds_on_cancel() {
    let h = Harness::new(10);
    // an outside holder keeps row 5 locked so T2 blocks on it
    h.locks
        .lock_row(TxId::new(99), RowId::new(5), LockMode::Write, &h.cancel)
        .unwrap();
    let batch = Batch::new(vec![
        Transaction::new(TxId::new(1)).write(1, 1),
        Transaction::new(TxId::new(2)).write(2, 2).write(5, 5),
        Transaction::new(TxId::new(3)).write(3, 3),
    ])
    .unwrap();

    let report = thread::scope(|s| {
        let handle = s.spawn(|| h.run(batch, Strategy::OrderedTwoPhase));
        thread::sleep(Duration::from_millis(30));
        h.cancel.cancel_transaction(TxId::new(2));
        handle.join().unwrap()
    });

    assert_eq!(report.outcome(TxId::new(1)), Some(WorkerState::Done));
    assert_eq!(report.outcome(TxId::new(2)), Some(WorkerState::Aborted));
    assert_eq!(report.outcome(TxId::new(3)), Some(WorkerState::Done));
    // the partial hold on row 2 was given back
    assert!(h.locks.is_free(RowId::new(2)));
    assert_eq!(h.store.snapshot()[2], 2);
}
