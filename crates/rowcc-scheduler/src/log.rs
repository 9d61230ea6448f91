//! Append-only execution log

use parking_lot::Mutex;
use rowcc_types::Operation;
use std::mem;
use std::sync::Arc;

/// Entries per sealed segment
const SEGMENT_LEN: usize = 256;

#[derive(Debug, Default)]
struct Segments {
    /// Full segments, immutable once sealed
    sealed: Vec<Arc<[Operation]>>,
    /// Entries not yet sealed, at most `SEGMENT_LEN - 1`
    tail: Vec<Operation>,
    len: usize,
}

/// Shared history of executed operations.
///
/// Every worker of every strategy appends here; the append critical section
/// is the single point that totally orders effects across workers.
///
/// Entries are kept in sealed, shared segments plus a short tail, so a
/// snapshot holds the lock only to clone the segment handles and the tail,
/// never to copy the whole history.
#[derive(Debug, Default)]
pub struct ExecutionLog {
    segments: Mutex<Segments>,
}

impl ExecutionLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an executed operation, returning its position
    pub fn append(&self, op: Operation) -> usize {
        let mut guard = self.segments.lock();
        let log = &mut *guard;
        log.tail.push(op);
        if log.tail.len() == SEGMENT_LEN {
            let full = mem::replace(&mut log.tail, Vec::with_capacity(SEGMENT_LEN));
            log.sealed.push(full.into());
        }
        log.len += 1;
        log.len - 1
    }

    /// Copy of the current history
    pub fn snapshot(&self) -> Vec<Operation> {
        let (sealed, tail, len) = {
            let log = self.segments.lock();
            (log.sealed.clone(), log.tail.clone(), log.len)
        };
        let mut entries = Vec::with_capacity(len);
        for segment in &sealed {
            entries.extend_from_slice(segment);
        }
        entries.extend(tail);
        entries
    }

    /// Drop every entry. Must not race with a run.
    pub fn clear(&self) {
        *self.segments.lock() = Segments::default();
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.segments.lock().len
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowcc_primitives::{RowId, TxId};
    use std::thread;

    #[test]
    fn test_append_and_snapshot() {
        let log = ExecutionLog::new();
        assert_eq!(log.append(Operation::write(TxId::new(1), RowId::new(3), 7)), 0);
        assert_eq!(log.append(Operation::read(TxId::new(2), RowId::new(3))), 1);

        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].tx_id(), TxId::new(1));

        // snapshot is detached from later appends
        log.append(Operation::read(TxId::new(3), RowId::new(0)));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_clear() {
        let log = ExecutionLog::new();
        for i in 0..10 {
            log.append(Operation::read(TxId::new(1), RowId::new(i)));
        }
        log.clear();
        assert!(log.is_empty());
        assert!(log.snapshot().is_empty());
    }

    #[test]
    fn test_snapshot_spans_segments() {
        let log = ExecutionLog::new();
        let total = SEGMENT_LEN * 2 + 7;
        for i in 0..total {
            assert_eq!(log.append(Operation::write(TxId::new(1), RowId::new(i), i as i64)), i);
        }

        let entries = log.snapshot();
        assert_eq!(entries.len(), total);
        assert_eq!(log.len(), total);
        assert!(entries.iter().enumerate().all(|(i, op)| op.row().index() == i));
    }

    #[test]
    fn test_snapshots_during_appends_are_prefixes() {
        let log = ExecutionLog::new();
        let snapshots = thread::scope(|s| {
            let writer = s.spawn(|| {
                for i in 0..2000 {
                    log.append(Operation::write(TxId::new(1), RowId::new(i), 0));
                }
            });
            let mut snapshots = Vec::new();
            while !writer.is_finished() {
                snapshots.push(log.snapshot());
            }
            snapshots
        });

        let full = log.snapshot();
        assert_eq!(full.len(), 2000);
        for snapshot in snapshots {
            assert_eq!(snapshot[..], full[..snapshot.len()]);
        }
    }

    #[test]
    fn test_concurrent_appends_are_all_kept() {
        let log = ExecutionLog::new();
        thread::scope(|s| {
            for t in 1..=8u32 {
                let log = &log;
                s.spawn(move || {
                    for i in 0..100 {
                        log.append(Operation::write(TxId::new(t), RowId::new(i), i as i64));
                    }
                });
            }
        });

        let entries = log.snapshot();
        assert_eq!(entries.len(), 800);
        // per-thread order survives interleaving
        for t in 1..=8u32 {
            let rows: Vec<usize> = entries
                .iter()
                .filter(|op| op.tx_id() == TxId::new(t))
                .map(|op| op.row().index())
                .collect();
            assert_eq!(rows, (0..100).collect::<Vec<_>>());
        }
    }
}
