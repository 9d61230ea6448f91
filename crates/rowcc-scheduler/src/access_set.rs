//! Per-transaction row access sets

use crate::lock::LockMode;
use rowcc_primitives::RowId;
use rowcc_types::{Operation, Transaction};
use std::collections::BTreeMap;

/// Rows a transaction touches, with the strongest mode it needs on each.
///
/// A row that is both read and written needs a write lock. Iteration is in
/// ascending row order, which is the global lock acquisition order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessSet {
    modes: BTreeMap<RowId, LockMode>,
}

impl AccessSet {
    /// Create an empty access set
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the access set of a sequence of operations
    pub fn from_operations<'a>(ops: impl IntoIterator<Item = &'a Operation>) -> Self {
        let mut set = Self::new();
        for op in ops {
            if op.is_write() {
                set.record_write(op.row());
            } else {
                set.record_read(op.row());
            }
        }
        set
    }

    /// Collect the access set of a transaction
    pub fn from_transaction(tx: &Transaction) -> Self {
        Self::from_operations(tx.operations())
    }

    /// Record a read of `row`; never downgrades a write
    pub fn record_read(&mut self, row: RowId) {
        self.modes.entry(row).or_insert(LockMode::Read);
    }

    /// Record a write of `row`
    pub fn record_write(&mut self, row: RowId) {
        self.modes.insert(row, LockMode::Write);
    }

    /// Mode needed on `row`, if touched
    pub fn mode(&self, row: RowId) -> Option<LockMode> {
        self.modes.get(&row).copied()
    }

    /// Rows and modes in ascending row order
    pub fn iter(&self) -> impl Iterator<Item = (RowId, LockMode)> + '_ {
        self.modes.iter().map(|(row, mode)| (*row, *mode))
    }

    /// Number of distinct rows
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    /// Whether no row is touched
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowcc_primitives::TxId;

    #[test]
    fn test_write_wins_over_read() {
        let tx = Transaction::new(TxId::new(1)).read(4).write(4, 10).read(2);
        let set = AccessSet::from_transaction(&tx);

        assert_eq!(set.mode(RowId::new(4)), Some(LockMode::Write));
        assert_eq!(set.mode(RowId::new(2)), Some(LockMode::Read));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_read_after_write_keeps_write() {
        let mut set = AccessSet::new();
        set.record_write(RowId::new(1));
        set.record_read(RowId::new(1));
        assert_eq!(set.mode(RowId::new(1)), Some(LockMode::Write));
    }

    #[test]
    fn test_iteration_is_ascending() {
        let tx = Transaction::new(TxId::new(1)).write(9, 1).read(3).write(5, 2);
        let rows: Vec<usize> = AccessSet::from_transaction(&tx)
            .iter()
            .map(|(r, _)| r.index())
            .collect();
        assert_eq!(rows, vec![3, 5, 9]);
    }
}
