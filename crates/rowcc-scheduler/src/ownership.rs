//! Ownership table - tracks which pipeline partition owns each row

use crate::error::{SchedulerError, SchedulerResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rowcc_primitives::{PartitionId, RowId};
use std::ops::Range;

/// Ownership table for pipeline row ranges
///
/// Each row can be owned by at most one partition. The pipeline claims
/// every range before the first transaction is enqueued, and a worker
/// executes exactly the operations whose row it owns, so a row is never
/// touched by two workers in one run.
#[derive(Debug, Default)]
pub struct OwnershipTable {
    owners: DashMap<RowId, PartitionId>,
}

impl OwnershipTable {
    /// Create a new empty ownership table
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to claim a row
    ///
    /// Returns `Ok(())` if the row was free or already owned by `partition`,
    /// `Err(owner)` if another partition owns it.
    pub fn try_claim(&self, row: RowId, partition: PartitionId) -> Result<(), PartitionId> {
        match self.owners.entry(row) {
            Entry::Occupied(entry) => {
                let owner = *entry.get();
                if owner == partition {
                    Ok(())
                } else {
                    Err(owner)
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(partition);
                Ok(())
            }
        }
    }

    /// Claim every row in `rows`; on conflict, roll back what this call claimed
    pub fn claim_range(&self, rows: Range<usize>, partition: PartitionId) -> SchedulerResult<()> {
        for index in rows.clone() {
            let row = RowId::new(index);
            if let Err(owner) = self.try_claim(row, partition) {
                for claimed in rows.start..index {
                    self.release(RowId::new(claimed), partition);
                }
                return Err(SchedulerError::OwnershipConflict {
                    row,
                    owner,
                    requester: partition,
                });
            }
        }
        Ok(())
    }

    /// Release a row if `partition` owns it
    pub fn release(&self, row: RowId, partition: PartitionId) -> bool {
        self.owners
            .remove_if(&row, |_, owner| *owner == partition)
            .is_some()
    }

    /// Release every row owned by `partition`
    pub fn release_all(&self, partition: PartitionId) {
        self.owners.retain(|_, owner| *owner != partition);
    }

    /// Owner of a row
    pub fn owner(&self, row: RowId) -> Option<PartitionId> {
        self.owners.get(&row).map(|entry| *entry)
    }

    /// Check if `partition` owns `row`
    pub fn is_owner(&self, row: RowId, partition: PartitionId) -> bool {
        self.owner(row) == Some(partition)
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_claim_and_release() {
        let table = OwnershipTable::new();
        let p0 = PartitionId::new(0);
        let p1 = PartitionId::new(1);

        assert!(table.try_claim(RowId::new(1), p0).is_ok());
        assert!(table.try_claim(RowId::new(1), p0).is_ok());
        assert_eq!(table.try_claim(RowId::new(1), p1), Err(p0));

        assert!(!table.release(RowId::new(1), p1));
        assert!(table.release(RowId::new(1), p0));
        assert!(table.owner(RowId::new(1)).is_none());
    }

    #[test]
    fn test_claim_range_rolls_back() {
        let table = OwnershipTable::new();
        let p0 = PartitionId::new(0);
        let p1 = PartitionId::new(1);

        table.claim_range(0..5, p0).unwrap();
        assert!((0..5).all(|row| table.is_owner(RowId::new(row), p0)));

        let err = table.claim_range(3..8, p1).unwrap_err();
        assert_eq!(
            err,
            SchedulerError::OwnershipConflict {
                row: RowId::new(3),
                owner: p0,
                requester: p1
            }
        );
        // nothing from the failed claim survives
        assert!((0..5).all(|row| table.is_owner(RowId::new(row), p0)));
        assert!((5..8).all(|row| table.owner(RowId::new(row)).is_none()));
    }

    #[test]
    fn test_release_all() {
        let table = OwnershipTable::new();
        table.claim_range(0..3, PartitionId::new(0)).unwrap();
        table.claim_range(3..6, PartitionId::new(1)).unwrap();

        table.release_all(PartitionId::new(0));
        assert!((0..3).all(|row| table.owner(RowId::new(row)).is_none()));
        assert!((3..6).all(|row| table.is_owner(RowId::new(row), PartitionId::new(1))));
    }

    #[test]
    fn test_concurrent_claims_single_winner() {
        let table = OwnershipTable::new();
        let wins = AtomicUsize::new(0);
        thread::scope(|s| {
            for p in 0..8 {
                let (table, wins) = (&table, &wins);
                s.spawn(move || {
                    if table.try_claim(RowId::new(0), PartitionId::new(p)).is_ok() {
                        wins.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });
        assert_eq!(wins.load(Ordering::SeqCst), 1);
    }
}
