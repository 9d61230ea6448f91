//! Fixed-size in-memory row store

use crate::error::StorageResult;
use crate::traits::{RowReader, RowWriter};
use rowcc_primitives::{RowId, Value};
use std::sync::atomic::{AtomicI64, Ordering};

/// Fixed collection of mutable integer cells.
///
/// Cell `i` starts with value `i`. Cells are atomics only so the store can
/// be shared by reference; ordering between workers comes from the locks
/// they hold, not from the cells.
#[derive(Debug)]
pub struct RowStore {
    cells: Box<[AtomicI64]>,
}

impl RowStore {
    /// Create a store of `row_count` rows, each initialized to its index
    pub fn new(row_count: usize) -> Self {
        let cells = (0..row_count)
            .map(|i| AtomicI64::new(i as Value))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { cells }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the store has no rows
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Copy of every cell value, indexed by row
    pub fn snapshot(&self) -> Vec<Value> {
        self.cells.iter().map(|c| c.load(Ordering::Acquire)).collect()
    }

    fn cell(&self, row: RowId) -> StorageResult<&AtomicI64> {
        row.check_bounds(self.cells.len())?;
        Ok(&self.cells[row.index()])
    }
}

impl RowReader for RowStore {
    fn get(&self, row: RowId) -> StorageResult<Value> {
        Ok(self.cell(row)?.load(Ordering::Acquire))
    }

    fn row_count(&self) -> usize {
        self.cells.len()
    }
}

impl RowWriter for RowStore {
    fn set(&self, row: RowId, value: Value) -> StorageResult<()> {
        self.cell(row)?.store(value, Ordering::Release);
        Ok(())
    }
}
