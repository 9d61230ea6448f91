//! Transactions

use crate::error::{TypeError, TypeResult};
use crate::operation::Operation;
use rowcc_primitives::{RowId, TxId, Value, SENTINEL_TX_ID};

/// An ordered sequence of operations sharing one transaction id.
///
/// Operation order is the transaction's program order. Schedulers may
/// split a transaction across workers but never reorder operations that
/// land on the same worker.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Transaction {
    id: TxId,
    operations: Vec<Operation>,
}

impl Transaction {
    /// Create an empty transaction
    pub fn new(id: TxId) -> Self {
        Self {
            id,
            operations: Vec::new(),
        }
    }

    /// The pipeline termination sentinel: id 0, no operations
    pub fn sentinel() -> Self {
        Self::new(SENTINEL_TX_ID)
    }

    /// Transaction id
    pub fn id(&self) -> TxId {
        self.id
    }

    /// Whether this is the termination sentinel
    pub fn is_sentinel(&self) -> bool {
        self.id.is_sentinel() && self.operations.is_empty()
    }

    /// Append a read of `row`
    pub fn read(mut self, row: impl Into<RowId>) -> Self {
        self.operations.push(Operation::read(self.id, row.into()));
        self
    }

    /// Append a write of `value` into `row`
    pub fn write(mut self, row: impl Into<RowId>, value: Value) -> Self {
        self.operations
            .push(Operation::write(self.id, row.into(), value));
        self
    }

    /// Append an already built operation
    pub fn add_operation(&mut self, op: Operation) -> TypeResult<()> {
        if op.tx_id() != self.id {
            return Err(TypeError::ForeignOperation {
                expected: self.id,
                found: op.tx_id(),
            });
        }
        self.operations.push(op);
        Ok(())
    }

    /// Operations in program order
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Take the operations out, leaving the transaction empty
    pub fn take_operations(&mut self) -> Vec<Operation> {
        std::mem::take(&mut self.operations)
    }

    /// Replace the remaining operations
    pub fn set_operations(&mut self, operations: Vec<Operation>) {
        self.operations = operations;
    }

    /// Number of operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether there are no operations left
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Check every operation targets a row in a store of `row_count` rows
    pub fn validate_rows(&self, row_count: usize) -> TypeResult<()> {
        for op in &self.operations {
            op.row()
                .check_bounds(row_count)
                .map_err(|source| TypeError::RowOutOfRange { tx: self.id, source })?;
        }
        Ok(())
    }
}
