//! Row operations

use rowcc_primitives::{RowId, TxId, Value};
use std::fmt;

/// Kind of row access
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum OpKind {
    /// Read the row and record the observed value
    Read,
    /// Overwrite the row with the payload
    Write,
}

impl OpKind {
    /// Whether this is a write
    pub fn is_write(&self) -> bool {
        matches!(self, OpKind::Write)
    }
}

/// A single read or write of one row on behalf of one transaction.
///
/// For writes the payload is the value to store. For reads it starts at
/// zero and is filled in with the observed value by the worker that
/// executes the read.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Operation {
    kind: OpKind,
    row: RowId,
    payload: Value,
    tx_id: TxId,
}

impl Operation {
    /// Create an operation
    pub fn new(kind: OpKind, row: RowId, payload: Value, tx_id: TxId) -> Self {
        Self {
            kind,
            row,
            payload,
            tx_id,
        }
    }

    /// Create a read of `row`
    pub fn read(tx_id: TxId, row: RowId) -> Self {
        Self::new(OpKind::Read, row, 0, tx_id)
    }

    /// Create a write of `value` into `row`
    pub fn write(tx_id: TxId, row: RowId, value: Value) -> Self {
        Self::new(OpKind::Write, row, value, tx_id)
    }

    /// Access kind
    pub fn kind(&self) -> OpKind {
        self.kind
    }

    /// Target row
    pub fn row(&self) -> RowId {
        self.row
    }

    /// Write value, or observed value once a read has executed
    pub fn payload(&self) -> Value {
        self.payload
    }

    /// Owning transaction
    pub fn tx_id(&self) -> TxId {
        self.tx_id
    }

    /// Whether this is a write
    pub fn is_write(&self) -> bool {
        self.kind.is_write()
    }

    /// Record the value observed by a read
    pub fn record_read(&mut self, observed: Value) {
        debug_assert_eq!(self.kind, OpKind::Read, "record_read on a write");
        self.payload = observed;
    }

    /// Whether two operations conflict: same row, different transactions,
    /// at least one write
    pub fn conflicts_with(&self, other: &Operation) -> bool {
        self.row == other.row
            && self.tx_id != other.tx_id
            && (self.is_write() || other.is_write())
    }

    /// Compact history notation, e.g. `w3[5]` or `r1[4]`
    pub fn notation(&self) -> String {
        let prefix = if self.is_write() { 'w' } else { 'r' };
        format!("{}{}[{}]", prefix, self.tx_id.as_u32(), self.row.index())
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            OpKind::Read => write!(f, "{} READ row {} = {}", self.tx_id, self.row.index(), self.payload),
            OpKind::Write => write!(
                f,
                "{} WRITE row {} value {}",
                self.tx_id,
                self.row.index(),
                self.payload
            ),
        }
    }
}
