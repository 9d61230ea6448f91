//! Storage traits for row access

use crate::error::StorageResult;
use rowcc_primitives::{RowId, Value};

/// Read access to rows
pub trait RowReader {
    /// Get the current value of a row
    fn get(&self, row: RowId) -> StorageResult<Value>;

    /// Number of rows
    fn row_count(&self) -> usize;
}

/// Write access to rows
///
/// Takes `&self`: the store is shared between workers and exclusivity is
/// provided by the caller's lock or partition.
pub trait RowWriter {
    /// Overwrite a row
    fn set(&self, row: RowId, value: Value) -> StorageResult<()>;
}
