//! # rowcc-storage
//!
//! Row storage for RowCC.
//!
//! A fixed number of integer cells addressed by [`RowId`](rowcc_primitives::RowId).
//! The store has no concurrency control of its own: callers serialize
//! access through the lock manager or partition ownership.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod store;
mod traits;

pub use error::{StorageError, StorageResult};
pub use store::RowStore;
pub use traits::{RowReader, RowWriter};
