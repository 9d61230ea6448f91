//! # rowcc-primitives
//!
//! Primitive types for the RowCC concurrency-control engine.
//!
//! This crate provides the identifiers shared by every other crate:
//! row indices, transaction ids and partition indices.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod row;
mod tx;

pub use error::PrimitiveError;
pub use row::{PartitionId, RowId};
pub use tx::{TxId, SENTINEL_TX_ID};

/// Value stored in a row cell
pub type Value = i64;

/// Number of rows in a freshly created store unless configured otherwise
pub const DEFAULT_ROW_COUNT: usize = 100;
