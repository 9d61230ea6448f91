//! # rowcc-types
//!
//! Core types for RowCC.
//!
//! This crate provides:
//! - [`Operation`](operation::Operation) - a single read or write of one row
//! - [`Transaction`](transaction::Transaction) - operations in program order
//! - [`Batch`](batch::Batch) - transactions in submission order

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod error;
pub mod operation;
pub mod transaction;

// Re-export commonly used types
pub use batch::Batch;
pub use error::{TypeError, TypeResult};
pub use operation::{OpKind, Operation};
pub use transaction::Transaction;
