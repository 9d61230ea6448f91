//! Transaction batches

use crate::error::{TypeError, TypeResult};
use crate::transaction::Transaction;
use rowcc_primitives::TxId;
use std::collections::HashSet;

/// Transactions submitted together.
///
/// The order of the batch is the submission order used for admission
/// gating and pipeline ingestion. Ids are unique and never the sentinel id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Batch {
    transactions: Vec<Transaction>,
}

impl Batch {
    /// Create a batch, rejecting duplicate or reserved ids
    pub fn new(transactions: Vec<Transaction>) -> TypeResult<Self> {
        let mut seen = HashSet::with_capacity(transactions.len());
        for tx in &transactions {
            if tx.id().is_sentinel() {
                return Err(TypeError::ReservedTransactionId(tx.id()));
            }
            if !seen.insert(tx.id()) {
                return Err(TypeError::DuplicateTransaction(tx.id()));
            }
        }
        Ok(Self { transactions })
    }

    /// Append a transaction at the end of the submission order
    pub fn push(&mut self, tx: Transaction) -> TypeResult<()> {
        if tx.id().is_sentinel() {
            return Err(TypeError::ReservedTransactionId(tx.id()));
        }
        if self.transactions.iter().any(|t| t.id() == tx.id()) {
            return Err(TypeError::DuplicateTransaction(tx.id()));
        }
        self.transactions.push(tx);
        Ok(())
    }

    /// Transactions in submission order
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Consume the batch
    pub fn into_transactions(self) -> Vec<Transaction> {
        self.transactions
    }

    /// Transaction ids in submission order
    pub fn ids(&self) -> Vec<TxId> {
        self.transactions.iter().map(|t| t.id()).collect()
    }

    /// Number of transactions
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Whether the batch has no transactions
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Total operation count across all transactions
    pub fn operation_count(&self) -> usize {
        self.transactions.iter().map(|t| t.len()).sum()
    }

    /// Check every operation targets a row in a store of `row_count` rows
    pub fn validate_rows(&self, row_count: usize) -> TypeResult<()> {
        self.transactions
            .iter()
            .try_for_each(|tx| tx.validate_rows(row_count))
    }
}
