//! Cooperative cancellation of blocked workers

use parking_lot::RwLock;
use rowcc_primitives::TxId;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared cancellation flag for one run.
///
/// Cancelling interrupts every blocking wait (admission gate, row lock,
/// pipeline queue) at its next check. A single transaction can be
/// cancelled without affecting its siblings. Clones share state.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    all: AtomicBool,
    transactions: RwLock<HashSet<TxId>>,
}

impl CancellationToken {
    /// Create a token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every worker of the run
    pub fn cancel(&self) {
        self.inner.all.store(true, Ordering::Release);
    }

    /// Cancel a single transaction
    pub fn cancel_transaction(&self, tx: TxId) {
        self.inner.transactions.write().insert(tx);
    }

    /// Whether the whole run is cancelled
    pub fn is_cancelled(&self) -> bool {
        self.inner.all.load(Ordering::Acquire)
    }

    /// Whether `tx` should stop waiting
    pub fn is_transaction_cancelled(&self, tx: TxId) -> bool {
        self.is_cancelled() || self.inner.transactions.read().contains(&tx)
    }
}
