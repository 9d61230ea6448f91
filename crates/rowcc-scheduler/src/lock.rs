//! Row-level read/write locks
//!
//! One reentrant lock per row. A transaction acquires every lock it needs in
//! ascending row order before touching any row, and releases them all at the
//! end. Because every transaction follows the same total order, no cycle of
//! waiters can form.

use crate::access_set::AccessSet;
use crate::cancel::CancellationToken;
use crate::error::{SchedulerError, SchedulerResult};
use parking_lot::{Condvar, Mutex};
use rowcc_metrics::{Counter, Metrics, Timer};
use rowcc_primitives::{RowId, TxId, Value};
use rowcc_storage::{RowReader, RowWriter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lock mode on a single row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    /// Shared; any number of readers
    Read,
    /// Exclusive; a single writer and no readers
    Write,
}

impl LockMode {
    /// Whether holders in these two modes (from different transactions)
    /// can coexist
    pub fn is_compatible(self, other: LockMode) -> bool {
        self == LockMode::Read && other == LockMode::Read
    }

    /// Whether a lock held in `self` mode allows an access in `needed` mode
    pub fn covers(self, needed: LockMode) -> bool {
        self >= needed
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Read => f.write_str("read"),
            LockMode::Write => f.write_str("write"),
        }
    }
}

#[derive(Debug, Default)]
struct RowLockState {
    writer: Option<TxId>,
    write_holds: usize,
    readers: HashMap<TxId, usize>,
}

impl RowLockState {
    /// Whether `mode` is compatible with every hold of another transaction.
    ///
    /// Own holds never block, so a sole reader may upgrade to write.
    fn can_grant(&self, tx: TxId, mode: LockMode) -> bool {
        let other_writer = self.writer.filter(|w| *w != tx).map(|_| LockMode::Write);
        let other_reader = self
            .readers
            .keys()
            .any(|r| *r != tx)
            .then_some(LockMode::Read);
        other_writer
            .into_iter()
            .chain(other_reader)
            .all(|held| held.is_compatible(mode))
    }

    fn grant(&mut self, tx: TxId, mode: LockMode) {
        match mode {
            LockMode::Read => *self.readers.entry(tx).or_insert(0) += 1,
            LockMode::Write => {
                self.writer = Some(tx);
                self.write_holds += 1;
            }
        }
    }

    fn release(&mut self, tx: TxId, mode: LockMode) -> bool {
        match mode {
            LockMode::Read => match self.readers.get_mut(&tx) {
                Some(count) => {
                    *count -= 1;
                    if *count == 0 {
                        self.readers.remove(&tx);
                    }
                    true
                }
                None => false,
            },
            LockMode::Write => {
                if self.writer != Some(tx) {
                    return false;
                }
                self.write_holds -= 1;
                if self.write_holds == 0 {
                    self.writer = None;
                }
                true
            }
        }
    }

    fn is_free(&self) -> bool {
        self.writer.is_none() && self.readers.is_empty()
    }
}

#[derive(Debug, Default)]
struct RowLock {
    state: Mutex<RowLockState>,
    cond: Condvar,
}

/// Lock table with one reentrant read/write lock per row
pub struct LockManager {
    rows: Box<[RowLock]>,
    poll_interval: Duration,
    metrics: Option<Arc<Metrics>>,
}

impl LockManager {
    /// Create a lock table for `row_count` rows
    pub fn new(row_count: usize) -> Self {
        let rows = (0..row_count)
            .map(|_| RowLock::default())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            rows,
            poll_interval: crate::DEFAULT_POLL_INTERVAL,
            metrics: None,
        }
    }

    /// Set how often blocked waits re-check cancellation
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Record lock metrics into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Number of rows covered
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Acquire every lock in `access` on behalf of `tx`, in ascending row
    /// order, blocking until each is available.
    ///
    /// Fails only when `cancel` fires for `tx` (or a row is out of range);
    /// in that case every lock acquired by this call is released before
    /// the error is returned.
    pub fn acquire(
        &self,
        tx: TxId,
        access: &AccessSet,
        cancel: &CancellationToken,
    ) -> SchedulerResult<HeldLocks<'_>> {
        let mut held = HeldLocks {
            manager: self,
            tx,
            held: Vec::with_capacity(access.len()),
        };
        for (row, mode) in access.iter() {
            // on error `held` drops and releases the partial set
            self.lock_row(tx, row, mode, cancel)?;
            held.held.push((row, mode));
        }
        tracing::debug!(%tx, rows = held.held.len(), "all locks acquired");
        Ok(held)
    }

    /// Acquire a single row lock, blocking until granted or cancelled
    pub fn lock_row(
        &self,
        tx: TxId,
        row: RowId,
        mode: LockMode,
        cancel: &CancellationToken,
    ) -> SchedulerResult<()> {
        let lock = self.row(row)?;
        let interrupted = || SchedulerError::LockAcquisitionInterrupted { tx, row };

        if cancel.is_transaction_cancelled(tx) {
            return Err(interrupted());
        }

        let started = Instant::now();
        let mut state = lock.state.lock();
        while !state.can_grant(tx, mode) {
            lock.cond.wait_for(&mut state, self.poll_interval);
            if cancel.is_transaction_cancelled(tx) {
                tracing::warn!(%tx, %row, "lock wait interrupted");
                return Err(interrupted());
            }
        }
        state.grant(tx, mode);
        drop(state);

        tracing::debug!(%tx, %row, %mode, "lock granted");
        if let Some(metrics) = &self.metrics {
            metrics.incr(Counter::LockAcquired, 1);
            metrics.observe(Timer::LockWait, started.elapsed());
        }
        Ok(())
    }

    /// Release one hold of `row` in `mode` by `tx`.
    ///
    /// Returns false if `tx` held no such lock.
    pub fn unlock_row(&self, tx: TxId, row: RowId, mode: LockMode) -> bool {
        let Ok(lock) = self.row(row) else {
            return false;
        };
        let released = lock.state.lock().release(tx, mode);
        if released {
            lock.cond.notify_all();
            tracing::debug!(%tx, %row, %mode, "lock released");
            if let Some(metrics) = &self.metrics {
                metrics.incr(Counter::LockReleased, 1);
            }
        }
        released
    }

    /// Release the given holds in reverse order
    pub fn release(&self, tx: TxId, rows: &[(RowId, LockMode)]) {
        for (row, mode) in rows.iter().rev() {
            self.unlock_row(tx, *row, *mode);
        }
    }

    /// Current holders of `row`: the writer (if any) and the readers
    pub fn holders(&self, row: RowId) -> Option<(Option<TxId>, Vec<TxId>)> {
        let lock = self.rows.get(row.index())?;
        let state = lock.state.lock();
        let mut readers: Vec<TxId> = state.readers.keys().copied().collect();
        readers.sort();
        Some((state.writer, readers))
    }

    /// Whether nobody holds `row`
    pub fn is_free(&self, row: RowId) -> bool {
        self.rows
            .get(row.index())
            .map_or(true, |lock| lock.state.lock().is_free())
    }

    /// Whether no row is locked at all
    pub fn all_free(&self) -> bool {
        self.rows.iter().all(|lock| lock.state.lock().is_free())
    }

    fn row(&self, row: RowId) -> SchedulerResult<&RowLock> {
        row.check_bounds(self.rows.len())?;
        Ok(&self.rows[row.index()])
    }
}

impl fmt::Debug for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockManager")
            .field("rows", &self.rows.len())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Locks held by one transaction.
///
/// Rows may only be read or written through this guard, and only in a
/// mode the guard holds. Dropping the guard releases every lock in reverse
/// acquisition order.
#[derive(Debug)]
pub struct HeldLocks<'a> {
    manager: &'a LockManager,
    tx: TxId,
    held: Vec<(RowId, LockMode)>,
}

impl<'a> HeldLocks<'a> {
    /// Owning transaction
    pub fn tx(&self) -> TxId {
        self.tx
    }

    /// Held rows and modes, in acquisition order
    pub fn rows(&self) -> &[(RowId, LockMode)] {
        &self.held
    }

    /// Mode held on `row`
    pub fn mode(&self, row: RowId) -> Option<LockMode> {
        self.held.iter().find(|(r, _)| *r == row).map(|(_, m)| *m)
    }

    /// Read `row` from `store`; requires at least a read lock
    pub fn read<S: RowReader + ?Sized>(&self, store: &S, row: RowId) -> SchedulerResult<Value> {
        self.require(row, LockMode::Read)?;
        Ok(store.get(row)?)
    }

    /// Write `value` into `row` of `store`; requires a write lock
    pub fn write<S: RowWriter + ?Sized>(
        &self,
        store: &S,
        row: RowId,
        value: Value,
    ) -> SchedulerResult<()> {
        self.require(row, LockMode::Write)?;
        Ok(store.set(row, value)?)
    }

    /// Release every lock now
    pub fn release(mut self) -> usize {
        self.release_all()
    }

    fn require(&self, row: RowId, needed: LockMode) -> SchedulerResult<()> {
        match self.mode(row) {
            Some(mode) if mode.covers(needed) => Ok(()),
            _ => Err(SchedulerError::RowNotHeld {
                tx: self.tx,
                row,
                mode: needed,
            }),
        }
    }

    fn release_all(&mut self) -> usize {
        let held = std::mem::take(&mut self.held);
        self.manager.release(self.tx, &held);
        held.len()
    }
}

impl Drop for HeldLocks<'_> {
    fn drop(&mut self) {
        if !self.held.is_empty() {
            self.release_all();
        }
    }
}
