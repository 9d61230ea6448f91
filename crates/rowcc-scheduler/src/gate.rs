//! Admission gate for the ordered two-phase scheduler
//!
//! Worker `i` may start acquiring locks only after worker `i - 1` has
//! acquired all of its own. The gate is a turnstile: a shared counter of
//! the index currently admitted, advanced by the admitted worker once its
//! locks are held (or once it gives up).

use crate::cancel::CancellationToken;
use crate::error::{SchedulerError, SchedulerResult};
use parking_lot::{Condvar, Mutex};
use rowcc_primitives::TxId;
use std::collections::BTreeSet;
use std::time::Duration;

#[derive(Debug, Default)]
struct GateState {
    next: usize,
    abandoned: BTreeSet<usize>,
}

impl GateState {
    fn advance(&mut self) {
        self.next += 1;
        // skip workers that already gave up waiting
        while self.abandoned.remove(&self.next) {
            self.next += 1;
        }
    }
}

/// Chain of admission signals, one per transaction index
#[derive(Debug)]
pub struct AdmissionGate {
    state: Mutex<GateState>,
    cond: Condvar,
    len: usize,
    poll_interval: Duration,
}

impl AdmissionGate {
    /// Create a gate for `len` workers; index 0 is admitted immediately
    pub fn new(len: usize, poll_interval: Duration) -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            cond: Condvar::new(),
            len,
            poll_interval,
        }
    }

    /// Number of workers chained through the gate
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the gate chains no worker
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index currently admitted
    pub fn admitted(&self) -> usize {
        self.state.lock().next
    }

    /// Block until worker `index` (running `tx`) is admitted.
    ///
    /// On cancellation the worker's slot is abandoned, so the chain skips
    /// it and later workers are still admitted in order.
    pub fn wait_turn(
        &self,
        index: usize,
        tx: TxId,
        cancel: &CancellationToken,
    ) -> SchedulerResult<AdmissionTurn<'_>> {
        let mut state = self.state.lock();
        loop {
            if cancel.is_transaction_cancelled(tx) {
                drop(state);
                self.abandon(index);
                tracing::warn!(%tx, index, "admission wait interrupted");
                return Err(SchedulerError::AdmissionInterrupted { tx });
            }
            if state.next == index {
                break;
            }
            self.cond.wait_for(&mut state, self.poll_interval);
        }
        Ok(AdmissionTurn {
            gate: self,
            index,
            passed: false,
        })
    }

    /// Give up slot `index` without being admitted.
    ///
    /// Used when a worker is cancelled or never starts; the chain skips the
    /// slot when it reaches it.
    pub fn abandon(&self, index: usize) {
        let mut state = self.state.lock();
        if state.next == index {
            state.advance();
        } else if state.next < index {
            state.abandoned.insert(index);
        }
        drop(state);
        self.cond.notify_all();
    }

    fn pass(&self) {
        self.state.lock().advance();
        self.cond.notify_all();
    }
}

/// Proof that a worker is the one currently admitted.
///
/// [`AdmissionTurn::admit_next`] releases the next worker. Dropping the turn
/// without calling it does the same, so an early exit never starves the
/// chain.
#[derive(Debug)]
#[must_use = "dropping the turn admits the next worker"]
pub struct AdmissionTurn<'a> {
    gate: &'a AdmissionGate,
    index: usize,
    passed: bool,
}

impl AdmissionTurn<'_> {
    /// Index of the admitted worker
    pub fn index(&self) -> usize {
        self.index
    }

    /// Admit the next worker
    pub fn admit_next(mut self) {
        self.passed = true;
        self.gate.pass();
    }
}

impl Drop for AdmissionTurn<'_> {
    fn drop(&mut self) {
        if !self.passed {
            self.gate.pass();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use std::thread;

    const POLL: Duration = Duration::from_millis(1);

    #[test]
    fn test_admits_in_index_order() {
        let gate = AdmissionGate::new(5, POLL);
        let cancel = CancellationToken::new();
        let order = PlMutex::new(Vec::new());

        thread::scope(|s| {
            // spawn in reverse so thread start order cannot explain the result
            for i in (0..5).rev() {
                let (gate, cancel, order) = (&gate, &cancel, &order);
                s.spawn(move || {
                    let turn = gate.wait_turn(i, TxId::new(i as u32 + 1), cancel).unwrap();
                    order.lock().push(i);
                    turn.admit_next();
                });
            }
        });

        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(gate.admitted(), 5);
    }

    #[test]
    fn test_dropped_turn_advances() {
        let gate = AdmissionGate::new(2, POLL);
        let cancel = CancellationToken::new();
        {
            let _turn = gate.wait_turn(0, TxId::new(1), &cancel).unwrap();
        }
        assert_eq!(gate.admitted(), 1);
    }

    #[test]
    fn test_abandoned_slot_is_skipped() {
        let gate = AdmissionGate::new(3, POLL);
        let cancel = CancellationToken::new();
        cancel.cancel_transaction(TxId::new(2));

        // worker 1 gives up before worker 0 is done
        let err = gate.wait_turn(1, TxId::new(2), &cancel).unwrap_err();
        assert_eq!(err, SchedulerError::AdmissionInterrupted { tx: TxId::new(2) });

        gate.wait_turn(0, TxId::new(1), &cancel).unwrap().admit_next();
        assert_eq!(gate.admitted(), 2);
        gate.wait_turn(2, TxId::new(3), &cancel).unwrap().admit_next();
        assert_eq!(gate.admitted(), 3);
    }

    #[test]
    fn test_cancel_while_waiting() {
        let gate = AdmissionGate::new(2, POLL);
        let cancel = CancellationToken::new();

        let turn = gate.wait_turn(0, TxId::new(1), &cancel).unwrap();
        let result = thread::scope(|s| {
            let handle = s.spawn(|| gate.wait_turn(1, TxId::new(2), &cancel).map(|t| t.index()));
            thread::sleep(Duration::from_millis(10));
            cancel.cancel();
            handle.join().unwrap()
        });
        assert!(result.is_err());

        turn.admit_next();
        assert_eq!(gate.admitted(), 2);
    }
}
