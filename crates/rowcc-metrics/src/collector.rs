//! Fixed metric set of the engine

use crate::Histogram;
use std::array;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// Monotonic event counts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Counter {
    /// Row locks granted
    LockAcquired,
    /// Row locks released
    LockReleased,
    /// Operations applied to the row store
    OpsExecuted,
    /// Transactions that reached `Done`
    TxCommitted,
    /// Transactions that reached `Aborted`
    TxAborted,
    /// Transactions handed to the next pipeline partition
    PipelineForwarded,
}

impl Counter {
    /// Every counter, in export order
    pub const ALL: [Counter; 6] = [
        Counter::LockAcquired,
        Counter::LockReleased,
        Counter::OpsExecuted,
        Counter::TxCommitted,
        Counter::TxAborted,
        Counter::PipelineForwarded,
    ];

    /// Exported name
    pub fn name(self) -> &'static str {
        match self {
            Counter::LockAcquired => "lock.acquired",
            Counter::LockReleased => "lock.released",
            Counter::OpsExecuted => "scheduler.ops_executed",
            Counter::TxCommitted => "scheduler.tx_committed",
            Counter::TxAborted => "scheduler.tx_aborted",
            Counter::PipelineForwarded => "pipeline.forwarded",
        }
    }
}

/// Last-written values
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gauge {
    /// Entries in the execution log after the latest run
    LogLen,
}

impl Gauge {
    /// Every gauge, in export order
    pub const ALL: [Gauge; 1] = [Gauge::LogLen];

    /// Exported name
    pub fn name(self) -> &'static str {
        match self {
            Gauge::LogLen => "log.len",
        }
    }
}

/// Latency histograms, recorded in microseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Timer {
    /// Time blocked on one row lock
    LockWait,
    /// Wall-clock time of one batch run
    RunDuration,
    /// Time to build the conflict graph of a history
    GraphBuild,
}

impl Timer {
    /// Every timer, in export order
    pub const ALL: [Timer; 3] = [Timer::LockWait, Timer::RunDuration, Timer::GraphBuild];

    /// Exported name
    pub fn name(self) -> &'static str {
        match self {
            Timer::LockWait => "lock.wait_us",
            Timer::RunDuration => "run.duration_us",
            Timer::GraphBuild => "verifier.build_us",
        }
    }
}

/// Lock-free metrics store, shared by every worker of a run.
///
/// One slot per variant; recording never allocates or takes a lock.
pub struct Metrics {
    counters: [AtomicU64; Counter::ALL.len()],
    gauges: [AtomicI64; Gauge::ALL.len()],
    timers: [Histogram; Timer::ALL.len()],
}

impl Metrics {
    /// Create a store with every metric at zero
    pub fn new() -> Self {
        Self {
            counters: array::from_fn(|_| AtomicU64::new(0)),
            gauges: array::from_fn(|_| AtomicI64::new(0)),
            timers: array::from_fn(|_| Histogram::new()),
        }
    }

    /// Add `delta` to `counter`
    pub fn incr(&self, counter: Counter, delta: u64) {
        self.counters[counter as usize].fetch_add(delta, Ordering::Relaxed);
    }

    /// Set `gauge` to `value`
    pub fn set(&self, gauge: Gauge, value: i64) {
        self.gauges[gauge as usize].store(value, Ordering::Relaxed);
    }

    /// Record `elapsed` into `timer`
    pub fn observe(&self, timer: Timer, elapsed: Duration) {
        self.timers[timer as usize].observe(elapsed.as_micros() as f64);
    }

    /// Current value of `counter`
    pub fn count(&self, counter: Counter) -> u64 {
        self.counters[counter as usize].load(Ordering::Relaxed)
    }

    /// Current value of `gauge`
    pub fn gauge(&self, gauge: Gauge) -> i64 {
        self.gauges[gauge as usize].load(Ordering::Relaxed)
    }

    /// Histogram behind `timer`
    pub fn timer(&self, timer: Timer) -> &Histogram {
        &self.timers[timer as usize]
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_map();
        for counter in Counter::ALL {
            out.entry(&counter.name(), &self.count(counter));
        }
        for gauge in Gauge::ALL {
            out.entry(&gauge.name(), &self.gauge(gauge));
        }
        out.finish()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
