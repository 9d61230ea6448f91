//! # rowcc-metrics
//!
//! Observability and metrics collection for RowCC.
//!
//! The engine records a fixed set of metrics, so every metric is a variant
//! of [`Counter`], [`Gauge`] or [`Timer`] rather than a free-form string:
//! - Counters for lock grants, executed operations, commits and aborts
//! - A gauge for the execution log length
//! - Latency histograms for lock waits, runs and conflict-graph builds
//! - JSON export

#![warn(missing_docs)]
#![warn(clippy::all)]

mod collector;
mod export;
mod histogram;

pub use collector::{Counter, Gauge, Metrics, Timer};
pub use export::{HistogramSummary, MetricsSnapshot};
pub use histogram::Histogram;

/// Time `$block` and record the elapsed time into `$timer`
#[macro_export]
macro_rules! timed {
    ($metrics:expr, $timer:expr, $block:block) => {{
        let start = std::time::Instant::now();
        let result = $block;
        $metrics.observe($timer, start.elapsed());
        result
    }};
}
